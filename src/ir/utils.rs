//! Predicate helpers shared by the rewrite rules.

use crate::analysis::is_deterministic;
use crate::function::DYNAMIC_FILTER_FUNCTION;
use crate::ir::expr::{ExprKind, Expression, Symbol};
use crate::ir::operator::LogicalOperator;
use std::collections::{BTreeSet, HashSet};

/// Flatten nested `operator` expressions into their leaf terms
pub fn extract_predicates(operator: LogicalOperator, expression: &Expression) -> Vec<Expression> {
    let mut predicates = Vec::new();
    collect_predicates(operator, expression, &mut predicates);
    predicates
}

fn collect_predicates(
    operator: LogicalOperator,
    expression: &Expression,
    predicates: &mut Vec<Expression>,
) {
    match expression.kind() {
        ExprKind::Logical(logical) if logical.operator == operator => {
            for term in &logical.terms {
                collect_predicates(operator, term, predicates);
            }
        }
        _ => predicates.push(expression.clone()),
    }
}

pub fn extract_conjuncts(expression: &Expression) -> Vec<Expression> {
    extract_predicates(LogicalOperator::And, expression)
}

pub fn extract_disjuncts(expression: &Expression) -> Vec<Expression> {
    extract_predicates(LogicalOperator::Or, expression)
}

/// Keep the first occurrence of each deterministic expression; repeated
/// non-deterministic expressions are all kept
pub fn remove_duplicates(expressions: Vec<Expression>) -> Vec<Expression> {
    let mut seen = HashSet::new();
    expressions
        .into_iter()
        .filter(|e| !is_deterministic(e) || seen.insert(e.clone()))
        .collect()
}

/// Build `operator` over `terms` without simplification: no terms gives the
/// operator's identity, a single term is returned as is
pub fn logical_expression(operator: LogicalOperator, mut terms: Vec<Expression>) -> Expression {
    match terms.len() {
        0 => Expression::boolean(operator == LogicalOperator::And),
        1 => terms.remove(0),
        _ => Expression::logical(operator, terms),
    }
}

/// AND together `expressions`, flattening, dropping TRUE and duplicates,
/// and collapsing to FALSE if any term is FALSE
pub fn combine_conjuncts(expressions: Vec<Expression>) -> Expression {
    combine_predicates(LogicalOperator::And, expressions)
}

/// OR together `expressions`, flattening, dropping FALSE and duplicates,
/// and collapsing to TRUE if any term is TRUE
pub fn combine_disjuncts(expressions: Vec<Expression>) -> Expression {
    combine_predicates(LogicalOperator::Or, expressions)
}

pub fn combine_predicates(operator: LogicalOperator, expressions: Vec<Expression>) -> Expression {
    let (identity, absorbing) = match operator {
        LogicalOperator::And => (true, false),
        LogicalOperator::Or => (false, true),
    };
    let is_literal = |e: &Expression, value: bool| {
        if value {
            e.is_true_constant()
        } else {
            e.is_false_constant()
        }
    };

    let flattened: Vec<Expression> = expressions
        .iter()
        .flat_map(|e| extract_predicates(operator, e))
        .filter(|e| !is_literal(e, identity))
        .collect();
    let terms = remove_duplicates(flattened);

    if terms.iter().any(|e| is_literal(e, absorbing)) {
        return Expression::boolean(absorbing);
    }
    logical_expression(operator, terms)
}

/// Symbols referenced by `expression`, excluding lambda arguments
pub fn symbols_of(expression: &Expression) -> BTreeSet<Symbol> {
    let mut symbols = BTreeSet::new();
    collect_symbols(expression, &mut Vec::new(), &mut symbols);
    symbols
}

/// Symbols referenced by any of `expressions`
pub fn symbols_of_all<'a>(expressions: impl IntoIterator<Item = &'a Expression>) -> BTreeSet<Symbol> {
    let mut symbols = BTreeSet::new();
    for expression in expressions {
        collect_symbols(expression, &mut Vec::new(), &mut symbols);
    }
    symbols
}

fn collect_symbols(expression: &Expression, bound: &mut Vec<String>, symbols: &mut BTreeSet<Symbol>) {
    match expression.kind() {
        ExprKind::SymbolReference(reference) => {
            if !bound.contains(&reference.name) {
                symbols.insert(Symbol::from(reference));
            }
        }
        ExprKind::Lambda(lambda) => {
            let depth = bound.len();
            bound.extend(lambda.arguments.iter().cloned());
            collect_symbols(&lambda.body, bound, symbols);
            bound.truncate(depth);
        }
        _ => {
            for child in expression.children() {
                collect_symbols(child, bound, symbols);
            }
        }
    }
}

/// Whether `expression` is the planner's dynamic filter marker
pub fn is_dynamic_filter(expression: &Expression) -> bool {
    match expression.kind() {
        ExprKind::FunctionCall(call) => call.function.name() == DYNAMIC_FILTER_FUNCTION,
        _ => false,
    }
}
