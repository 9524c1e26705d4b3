//! Simplification of conditional expressions in filter predicates.
//!
//! A filter keeps a row only when its predicate is TRUE, so FALSE and NULL
//! are interchangeable there. The rewrites below rely on that and produce an
//! expression that is TRUE exactly when the original is TRUE, which is not
//! necessarily equivalent to the original anywhere else. They are therefore
//! only exposed as a rule over Filter nodes.

use crate::analysis::is_deterministic;
use crate::error::OptimizerResult;
use crate::ir::utils::{combine_conjuncts, extract_conjuncts};
use crate::ir::{ExprKind, Expression, SearchedCase, SimpleCase, WhenClause};
use crate::plan::PlanNode;
use crate::rule::{Outcome, Rule, RuleContext};

pub struct SimplifyFilterPredicate;

impl Rule for SimplifyFilterPredicate {
    fn name(&self) -> &str {
        "SimplifyFilterPredicate"
    }

    fn matches(&self, node: &PlanNode) -> bool {
        matches!(node, PlanNode::Filter { .. })
    }

    fn apply(&self, node: &PlanNode, _context: &RuleContext) -> OptimizerResult<Outcome> {
        let (id, source, predicate) = match node {
            PlanNode::Filter {
                id,
                source,
                predicate,
            } => (id, source, predicate),
            _ => return Ok(Outcome::Unchanged),
        };

        let mut simplified = false;
        let conjuncts = extract_conjuncts(predicate)
            .into_iter()
            .map(|conjunct| match simplify_conjunct(&conjunct) {
                Some(rewritten) => {
                    simplified = true;
                    rewritten
                }
                None => conjunct,
            })
            .collect::<Vec<_>>();

        if !simplified {
            return Ok(Outcome::Unchanged);
        }
        Ok(Outcome::Rewritten(PlanNode::Filter {
            id: *id,
            source: source.clone(),
            predicate: combine_conjuncts(conjuncts),
        }))
    }
}

/// Simplify one filter conjunct, or `None` if no rewrite applies
pub fn simplify_conjunct(conjunct: &Expression) -> Option<Expression> {
    match conjunct.kind() {
        ExprKind::NullIf(null_if) => Some(Expression::and(vec![
            null_if.first.clone(),
            is_false_or_null_predicate(&null_if.second),
        ])),
        ExprKind::SearchedCase(case) => simplify_searched_case(case),
        ExprKind::SimpleCase(case) => simplify_simple_case(case),
        _ => None,
    }
}

/// FALSE or a NULL literal
fn is_not_true(expression: &Expression) -> bool {
    expression.is_false_constant() || expression.is_null_constant()
}

fn is_not_true_or_absent(expression: Option<&Expression>) -> bool {
    expression.map_or(true, is_not_true)
}

fn is_true(expression: Option<&Expression>) -> bool {
    expression.map_or(false, Expression::is_true_constant)
}

/// `e IS NULL OR NOT e`, which is TRUE exactly when `e` is not
fn is_false_or_null_predicate(expression: &Expression) -> Expression {
    Expression::or(vec![
        Expression::is_null(expression.clone()),
        Expression::not(expression.clone()),
    ])
}

/// Rewrite an if-like conditional: `condition ? true_value : false_value`
fn simplify_conditional(
    condition: &Expression,
    true_value: &Expression,
    false_value: Option<&Expression>,
) -> Option<Expression> {
    if true_value.is_true_constant() && is_not_true_or_absent(false_value) {
        return Some(condition.clone());
    }
    if is_not_true(true_value) && is_true(false_value) {
        return Some(is_false_or_null_predicate(condition));
    }
    if false_value == Some(true_value) && is_deterministic(true_value) {
        return Some(true_value.clone());
    }
    if is_not_true(true_value) && is_not_true_or_absent(false_value) {
        return Some(Expression::boolean(false));
    }
    if condition.is_true_constant() {
        return Some(true_value.clone());
    }
    if is_not_true(condition) {
        return Some(
            false_value
                .cloned()
                .unwrap_or_else(|| Expression::boolean(false)),
        );
    }
    None
}

fn simplify_searched_case(case: &SearchedCase) -> Option<Expression> {
    let default_value = case.default_value.as_ref();

    if let [clause] = case.when_clauses.as_slice() {
        return simplify_conditional(&clause.operand, &clause.result, default_value);
    }

    let results: Vec<&Expression> = case.when_clauses.iter().map(|c| &c.result).collect();
    let true_results = results.iter().filter(|r| r.is_true_constant()).count();
    let not_true_results = results.iter().filter(|r| is_not_true(r)).count();

    if true_results == results.len() && is_true(default_value) {
        return Some(Expression::boolean(true));
    }
    if not_true_results == results.len() && is_not_true_or_absent(default_value) {
        return Some(Expression::boolean(false));
    }

    // exactly one branch yields TRUE and nothing else can: the row passes
    // when every earlier condition is not true and that branch's is
    if true_results == 1
        && not_true_results == results.len() - 1
        && is_not_true_or_absent(default_value)
    {
        let mut conjuncts = Vec::new();
        for clause in &case.when_clauses {
            if is_not_true(&clause.result) {
                conjuncts.push(is_false_or_null_predicate(&clause.operand));
            } else {
                conjuncts.push(clause.operand.clone());
                return Some(combine_conjuncts(conjuncts));
            }
        }
    }

    // only the default yields TRUE
    if not_true_results == results.len() && is_true(default_value) {
        return Some(combine_conjuncts(
            case.when_clauses
                .iter()
                .map(|clause| is_false_or_null_predicate(&clause.operand))
                .collect(),
        ));
    }

    // drop branches that can never be taken
    let mut when_clauses: Vec<WhenClause> = Vec::new();
    for clause in &case.when_clauses {
        if clause.operand.is_true_constant() {
            if when_clauses.is_empty() {
                return Some(clause.result.clone());
            }
            return Some(Expression::searched_case(
                when_clauses,
                Some(clause.result.clone()),
            ));
        }
        if !is_not_true(&clause.operand) {
            when_clauses.push(clause.clone());
        }
    }
    if when_clauses.is_empty() {
        return Some(default_value.cloned().unwrap_or_else(|| Expression::boolean(false)));
    }
    if when_clauses.len() < case.when_clauses.len() {
        return Some(Expression::searched_case(when_clauses, case.default_value.clone()));
    }
    None
}

fn simplify_simple_case(case: &SimpleCase) -> Option<Expression> {
    let default_value = case.default_value.as_ref();

    if case.operand.is_null_constant() {
        return Some(default_value.cloned().unwrap_or_else(|| Expression::boolean(false)));
    }

    let results = || case.when_clauses.iter().map(|c| &c.result);
    if results().all(Expression::is_true_constant) && is_true(default_value) {
        return Some(Expression::boolean(true));
    }
    if results().all(is_not_true) && is_not_true_or_absent(default_value) {
        return Some(Expression::boolean(false));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TypeProvider;
    use crate::function::BuiltinFunctions;
    use crate::ir::Symbol;
    use crate::plan::PlanNodeIdAllocator;
    use crate::rule::Session;
    use crate::types::DataType;
    use std::sync::Arc;

    fn cond() -> Expression {
        Expression::symbol("cond")
    }

    fn other() -> Expression {
        Expression::symbol("other")
    }

    fn apply(predicate: Expression) -> Option<Expression> {
        let ids = PlanNodeIdAllocator::new();
        let values = PlanNode::values(ids.next_id(), vec![Symbol::new("cond")], vec![]);
        let filter = PlanNode::filter(ids.next_id(), values, predicate);
        let context = RuleContext::new(
            Session::new("test"),
            TypeProvider::new(),
            Arc::new(BuiltinFunctions::new()),
        );
        match SimplifyFilterPredicate.apply(&filter, &context).unwrap() {
            Outcome::Rewritten(PlanNode::Filter { predicate, .. }) => Some(predicate),
            Outcome::Rewritten(node) => panic!("unexpected node {:?}", node),
            Outcome::Unchanged => None,
        }
    }

    fn if_like(true_value: Expression, false_value: Option<Expression>) -> Expression {
        Expression::searched_case(vec![WhenClause::new(cond(), true_value)], false_value)
    }

    #[test]
    fn test_case_true_else_false_is_condition() {
        let predicate = if_like(Expression::boolean(true), Some(Expression::boolean(false)));
        assert_eq!(apply(predicate), Some(cond()));

        let no_else = if_like(Expression::boolean(true), None);
        assert_eq!(apply(no_else), Some(cond()));
    }

    #[test]
    fn test_case_false_else_true() {
        let predicate = if_like(Expression::null(DataType::Boolean), Some(Expression::boolean(true)));
        assert_eq!(
            apply(predicate).unwrap().to_string(),
            "((cond IS NULL) OR (NOT cond))"
        );
    }

    #[test]
    fn test_case_same_branches() {
        let predicate = if_like(other(), Some(other()));
        assert_eq!(apply(predicate), Some(other()));
    }

    #[test]
    fn test_case_never_true() {
        let predicate = if_like(Expression::boolean(false), None);
        assert_eq!(apply(predicate), Some(Expression::boolean(false)));
    }

    #[test]
    fn test_null_if() {
        let predicate = Expression::null_if(cond(), other());
        assert_eq!(
            apply(predicate).unwrap().to_string(),
            "(cond AND ((other IS NULL) OR (NOT other)))"
        );
    }

    #[test]
    fn test_single_true_branch() {
        let predicate = Expression::searched_case(
            vec![
                WhenClause::new(cond(), Expression::boolean(false)),
                WhenClause::new(other(), Expression::boolean(true)),
            ],
            None,
        );
        assert_eq!(
            apply(predicate).unwrap().to_string(),
            "(((cond IS NULL) OR (NOT cond)) AND other)"
        );
    }

    #[test]
    fn test_drops_unreachable_branches() {
        let predicate = Expression::searched_case(
            vec![
                WhenClause::new(Expression::boolean(false), Expression::symbol("x")),
                WhenClause::new(cond(), Expression::symbol("y")),
                WhenClause::new(Expression::boolean(true), Expression::symbol("z")),
            ],
            None,
        );
        assert_eq!(
            apply(predicate).unwrap().to_string(),
            "CASE WHEN cond THEN y ELSE z END"
        );
    }

    #[test]
    fn test_simple_case_with_null_operand() {
        let predicate = Expression::simple_case(
            Expression::null(DataType::BigInt),
            vec![WhenClause::new(Expression::bigint(1), other())],
            None,
        );
        assert_eq!(apply(predicate), Some(Expression::boolean(false)));
    }

    #[test]
    fn test_other_conjuncts_untouched() {
        assert_eq!(apply(Expression::and(vec![cond(), other()])), None);

        let predicate = Expression::and(vec![
            other(),
            if_like(Expression::boolean(true), None),
        ]);
        assert_eq!(apply(predicate).unwrap().to_string(), "(other AND cond)");
    }

    #[test]
    fn test_rewrite_is_stable() {
        let predicate = if_like(Expression::boolean(true), Some(Expression::boolean(false)));
        let once = apply(predicate).unwrap();
        assert_eq!(apply(once), None);
    }
}
