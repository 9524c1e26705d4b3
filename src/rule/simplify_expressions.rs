//! Algebraic simplification followed by constant folding.

use crate::analysis::{is_deterministic, ExpressionTypes};
use crate::error::{ExpressionResult, OptimizerResult};
use crate::interpreter::NoOpSymbolResolver;
use crate::ir::utils::{combine_predicates, extract_predicates, remove_duplicates};
use crate::ir::{
    rewrite_with, ComparisonOperator, ExprKind, Expression, ExpressionRewriter, Logical,
    LogicalOperator,
};
use crate::rule::{ExpressionRewriteRuleSet, Rule, RuleContext};

/// Simplifies every expression of a plan: pushes negations down, factors out
/// common predicates, turns ORs of equalities into IN and folds everything
/// that does not depend on a symbol.
pub struct SimplifyExpressions;

impl SimplifyExpressions {
    pub fn rule_set() -> ExpressionRewriteRuleSet {
        ExpressionRewriteRuleSet::new("SimplifyExpressions", rewrite)
    }

    pub fn rules() -> Vec<Box<dyn Rule>> {
        Self::rule_set().rules()
    }
}

/// Simplify one expression
pub fn rewrite(expression: &Expression, context: &RuleContext) -> OptimizerResult<Expression> {
    if expression.as_symbol().is_some() {
        return Ok(expression.clone());
    }

    let types = context.get_types(expression)?;
    let expression = push_down_negations(expression, &types)?;
    let expression = extract_common_predicates(&expression)?;
    let expression = normalize_or_expression(&expression)?;

    let types = context.get_types(&expression)?;
    let result_type = types.type_of(&expression)?.clone();
    let interpreter = context.interpreter(expression, types)?;
    let optimized = interpreter.optimize(&NoOpSymbolResolver)?;
    Ok(optimized.into_expression(result_type))
}

/// Move NOT towards the leaves: De Morgan over AND/OR, double negation
/// removal, and negated comparisons. Comparisons over floating point values
/// keep their NOT, since `NOT (a < b)` is not `a >= b` when either is NaN.
pub fn push_down_negations(
    expression: &Expression,
    types: &ExpressionTypes,
) -> ExpressionResult<Expression> {
    rewrite_with(&mut NegationPusher { types }, expression)
}

struct NegationPusher<'a> {
    types: &'a ExpressionTypes,
}

impl ExpressionRewriter for NegationPusher<'_> {
    fn rewrite(&mut self, node: &Expression) -> ExpressionResult<Option<Expression>> {
        let negated = match node.kind() {
            ExprKind::Not(not) => &not.value,
            _ => return Ok(None),
        };

        match negated.kind() {
            ExprKind::Logical(logical) => {
                let terms = logical
                    .terms
                    .iter()
                    .map(|term| rewrite_with(self, &Expression::not(term.clone())))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                Ok(Some(Expression::logical(logical.operator.flip(), terms)))
            }
            ExprKind::Not(inner) => rewrite_with(self, &inner.value).map(Some),
            ExprKind::Comparison(comparison) => {
                let floating = self.types.type_of(&comparison.left)?.is_floating_point()
                    || self.types.type_of(&comparison.right)?.is_floating_point();
                match comparison.operator.negate() {
                    Some(operator) if !floating => Ok(Some(Expression::comparison(
                        operator,
                        rewrite_with(self, &comparison.left)?,
                        rewrite_with(self, &comparison.right)?,
                    ))),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

/// Factor predicates shared by every term out of AND/OR trees:
/// `(a AND b) OR (a AND c)` becomes `a AND (b OR c)`. Only deterministic
/// predicates are factored.
pub fn extract_common_predicates(expression: &Expression) -> ExpressionResult<Expression> {
    rewrite_with(&mut CommonPredicateExtractor, expression)
}

struct CommonPredicateExtractor;

impl CommonPredicateExtractor {
    fn extract(&self, logical: &Logical) -> Expression {
        let operator = logical.operator;
        let flipped = operator.flip();
        let sub_predicates: Vec<Vec<Expression>> = logical
            .terms
            .iter()
            .map(|term| extract_predicates(flipped, term))
            .collect();

        let common: Vec<Expression> = match sub_predicates.split_first() {
            Some((first, rest)) => first
                .iter()
                .filter(|predicate| is_deterministic(predicate))
                .filter(|predicate| rest.iter().all(|terms| terms.contains(predicate)))
                .fold(Vec::new(), |mut common, predicate| {
                    if !common.contains(predicate) {
                        common.push(predicate.clone());
                    }
                    common
                }),
            None => Vec::new(),
        };
        if common.is_empty() {
            return Expression::new(ExprKind::Logical(logical.clone()));
        }

        let uncorrelated: Vec<Expression> = sub_predicates
            .into_iter()
            .map(|terms| {
                let remaining = terms.into_iter().filter(|t| !common.contains(t)).collect();
                combine_predicates(flipped, remaining)
            })
            .collect();

        let mut predicates = common;
        predicates.push(combine_predicates(operator, uncorrelated));
        combine_predicates(flipped, predicates)
    }
}

impl ExpressionRewriter for CommonPredicateExtractor {
    fn rewrite(&mut self, node: &Expression) -> ExpressionResult<Option<Expression>> {
        let logical = match node.kind() {
            ExprKind::Logical(logical) => logical,
            _ => return Ok(None),
        };

        let terms = extract_predicates(logical.operator, node)
            .iter()
            .map(|term| rewrite_with(self, term))
            .collect::<ExpressionResult<Vec<_>>>()?;
        let combined = combine_predicates(logical.operator, terms);
        match combined.kind() {
            ExprKind::Logical(logical) => Ok(Some(self.extract(logical))),
            _ => Ok(Some(combined)),
        }
    }
}

/// Replace equalities and IN predicates over the same value inside an OR by
/// a single IN: `a = 1 OR a = 2 OR b` becomes `a IN (1, 2) OR b`.
pub fn normalize_or_expression(expression: &Expression) -> ExpressionResult<Expression> {
    rewrite_with(&mut OrNormalizer, expression)
}

struct OrNormalizer;

enum Disjunct {
    /// Equalities and IN predicates sharing the same tested value
    Membership {
        value: Expression,
        candidates: Vec<Expression>,
    },
    Other(Expression),
}

impl ExpressionRewriter for OrNormalizer {
    fn rewrite(&mut self, node: &Expression) -> ExpressionResult<Option<Expression>> {
        match node.kind() {
            ExprKind::Logical(logical) if logical.operator == LogicalOperator::Or => {}
            _ => return Ok(None),
        }

        let disjuncts = extract_predicates(LogicalOperator::Or, node)
            .iter()
            .map(|disjunct| rewrite_with(self, disjunct))
            .collect::<ExpressionResult<Vec<_>>>()?;

        // position in `slots` is the position of the first disjunct of a group
        let mut slots: Vec<Disjunct> = Vec::new();
        for disjunct in disjuncts {
            let (value, candidates) = match disjunct.kind() {
                ExprKind::Comparison(comparison)
                    if comparison.operator == ComparisonOperator::Equal =>
                {
                    (comparison.left.clone(), vec![comparison.right.clone()])
                }
                ExprKind::In(in_predicate) => {
                    (in_predicate.value.clone(), in_predicate.value_list.clone())
                }
                _ => {
                    slots.push(Disjunct::Other(disjunct));
                    continue;
                }
            };

            let existing = slots.iter_mut().find_map(|slot| match slot {
                Disjunct::Membership {
                    value: tested,
                    candidates,
                } if *tested == value && is_deterministic(&value) => Some(candidates),
                _ => None,
            });
            match existing {
                Some(existing) => existing.extend(candidates),
                None => slots.push(Disjunct::Membership { value, candidates }),
            }
        }

        let terms = slots
            .into_iter()
            .map(|slot| match slot {
                Disjunct::Other(disjunct) => disjunct,
                Disjunct::Membership { value, candidates } => {
                    let mut candidates = remove_duplicates(candidates);
                    if candidates.len() == 1 {
                        Expression::equal(value, candidates.remove(0))
                    } else {
                        Expression::in_list(value, candidates)
                    }
                }
            })
            .collect();
        Ok(Some(combine_predicates(LogicalOperator::Or, terms)))
    }
}
