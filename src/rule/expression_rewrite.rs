//! Lifting an expression rewrite into plan rules.

use crate::error::OptimizerResult;
use crate::ir::Expression;
use crate::plan::PlanNode;
use crate::rule::{Outcome, Rule, RuleContext};
use log::trace;
use std::sync::Arc;

/// Rewrite of a single scalar expression
pub type ExpressionRewrite =
    Arc<dyn Fn(&Expression, &RuleContext) -> OptimizerResult<Expression> + Send + Sync>;

/// Plan node kinds whose expressions a rule set rewrites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Project,
    Filter,
    Join,
    Values,
    PatternRecognition,
}

impl Target {
    fn as_str(&self) -> &'static str {
        match self {
            Target::Project => "Project",
            Target::Filter => "Filter",
            Target::Join => "Join",
            Target::Values => "Values",
            Target::PatternRecognition => "PatternRecognition",
        }
    }
}

/// One expression rewrite applied to every plan node kind that carries
/// expressions, as one rule per kind.
///
/// Each rule only reports a change when the rewrite produced a structurally
/// different expression somewhere in the node.
#[derive(Clone)]
pub struct ExpressionRewriteRuleSet {
    name: String,
    rewrite: ExpressionRewrite,
}

impl ExpressionRewriteRuleSet {
    pub fn new<F>(name: impl Into<String>, rewrite: F) -> Self
    where
        F: Fn(&Expression, &RuleContext) -> OptimizerResult<Expression> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            rewrite: Arc::new(rewrite),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_expression_rewrite(&self) -> Box<dyn Rule> {
        self.rule(Target::Project)
    }

    pub fn filter_expression_rewrite(&self) -> Box<dyn Rule> {
        self.rule(Target::Filter)
    }

    pub fn join_expression_rewrite(&self) -> Box<dyn Rule> {
        self.rule(Target::Join)
    }

    pub fn values_expression_rewrite(&self) -> Box<dyn Rule> {
        self.rule(Target::Values)
    }

    pub fn pattern_recognition_expression_rewrite(&self) -> Box<dyn Rule> {
        self.rule(Target::PatternRecognition)
    }

    /// All rules of the set
    pub fn rules(&self) -> Vec<Box<dyn Rule>> {
        vec![
            self.project_expression_rewrite(),
            self.filter_expression_rewrite(),
            self.join_expression_rewrite(),
            self.values_expression_rewrite(),
            self.pattern_recognition_expression_rewrite(),
        ]
    }

    fn rule(&self, target: Target) -> Box<dyn Rule> {
        Box::new(ExpressionRewriteRule {
            name: format!("{}::{}", self.name, target.as_str()),
            target,
            rewrite: self.rewrite.clone(),
        })
    }
}

struct ExpressionRewriteRule {
    name: String,
    target: Target,
    rewrite: ExpressionRewrite,
}

impl ExpressionRewriteRule {
    /// Rewrite `expression`, returning `None` if it came back unchanged
    fn rewrite_changed(
        &self,
        expression: &Expression,
        context: &RuleContext,
    ) -> OptimizerResult<Option<Expression>> {
        let rewritten = (self.rewrite)(expression, context)?;
        if rewritten == *expression {
            return Ok(None);
        }
        trace!("{}: {} -> {}", self.name, expression, rewritten);
        Ok(Some(rewritten))
    }

    /// Rewrite every expression of a list, or `None` if none changed
    fn rewrite_all<'e>(
        &self,
        expressions: impl IntoIterator<Item = &'e Expression>,
        context: &RuleContext,
    ) -> OptimizerResult<Option<Vec<Expression>>> {
        let mut changed = false;
        let mut rewritten = Vec::new();
        for expression in expressions {
            match self.rewrite_changed(expression, context)? {
                Some(new_expression) => {
                    changed = true;
                    rewritten.push(new_expression);
                }
                None => rewritten.push(expression.clone()),
            }
        }
        Ok(changed.then_some(rewritten))
    }
}

impl Rule for ExpressionRewriteRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, node: &PlanNode) -> bool {
        matches!(
            (self.target, node),
            (Target::Project, PlanNode::Project { .. })
                | (Target::Filter, PlanNode::Filter { .. })
                | (Target::Join, PlanNode::Join { .. })
                | (Target::Values, PlanNode::Values { .. })
                | (Target::PatternRecognition, PlanNode::PatternRecognition { .. })
        )
    }

    fn apply(&self, node: &PlanNode, context: &RuleContext) -> OptimizerResult<Outcome> {
        let rewritten = match node {
            PlanNode::Project {
                id,
                source,
                assignments,
            } => self
                .rewrite_all(assignments.expressions(), context)?
                .map(|expressions| PlanNode::Project {
                    id: *id,
                    source: source.clone(),
                    assignments: assignments
                        .symbols()
                        .into_iter()
                        .zip(expressions)
                        .collect(),
                }),
            PlanNode::Filter {
                id,
                source,
                predicate,
            } => self
                .rewrite_changed(predicate, context)?
                .map(|predicate| PlanNode::Filter {
                    id: *id,
                    source: source.clone(),
                    predicate,
                }),
            PlanNode::Join {
                id,
                join_type,
                left,
                right,
                filter: Some(filter),
            } => self
                .rewrite_changed(filter, context)?
                .map(|filter| PlanNode::Join {
                    id: *id,
                    join_type: *join_type,
                    left: left.clone(),
                    right: right.clone(),
                    filter: Some(filter),
                }),
            PlanNode::Values {
                id,
                output_symbols,
                rows,
            } => self
                .rewrite_all(rows, context)?
                .map(|rows| PlanNode::Values {
                    id: *id,
                    output_symbols: output_symbols.clone(),
                    rows,
                }),
            PlanNode::PatternRecognition {
                id,
                source,
                measures,
                variable_definitions,
            } => {
                let new_measures = self.rewrite_all(measures.expressions(), context)?;
                let new_definitions =
                    self.rewrite_all(variable_definitions.iter().map(|(_, e)| e), context)?;
                if new_measures.is_none() && new_definitions.is_none() {
                    None
                } else {
                    let measures = match new_measures {
                        Some(expressions) => measures.symbols().into_iter().zip(expressions).collect(),
                        None => measures.clone(),
                    };
                    let variable_definitions = match new_definitions {
                        Some(expressions) => variable_definitions
                            .iter()
                            .map(|(name, _)| name.clone())
                            .zip(expressions)
                            .collect(),
                        None => variable_definitions.clone(),
                    };
                    Some(PlanNode::PatternRecognition {
                        id: *id,
                        source: source.clone(),
                        measures,
                        variable_definitions,
                    })
                }
            }
            _ => None,
        };
        Ok(rewritten.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TypeProvider;
    use crate::function::BuiltinFunctions;
    use crate::ir::Symbol;
    use crate::plan::{Assignments, JoinType, PlanNodeIdAllocator};
    use crate::rule::Session;

    /// Replaces every reference to `x` by `y`
    fn rename_rule_set() -> ExpressionRewriteRuleSet {
        ExpressionRewriteRuleSet::new("Rename", |expression, _context| {
            Ok(match expression.as_symbol() {
                Some(symbol) if symbol.name() == "x" => Expression::symbol("y"),
                _ => expression.clone(),
            })
        })
    }

    fn context() -> RuleContext {
        RuleContext::new(
            Session::new("test"),
            TypeProvider::new(),
            Arc::new(BuiltinFunctions::new()),
        )
    }

    #[test]
    fn test_rules_match_their_node_kind() {
        let ids = PlanNodeIdAllocator::new();
        let values = PlanNode::values(ids.next_id(), vec![Symbol::new("x")], vec![]);
        let filter = PlanNode::filter(ids.next_id(), values.clone(), Expression::symbol("x"));

        let rules = rename_rule_set().rules();
        assert_eq!(rules.len(), 5);
        let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
        assert!(names.contains(&"Rename::Filter"));

        let matching: Vec<&str> = rules
            .iter()
            .filter(|r| r.matches(&filter))
            .map(|r| r.name())
            .collect();
        assert_eq!(matching, vec!["Rename::Filter"]);
    }

    #[test]
    fn test_filter_rewrite_and_no_change() {
        let ids = PlanNodeIdAllocator::new();
        let values = PlanNode::values(ids.next_id(), vec![Symbol::new("x")], vec![]);
        let filter = PlanNode::filter(ids.next_id(), values, Expression::symbol("x"));
        let rule = rename_rule_set().filter_expression_rewrite();

        let rewritten = rule.apply(&filter, &context()).unwrap().into_node().unwrap();
        match &rewritten {
            PlanNode::Filter { id, predicate, .. } => {
                assert_eq!(*id, filter.id());
                assert_eq!(predicate, &Expression::symbol("y"));
            }
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(rule.apply(&rewritten, &context()).unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn test_join_without_filter_is_unchanged() {
        let ids = PlanNodeIdAllocator::new();
        let left = PlanNode::values(ids.next_id(), vec![Symbol::new("x")], vec![]);
        let right = PlanNode::values(ids.next_id(), vec![Symbol::new("z")], vec![]);
        let join = PlanNode::join(ids.next_id(), JoinType::Inner, left, right, None);
        let rule = rename_rule_set().join_expression_rewrite();
        assert_eq!(rule.apply(&join, &context()).unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn test_project_keeps_symbols() {
        let ids = PlanNodeIdAllocator::new();
        let values = PlanNode::values(ids.next_id(), vec![Symbol::new("x")], vec![]);
        let assignments = Assignments::new()
            .with(Symbol::new("out"), Expression::symbol("x"))
            .with(Symbol::new("other"), Expression::bigint(1));
        let project = PlanNode::project(ids.next_id(), values, assignments);
        let rule = rename_rule_set().project_expression_rewrite();

        match rule.apply(&project, &context()).unwrap().into_node() {
            Some(PlanNode::Project { assignments, .. }) => {
                assert_eq!(
                    assignments.symbols(),
                    vec![Symbol::new("out"), Symbol::new("other")]
                );
                assert_eq!(
                    assignments.get(&Symbol::new("out")),
                    Some(&Expression::symbol("y"))
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_pattern_recognition_rewrites_definitions() {
        let ids = PlanNodeIdAllocator::new();
        let values = PlanNode::values(ids.next_id(), vec![Symbol::new("x")], vec![]);
        let node = PlanNode::PatternRecognition {
            id: ids.next_id(),
            source: Box::new(values),
            measures: Assignments::new().with(Symbol::new("m"), Expression::bigint(1)),
            variable_definitions: vec![("A".to_string(), Expression::symbol("x"))],
        };
        let rule = rename_rule_set().pattern_recognition_expression_rewrite();
        match rule.apply(&node, &context()).unwrap().into_node() {
            Some(PlanNode::PatternRecognition {
                variable_definitions,
                ..
            }) => {
                assert_eq!(
                    variable_definitions,
                    vec![("A".to_string(), Expression::symbol("y"))]
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
