//! Fixed-point rule driver.
//!
//! Each pass walks the plan top-down. At every node the matching rules run in
//! registration order, each seeing the output of the previous one, and then
//! the pass descends into the sources of the resulting node. Passes repeat
//! until one leaves the plan unchanged or the configured iteration limit is
//! reached.

use crate::error::OptimizerResult;
use crate::plan::PlanNode;
use crate::rule::{Outcome, Rule, RuleContext};
use log::debug;

/// One rule firing recorded when tracing is enabled
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTrace {
    pub rule_name: String,
    /// Subtree rooted at the rewritten node before the rule fired
    pub before: String,
    pub after: String,
}

impl RuleTrace {
    pub fn new(
        rule_name: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            before: before.into(),
            after: after.into(),
        }
    }
}

/// The optimized plan together with statistics about the run
#[derive(Debug, Clone)]
pub struct OptimizedPlan {
    pub plan: PlanNode,
    /// Number of passes over the plan
    pub iterations: usize,
    /// Number of rule firings across all passes
    pub rules_applied: usize,
    /// Empty unless tracing was enabled
    pub trace: Vec<RuleTrace>,
}

impl OptimizedPlan {
    /// Human-readable summary of the trace
    pub fn format_trace(&self) -> String {
        let mut output = format!(
            "Optimization completed in {} iterations, {} rules applied\n",
            self.iterations, self.rules_applied
        );
        if self.trace.is_empty() {
            output.push_str("  (no trace available)\n");
            return output;
        }
        for (i, entry) in self.trace.iter().enumerate() {
            output.push_str(&format!(
                "\n--- Rule {} applied: {} ---\nBefore:\n{}After:\n{}",
                i + 1,
                entry.rule_name,
                entry.before,
                entry.after
            ));
        }
        output
    }
}

/// Applies a list of rules to a plan until none of them fires.
///
/// Rules must make progress when they fire; a rule that keeps reporting a
/// rewrite of its own output only stops at the iteration limit.
#[derive(Default)]
pub struct IterativeOptimizer {
    rules: Vec<Box<dyn Rule>>,
}

/// Counters shared by the nodes of one pass
struct Pass {
    rules_applied: usize,
    trace: Option<Vec<RuleTrace>>,
}

impl IterativeOptimizer {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn add_rule<R: Rule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Box<dyn Rule>>) {
        self.rules.extend(rules);
    }

    pub fn optimize(&self, plan: PlanNode, context: &RuleContext) -> OptimizerResult<OptimizedPlan> {
        let config = context.session().config();
        let mut current = plan;
        let mut iterations = 0;
        let mut pass = Pass {
            rules_applied: 0,
            trace: config.enable_trace.then(Vec::new),
        };

        loop {
            if iterations >= config.max_iterations {
                debug!(
                    "Optimizer reached max iterations ({}) for query {}, stopping",
                    config.max_iterations,
                    context.session().query_id()
                );
                break;
            }
            iterations += 1;

            let before = pass.rules_applied;
            current = self.optimize_node(current, context, &mut pass)?;
            if pass.rules_applied == before {
                debug!("No changes in iteration {}, reached fixpoint", iterations);
                break;
            }
        }

        Ok(OptimizedPlan {
            plan: current,
            iterations,
            rules_applied: pass.rules_applied,
            trace: pass.trace.unwrap_or_default(),
        })
    }

    fn optimize_node(
        &self,
        node: PlanNode,
        context: &RuleContext,
        pass: &mut Pass,
    ) -> OptimizerResult<PlanNode> {
        let mut current = node;
        for rule in &self.rules {
            if !rule.matches(&current) {
                continue;
            }
            if let Outcome::Rewritten(rewritten) = rule.apply(&current, context)? {
                debug!("Rule '{}' applied to {} {}", rule.name(), current.kind_name(), current.id());
                if let Some(trace) = pass.trace.as_mut() {
                    trace.push(RuleTrace::new(rule.name(), current.explain(), rewritten.explain()));
                }
                pass.rules_applied += 1;
                current = rewritten;
            }
        }

        let sources = current.sources();
        if sources.is_empty() {
            return Ok(current);
        }
        let applied = pass.rules_applied;
        let new_sources = sources
            .into_iter()
            .map(|source| self.optimize_node(source.clone(), context, pass))
            .collect::<OptimizerResult<Vec<_>>>()?;
        if pass.rules_applied == applied {
            return Ok(current);
        }
        current.replace_sources(new_sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TypeProvider;
    use crate::config::OptimizerConfig;
    use crate::function::BuiltinFunctions;
    use crate::ir::{Expression, Symbol};
    use crate::plan::{PlanNodeId, PlanNodeIdAllocator};
    use crate::rule::Session;
    use std::sync::Arc;

    /// Decrements every Offset count until it reaches zero
    struct ShrinkOffset;

    impl Rule for ShrinkOffset {
        fn name(&self) -> &str {
            "ShrinkOffset"
        }

        fn matches(&self, node: &PlanNode) -> bool {
            matches!(node, PlanNode::Offset { count, .. } if *count > 0)
        }

        fn apply(&self, node: &PlanNode, _context: &RuleContext) -> OptimizerResult<Outcome> {
            Ok(match node {
                PlanNode::Offset { id, source, count } => Outcome::Rewritten(PlanNode::Offset {
                    id: *id,
                    source: source.clone(),
                    count: count - 1,
                }),
                _ => Outcome::Unchanged,
            })
        }
    }

    struct NoChange;

    impl Rule for NoChange {
        fn name(&self) -> &str {
            "NoChange"
        }

        fn matches(&self, _node: &PlanNode) -> bool {
            true
        }

        fn apply(&self, _node: &PlanNode, _context: &RuleContext) -> OptimizerResult<Outcome> {
            Ok(Outcome::Unchanged)
        }
    }

    fn context(config: OptimizerConfig) -> RuleContext {
        RuleContext::new(
            Session::new("test").with_config(config),
            TypeProvider::new(),
            Arc::new(BuiltinFunctions::new()),
        )
    }

    fn plan(count: u64) -> PlanNode {
        let ids = PlanNodeIdAllocator::new();
        let values = PlanNode::values(ids.next_id(), vec![Symbol::new("a")], vec![]);
        let offset = PlanNode::offset(ids.next_id(), values, count);
        PlanNode::filter(ids.next_id(), offset, Expression::symbol("a"))
    }

    #[test]
    fn test_fixpoint_without_rules_firing() {
        let optimizer = IterativeOptimizer::new(vec![Box::new(NoChange)]);
        let result = optimizer
            .optimize(plan(0), &context(OptimizerConfig::default()))
            .unwrap();
        assert_eq!(result.iterations, 1);
        assert_eq!(result.rules_applied, 0);
        assert_eq!(result.plan, plan(0));
    }

    #[test]
    fn test_rewrites_below_the_root() {
        let mut optimizer = IterativeOptimizer::default();
        optimizer.add_rule(ShrinkOffset);
        let result = optimizer
            .optimize(plan(3), &context(OptimizerConfig::default()))
            .unwrap();

        assert_eq!(result.plan, plan(0));
        assert_eq!(result.rules_applied, 3);
        // three passes that fire and one that confirms the fixpoint
        assert_eq!(result.iterations, 4);
        assert_eq!(result.plan.id(), PlanNodeId::new(2));
    }

    #[test]
    fn test_iteration_limit_stops_without_error() {
        let optimizer = IterativeOptimizer::new(vec![Box::new(ShrinkOffset)]);
        let config = OptimizerConfig::default().with_max_iterations(2);
        let result = optimizer.optimize(plan(5), &context(config)).unwrap();
        assert_eq!(result.iterations, 2);
        assert_eq!(result.plan, plan(3));
    }

    #[test]
    fn test_trace() {
        let optimizer = IterativeOptimizer::new(vec![Box::new(ShrinkOffset)]);
        let result = optimizer
            .optimize(plan(1), &context(OptimizerConfig::default()))
            .unwrap();
        assert!(result.trace.is_empty());
        assert!(result.format_trace().contains("(no trace available)"));

        let config = OptimizerConfig::default().with_trace(true);
        let result = optimizer.optimize(plan(1), &context(config)).unwrap();
        assert_eq!(
            result.trace,
            vec![RuleTrace::new(
                "ShrinkOffset",
                "Offset 1\n  Values [a] rows=\n",
                "Offset 0\n  Values [a] rows=\n"
            )]
        );
        assert!(result.format_trace().contains("Rule 1 applied: ShrinkOffset"));
    }
}
