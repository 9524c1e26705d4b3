//! Plan rewrite rules.
//!
//! A [`Rule`] looks at a single plan node and either leaves it alone or
//! returns a replacement. Rules never mutate their input, and a rule that
//! fires must make progress: re-applying it to its own output reports
//! [`Outcome::Unchanged`], which is what lets the driver reach a fixpoint.

pub mod expression_rewrite;
pub mod prune_columns;
pub mod remove_redundant_date_trunc;
pub mod simplify_expressions;
pub mod simplify_filter_predicate;

pub use expression_rewrite::{ExpressionRewrite, ExpressionRewriteRuleSet};
pub use prune_columns::{PruneFilterColumns, PruneOffsetColumns, PruneValuesColumns};
pub use remove_redundant_date_trunc::RemoveRedundantDateTrunc;
pub use simplify_expressions::SimplifyExpressions;
pub use simplify_filter_predicate::SimplifyFilterPredicate;

use crate::analysis::{ExpressionTypes, IrTypeAnalyzer, TypeAnalyzer, TypeProvider};
use crate::config::OptimizerConfig;
use crate::error::{ExpressionResult, OptimizerResult};
use crate::function::FunctionResolver;
use crate::interpreter::ExpressionInterpreter;
use crate::ir::Expression;
use crate::plan::{PlanNode, PlanNodeIdAllocator};
use std::sync::Arc;

/// A single plan rewrite
pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap shape check; `apply` is only called on matching nodes
    fn matches(&self, node: &PlanNode) -> bool;

    fn apply(&self, node: &PlanNode, context: &RuleContext) -> OptimizerResult<Outcome>;
}

/// Result of applying a rule to one node
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Unchanged,
    Rewritten(PlanNode),
}

impl Outcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, Outcome::Rewritten(_))
    }

    /// The replacement node, if the rule fired
    pub fn into_node(self) -> Option<PlanNode> {
        match self {
            Outcome::Unchanged => None,
            Outcome::Rewritten(node) => Some(node),
        }
    }
}

impl From<Option<PlanNode>> for Outcome {
    fn from(node: Option<PlanNode>) -> Self {
        node.map_or(Outcome::Unchanged, Outcome::Rewritten)
    }
}

/// Per-query state visible to rules
#[derive(Debug, Clone)]
pub struct Session {
    query_id: String,
    config: OptimizerConfig,
}

impl Session {
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            config: OptimizerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}

/// Collaborators handed to every rule application
pub struct RuleContext {
    session: Session,
    symbol_types: TypeProvider,
    functions: Arc<dyn FunctionResolver>,
    type_analyzer: Arc<dyn TypeAnalyzer>,
    id_allocator: PlanNodeIdAllocator,
}

impl RuleContext {
    /// Context using [`IrTypeAnalyzer`] over `functions` for typing
    pub fn new(
        session: Session,
        symbol_types: TypeProvider,
        functions: Arc<dyn FunctionResolver>,
    ) -> Self {
        let type_analyzer = Arc::new(IrTypeAnalyzer::new(functions.clone()));
        Self {
            session,
            symbol_types,
            functions,
            type_analyzer,
            id_allocator: PlanNodeIdAllocator::new(),
        }
    }

    pub fn with_type_analyzer(mut self, type_analyzer: Arc<dyn TypeAnalyzer>) -> Self {
        self.type_analyzer = type_analyzer;
        self
    }

    /// Allocate plan node ids from `allocator` instead of starting at zero
    pub fn with_id_allocator(mut self, allocator: PlanNodeIdAllocator) -> Self {
        self.id_allocator = allocator;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn symbol_types(&self) -> &TypeProvider {
        &self.symbol_types
    }

    pub fn functions(&self) -> &Arc<dyn FunctionResolver> {
        &self.functions
    }

    pub fn id_allocator(&self) -> &PlanNodeIdAllocator {
        &self.id_allocator
    }

    /// Type every node of `expression` against the query's symbol types
    pub fn get_types(&self, expression: &Expression) -> ExpressionResult<ExpressionTypes> {
        self.type_analyzer.get_types(&self.symbol_types, expression)
    }

    /// Interpreter for `expression` configured from the session
    pub fn interpreter(
        &self,
        expression: Expression,
        types: ExpressionTypes,
    ) -> ExpressionResult<ExpressionInterpreter> {
        let interpreter = ExpressionInterpreter::new(expression, self.functions.clone(), types)?;
        Ok(interpreter.with_in_list_cache(self.session.config().enable_in_list_cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::BuiltinFunctions;
    use crate::interpreter::NoOpSymbolResolver;
    use crate::plan::PlanNodeId;
    use crate::types::DataType;
    use crate::value::Value;

    #[test]
    fn test_outcome() {
        let node = PlanNode::values(PlanNodeId::new(0), vec![], vec![]);
        assert!(!Outcome::from(None).is_changed());
        let outcome = Outcome::from(Some(node.clone()));
        assert!(outcome.is_changed());
        assert_eq!(outcome.into_node(), Some(node));
    }

    #[test]
    fn test_context_interpreter_uses_session_config() {
        let session = Session::new("q1").with_config(OptimizerConfig::default().with_in_list_cache(false));
        let context = RuleContext::new(
            session,
            TypeProvider::new().with("a", DataType::BigInt),
            Arc::new(BuiltinFunctions::new()),
        );
        assert_eq!(context.session().query_id(), "q1");

        let expression = Expression::in_list(
            Expression::bigint(2),
            vec![Expression::bigint(1), Expression::bigint(2)],
        );
        let types = context.get_types(&expression).unwrap();
        let interpreter = context.interpreter(expression, types).unwrap();
        assert_eq!(
            interpreter.optimize(&NoOpSymbolResolver).unwrap().into_value(),
            Some(Value::Boolean(true))
        );
        assert_eq!(interpreter.cached_in_lists(), 0);
    }
}
