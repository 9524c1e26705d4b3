//! Partial evaluation of IR expressions.
//!
//! [`ExpressionInterpreter`] walks a typed expression and either computes its
//! value (`evaluate`) or folds whatever can be computed and returns the rest
//! as a simplified expression (`optimize`).
//!
//! In optimize mode, failures caused by the data (division by zero, a failing
//! cast, `fail()`) never escape: the failing sub-expression is left in the
//! output unevaluated. Lazily evaluated constructs such as CASE, COALESCE and
//! AND/OR may then drop it altogether, or it fails at execution time.

pub mod in_list;
mod lambda;
mod visitor;

use crate::analysis::{ExpressionTypes, IrTypeAnalyzer, TypeAnalyzer, TypeProvider};
use crate::error::{ExpressionError, ExpressionResult};
use crate::function::FunctionResolver;
use crate::interpreter::visitor::{Evaluator, InListCache};
use crate::ir::{Expression, Symbol};
use crate::types::DataType;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of processing a node: a concrete value, or the residual expression
/// that still has to be evaluated at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    Value(Value),
    Residual(Expression),
}

impl Folded {
    pub fn null() -> Self {
        Folded::Value(Value::Null)
    }

    pub fn is_residual(&self) -> bool {
        matches!(self, Folded::Residual(_))
    }

    /// Whether this is the concrete value NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Folded::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Folded::Value(value) => Some(value),
            Folded::Residual(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Folded::Value(value) => Some(value),
            Folded::Residual(_) => None,
        }
    }

    /// Express the result as IR, typing a folded value with `data_type`
    pub fn into_expression(self, data_type: DataType) -> Expression {
        match self {
            Folded::Value(value) => Expression::constant(data_type, value),
            Folded::Residual(expression) => expression,
        }
    }
}

/// Source of values for symbol references. `None` leaves the reference
/// unresolved.
pub trait SymbolResolver {
    fn get(&self, symbol: &Symbol) -> Option<Value>;
}

/// Resolves nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSymbolResolver;

impl SymbolResolver for NoOpSymbolResolver {
    fn get(&self, _symbol: &Symbol) -> Option<Value> {
        None
    }
}

/// Resolves symbols from a fixed map
#[derive(Debug, Default, Clone)]
pub struct MapSymbolResolver {
    values: HashMap<Symbol, Value>,
}

impl MapSymbolResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(Symbol::new(name), value);
        self
    }
}

impl SymbolResolver for MapSymbolResolver {
    fn get(&self, symbol: &Symbol) -> Option<Value> {
        self.values.get(symbol).cloned()
    }
}

impl FromIterator<(Symbol, Value)> for MapSymbolResolver {
    fn from_iter<I: IntoIterator<Item = (Symbol, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Interpreter bound to one expression and the types of its nodes.
///
/// Hashed IN-list sets are cached per instance, keyed by the identity of the
/// IN node, so repeated evaluations of the same tree build each set once.
/// The cache uses interior mutability and the interpreter is therefore not
/// `Sync`; use one instance per thread.
pub struct ExpressionInterpreter {
    expression: Expression,
    functions: Arc<dyn FunctionResolver>,
    types: ExpressionTypes,
    in_list_cache: InListCache,
    in_list_cache_enabled: bool,
}

impl ExpressionInterpreter {
    /// Create an interpreter. `types` must cover every node of `expression`.
    pub fn new(
        expression: Expression,
        functions: Arc<dyn FunctionResolver>,
        types: ExpressionTypes,
    ) -> ExpressionResult<Self> {
        if !types.contains(&expression) {
            return Err(ExpressionError::MissingType {
                expression: expression.to_string(),
            });
        }
        Ok(Self {
            expression,
            functions,
            types,
            in_list_cache: RefCell::new(HashMap::new()),
            in_list_cache_enabled: true,
        })
    }

    /// Enable or disable the hashed IN-list path. Results are the same
    /// either way.
    pub fn with_in_list_cache(mut self, enabled: bool) -> Self {
        self.in_list_cache_enabled = enabled;
        self
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn result_type(&self) -> ExpressionResult<&DataType> {
        self.types.type_of(&self.expression)
    }

    /// Evaluate an expression without symbol references
    pub fn evaluate(&self) -> ExpressionResult<Value> {
        self.evaluate_with(&NoOpSymbolResolver)
    }

    /// Evaluate to a concrete value. Fails with
    /// [`ExpressionError::Unresolved`] when the result depends on a symbol
    /// the resolver does not know.
    pub fn evaluate_with(&self, resolver: &dyn SymbolResolver) -> ExpressionResult<Value> {
        match self.run(resolver, false)? {
            Folded::Value(value) => Ok(value),
            Folded::Residual(expression) => Err(ExpressionError::Unresolved {
                expression: expression.to_string(),
            }),
        }
    }

    /// Fold everything computable. User-data errors are deferred, other
    /// errors are returned.
    pub fn optimize(&self, resolver: &dyn SymbolResolver) -> ExpressionResult<Folded> {
        let result = self.run(resolver, true)?;
        if let Folded::Residual(residual) = &result {
            debug!("Optimized {} to {}", self.expression, residual);
        }
        Ok(result)
    }

    /// Number of IN nodes seen so far whose list qualified for hashing
    pub fn cached_in_lists(&self) -> usize {
        self.in_list_cache
            .borrow()
            .values()
            .filter(|set| set.is_some())
            .count()
    }

    fn run(&self, resolver: &dyn SymbolResolver, optimize: bool) -> ExpressionResult<Folded> {
        let mut evaluator = Evaluator {
            functions: &self.functions,
            types: &self.types,
            in_list_cache: self.in_list_cache_enabled.then_some(&self.in_list_cache),
            optimize,
            resolver,
        };
        evaluator.process_guarded(&self.expression)
    }
}

/// Evaluate an expression that references no symbols
pub fn evaluate_constant_expression(
    expression: &Expression,
    functions: Arc<dyn FunctionResolver>,
) -> ExpressionResult<Value> {
    let analyzer = IrTypeAnalyzer::new(functions.clone());
    let types = analyzer.get_types(&TypeProvider::new(), expression)?;
    ExpressionInterpreter::new(expression.clone(), functions, types)?.evaluate()
}
