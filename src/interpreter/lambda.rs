//! Turning lambda expressions into callable values.

use crate::analysis::ExpressionTypes;
use crate::error::{ExpressionError, ExpressionResult};
use crate::function::FunctionResolver;
use crate::interpreter::visitor::Evaluator;
use crate::interpreter::{Folded, SymbolResolver};
use crate::ir::{Expression, Symbol};
use crate::value::{FunctionValue, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Binds lambda parameter names to the values of one invocation
struct LambdaSymbolResolver<'a> {
    names: &'a [String],
    values: &'a [Value],
}

impl SymbolResolver for LambdaSymbolResolver<'_> {
    fn get(&self, symbol: &Symbol) -> Option<Value> {
        self.names
            .iter()
            .position(|name| name == symbol.name())
            .and_then(|i| self.values.get(i).cloned())
    }
}

/// Hides lambda parameters from the enclosing resolver so that a parameter
/// shadowing an outer symbol stays unresolved while the body is optimized
pub(crate) struct ShadowedSymbolResolver<'a> {
    pub(crate) hidden: &'a [String],
    pub(crate) outer: &'a dyn SymbolResolver,
}

impl SymbolResolver for ShadowedSymbolResolver<'_> {
    fn get(&self, symbol: &Symbol) -> Option<Value> {
        if self.hidden.iter().any(|name| name == symbol.name()) {
            None
        } else {
            self.outer.get(symbol)
        }
    }
}

/// Build a function value evaluating `body` with `arguments` bound to the
/// values it is invoked with. Each invocation evaluates with a fresh IN-list
/// cache.
pub(crate) fn lambda_function(
    functions: Arc<dyn FunctionResolver>,
    types: ExpressionTypes,
    in_list_cache_enabled: bool,
    arguments: Vec<String>,
    body: Expression,
) -> FunctionValue {
    let arity = arguments.len();
    FunctionValue::new(arity, move |values: &[Value]| {
        if values.len() != arguments.len() {
            return Err(ExpressionError::ArgumentCount {
                function: format!("({}) -> {}", arguments.join(", "), body),
                expected: arguments.len(),
                actual: values.len(),
            });
        }
        let resolver = LambdaSymbolResolver {
            names: &arguments,
            values,
        };
        let cache = RefCell::new(HashMap::new());
        let mut evaluator = Evaluator {
            functions: &functions,
            types: &types,
            in_list_cache: in_list_cache_enabled.then_some(&cache),
            optimize: false,
            resolver: &resolver,
        };
        match evaluator.process_guarded(&body)? {
            Folded::Value(value) => Ok(value),
            Folded::Residual(expression) => Err(ExpressionError::Unresolved {
                expression: expression.to_string(),
            }),
        }
    })
}
