//! Static typing of IR expressions.
//!
//! The interpreter and the rules never infer types themselves; they look them
//! up by node identity in an [`ExpressionTypes`] map produced here (or handed
//! in by an upstream phase).

use crate::error::{ExpressionError, ExpressionResult};
use crate::function::FunctionResolver;
use crate::ir::{ExprKind, Expression, NodeId, Symbol};
use crate::types::DataType;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved type of every node in an expression tree, keyed by node identity
#[derive(Debug, Clone, Default)]
pub struct ExpressionTypes {
    types: Arc<HashMap<NodeId, DataType>>,
}

impl ExpressionTypes {
    pub fn new(types: HashMap<NodeId, DataType>) -> Self {
        Self {
            types: Arc::new(types),
        }
    }

    pub fn get(&self, expression: &Expression) -> Option<&DataType> {
        self.types.get(&expression.id())
    }

    /// Type of `expression`, failing if the node was never typed
    pub fn type_of(&self, expression: &Expression) -> ExpressionResult<&DataType> {
        self.get(expression)
            .ok_or_else(|| ExpressionError::MissingType {
                expression: expression.to_string(),
            })
    }

    pub fn contains(&self, expression: &Expression) -> bool {
        self.types.contains_key(&expression.id())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Types of the symbols visible to an expression
#[derive(Debug, Clone, Default)]
pub struct TypeProvider {
    types: HashMap<Symbol, DataType>,
}

impl TypeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol, data_type: DataType) {
        self.types.insert(symbol, data_type);
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.insert(Symbol::new(name), data_type);
        self
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&DataType> {
        self.types.get(symbol)
    }
}

impl FromIterator<(Symbol, DataType)> for TypeProvider {
    fn from_iter<I: IntoIterator<Item = (Symbol, DataType)>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

/// Computes [`ExpressionTypes`] for an expression tree
pub trait TypeAnalyzer: Send + Sync {
    fn get_types(
        &self,
        symbols: &TypeProvider,
        expression: &Expression,
    ) -> ExpressionResult<ExpressionTypes>;

    fn get_type(&self, symbols: &TypeProvider, expression: &Expression) -> ExpressionResult<DataType> {
        let types = self.get_types(symbols, expression)?;
        types.type_of(expression).cloned()
    }
}

/// Default analyzer deriving each node's type from its children, resolved
/// function signatures and declared cast targets.
///
/// Lambda argument types are taken from the function type expected at the
/// lambda's position, so a lambda is only typeable as a function argument
/// (possibly through a BIND).
pub struct IrTypeAnalyzer {
    functions: Arc<dyn FunctionResolver>,
}

impl IrTypeAnalyzer {
    pub fn new(functions: Arc<dyn FunctionResolver>) -> Self {
        Self { functions }
    }
}

impl TypeAnalyzer for IrTypeAnalyzer {
    fn get_types(
        &self,
        symbols: &TypeProvider,
        expression: &Expression,
    ) -> ExpressionResult<ExpressionTypes> {
        let mut analysis = Analysis {
            functions: self.functions.as_ref(),
            symbols,
            scope: Vec::new(),
            types: HashMap::new(),
        };
        analysis.analyze(expression, None)?;
        Ok(ExpressionTypes::new(analysis.types))
    }
}

struct Analysis<'a> {
    functions: &'a dyn FunctionResolver,
    symbols: &'a TypeProvider,
    /// Lambda arguments in scope, innermost last
    scope: Vec<(String, DataType)>,
    types: HashMap<NodeId, DataType>,
}

impl Analysis<'_> {
    fn analyze(
        &mut self,
        expression: &Expression,
        expected: Option<&DataType>,
    ) -> ExpressionResult<DataType> {
        let data_type = self.infer(expression, expected)?;
        self.types.insert(expression.id(), data_type.clone());
        Ok(data_type)
    }

    fn super_type(&self, left: DataType, right: DataType) -> ExpressionResult<DataType> {
        if left == right {
            return Ok(left);
        }
        self.functions
            .common_super_type(&left, &right)
            .ok_or_else(|| ExpressionError::type_mismatch("common super type", left.to_string(), right))
    }

    fn unify<'e>(&mut self, expressions: impl IntoIterator<Item = &'e Expression>) -> ExpressionResult<DataType> {
        let mut result: Option<DataType> = None;
        for expression in expressions {
            let data_type = self.analyze(expression, None)?;
            result = Some(match result {
                None => data_type,
                Some(previous) => self.super_type(previous, data_type)?,
            });
        }
        Ok(result.unwrap_or(DataType::Unknown))
    }

    fn infer(&mut self, expression: &Expression, expected: Option<&DataType>) -> ExpressionResult<DataType> {
        match expression.kind() {
            ExprKind::Constant(constant) => Ok(constant.data_type.clone()),
            ExprKind::SymbolReference(reference) => {
                let scoped = self
                    .scope
                    .iter()
                    .rev()
                    .find(|(name, _)| *name == reference.name)
                    .map(|(_, data_type)| data_type.clone());
                scoped
                    .or_else(|| self.symbols.get(&Symbol::from(reference)).cloned())
                    .ok_or_else(|| ExpressionError::MissingType {
                        expression: reference.name.clone(),
                    })
            }
            ExprKind::ArithmeticBinary(node) => {
                self.analyze(&node.left, None)?;
                self.analyze(&node.right, None)?;
                Ok(node.function.return_type().clone())
            }
            ExprKind::ArithmeticNegation(node) => self.analyze(&node.value, None),
            ExprKind::Comparison(_)
            | ExprKind::Between(_)
            | ExprKind::Logical(_)
            | ExprKind::Not(_)
            | ExprKind::IsNull(_)
            | ExprKind::In(_) => {
                for child in expression.children() {
                    self.analyze(child, None)?;
                }
                Ok(DataType::Boolean)
            }
            ExprKind::Coalesce(node) => self.unify(&node.operands),
            ExprKind::NullIf(node) => {
                let first = self.analyze(&node.first, None)?;
                self.analyze(&node.second, None)?;
                Ok(first)
            }
            ExprKind::SearchedCase(node) => {
                for clause in &node.when_clauses {
                    self.analyze(&clause.operand, None)?;
                }
                self.unify(
                    node.when_clauses
                        .iter()
                        .map(|c| &c.result)
                        .chain(node.default_value.iter()),
                )
            }
            ExprKind::SimpleCase(node) => {
                self.analyze(&node.operand, None)?;
                for clause in &node.when_clauses {
                    self.analyze(&clause.operand, None)?;
                }
                self.unify(
                    node.when_clauses
                        .iter()
                        .map(|c| &c.result)
                        .chain(node.default_value.iter()),
                )
            }
            ExprKind::Cast(node) => {
                self.analyze(&node.expression, None)?;
                Ok(node.target_type.clone())
            }
            ExprKind::Row(node) => {
                let fields = node
                    .items
                    .iter()
                    .map(|item| self.analyze(item, None))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                Ok(DataType::row(fields))
            }
            ExprKind::Subscript(node) => {
                let base = self.analyze(&node.base, None)?;
                self.analyze(&node.index, None)?;
                match base {
                    DataType::Array(element) => Ok(*element),
                    DataType::Map(_, value) => Ok(*value),
                    DataType::Row(fields) => {
                        let position = node
                            .index
                            .as_constant()
                            .and_then(|c| c.value.as_i64())
                            .ok_or_else(|| {
                                ExpressionError::type_mismatch(
                                    "row subscript",
                                    "constant field index",
                                    &node.index,
                                )
                            })?;
                        position
                            .checked_sub(1)
                            .and_then(|i| usize::try_from(i).ok())
                            .and_then(|i| fields.get(i))
                            .map(|field| field.data_type.clone())
                            .ok_or_else(|| {
                                ExpressionError::InvalidFunctionArgument(format!(
                                    "ROW index out of bounds: {}",
                                    position
                                ))
                            })
                    }
                    other => Err(ExpressionError::type_mismatch(
                        "subscript",
                        "array, map or row",
                        other,
                    )),
                }
            }
            ExprKind::FunctionCall(node) => {
                for (i, argument) in node.arguments.iter().enumerate() {
                    let parameter = node.function.signature.argument_types.get(i);
                    self.analyze(argument, parameter)?;
                }
                Ok(node.function.return_type().clone())
            }
            ExprKind::Lambda(node) => {
                let parameters = match expected {
                    Some(DataType::Function(parameters, _))
                        if parameters.len() == node.arguments.len() =>
                    {
                        parameters.clone()
                    }
                    _ => {
                        return Err(ExpressionError::NotSupported(format!(
                            "lambda outside of a function argument: {}",
                            expression
                        )))
                    }
                };
                let depth = self.scope.len();
                self.scope.extend(
                    node.arguments
                        .iter()
                        .cloned()
                        .zip(parameters.iter().cloned()),
                );
                let body = self.analyze(&node.body, None);
                self.scope.truncate(depth);
                Ok(DataType::function(parameters, body?))
            }
            ExprKind::Bind(node) => {
                let mut parameters = node
                    .values
                    .iter()
                    .map(|value| self.analyze(value, None))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                let bound = parameters.len();
                let function_expected = match expected {
                    Some(DataType::Function(remaining, return_type)) => {
                        parameters.extend(remaining.iter().cloned());
                        Some(DataType::function(parameters, (**return_type).clone()))
                    }
                    _ => None,
                };
                match self.analyze(&node.function, function_expected.as_ref())? {
                    DataType::Function(all, return_type) if all.len() >= bound => {
                        Ok(DataType::Function(all[bound..].to_vec(), return_type))
                    }
                    other => Err(ExpressionError::type_mismatch("bind", "function", other)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{BuiltinFunctions, OperatorType};
    use crate::ir::{ArithmeticOperator, WhenClause};

    fn analyzer() -> IrTypeAnalyzer {
        IrTypeAnalyzer::new(Arc::new(BuiltinFunctions::new()))
    }

    #[test]
    fn test_types_every_node() {
        let symbols = TypeProvider::new().with("a", DataType::BigInt);
        let left = Expression::symbol("a");
        let right = Expression::bigint(1);
        let comparison = Expression::equal(left.clone(), right.clone());

        let types = analyzer().get_types(&symbols, &comparison).unwrap();
        assert_eq!(types.len(), 3);
        assert_eq!(types.get(&left), Some(&DataType::BigInt));
        assert_eq!(types.get(&comparison), Some(&DataType::Boolean));

        // a structurally equal node elsewhere is not typed
        assert!(types.get(&Expression::symbol("a")).is_none());
    }

    #[test]
    fn test_unknown_symbol() {
        let result = analyzer().get_types(&TypeProvider::new(), &Expression::symbol("missing"));
        assert!(matches!(result, Err(ExpressionError::MissingType { .. })));
    }

    #[test]
    fn test_case_and_coalesce_unify() {
        let symbols = TypeProvider::new().with("c", DataType::Boolean);
        let case = Expression::searched_case(
            vec![WhenClause::new(Expression::symbol("c"), Expression::integer(1))],
            Some(Expression::bigint(2)),
        );
        assert_eq!(analyzer().get_type(&symbols, &case).unwrap(), DataType::BigInt);

        let coalesce = Expression::coalesce(vec![
            Expression::null(DataType::Unknown),
            Expression::varchar("x"),
        ]);
        assert_eq!(analyzer().get_type(&symbols, &coalesce).unwrap(), DataType::Varchar);
    }

    #[test]
    fn test_row_subscript() {
        let symbols = TypeProvider::new().with(
            "r",
            DataType::row([DataType::BigInt, DataType::Varchar]),
        );
        let subscript = Expression::subscript(Expression::symbol("r"), Expression::bigint(2));
        assert_eq!(analyzer().get_type(&symbols, &subscript).unwrap(), DataType::Varchar);

        for position in [0, 3, -1, i64::MIN] {
            let subscript = Expression::subscript(
                Expression::row(vec![Expression::bigint(1)]),
                Expression::bigint(position),
            );
            assert!(matches!(
                analyzer().get_type(&symbols, &subscript),
                Err(ExpressionError::InvalidFunctionArgument(_))
            ));
        }
    }

    #[test]
    fn test_lambda_argument_types() {
        let functions = BuiltinFunctions::new();
        let add = functions
            .resolve_operator(OperatorType::Add, &[DataType::BigInt, DataType::BigInt])
            .unwrap();
        let transform = functions
            .resolve_function(
                "transform",
                &[
                    DataType::array(DataType::BigInt),
                    DataType::function(vec![DataType::BigInt], DataType::BigInt),
                ],
            )
            .unwrap();
        let body = Expression::arithmetic(
            ArithmeticOperator::Add,
            add,
            Expression::symbol("x"),
            Expression::bigint(1),
        );
        let lambda = Expression::lambda(vec!["x".to_string()], body);
        let call = Expression::call(transform, vec![Expression::symbol("xs"), lambda.clone()]);

        let symbols = TypeProvider::new().with("xs", DataType::array(DataType::BigInt));
        let types = analyzer().get_types(&symbols, &call).unwrap();
        assert_eq!(
            types.get(&lambda),
            Some(&DataType::function(vec![DataType::BigInt], DataType::BigInt))
        );
        assert_eq!(types.get(&call), Some(&DataType::array(DataType::BigInt)));
    }
}
