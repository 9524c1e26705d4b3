//! Function and operator resolution.
//!
//! The interpreter never implements function bodies itself. It asks a
//! [`FunctionResolver`] to turn an operator kind or function name plus
//! argument types into a [`ResolvedFunction`], and later to invoke it.
//!
//! Only `=`, `<`, `<=` and `IS DISTINCT FROM` are required of a resolver for
//! comparisons; the interpreter rewrites the remaining comparison operators in
//! terms of these.

pub mod builtin;
pub mod cast;
pub mod datetime;

pub use builtin::BuiltinFunctions;

use crate::error::ExpressionResult;
use crate::types::DataType;
use crate::value::Value;
use std::fmt;

/// Name of the function whose only effect is to raise an error
pub const FAIL_FUNCTION: &str = "fail";

pub const DATE_TRUNC_FUNCTION: &str = "date_trunc";

/// Marker function call inserted by the planner for dynamic filtering
pub const DYNAMIC_FILTER_FUNCTION: &str = "$internal$dynamic_filter_function";

/// Operators with a dedicated resolution path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorType {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Negation,
    Equal,
    LessThan,
    LessThanOrEqual,
    IsDistinctFrom,
    HashCode,
    Subscript,
    Cast,
}

impl OperatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorType::Add => "ADD",
            OperatorType::Subtract => "SUBTRACT",
            OperatorType::Multiply => "MULTIPLY",
            OperatorType::Divide => "DIVIDE",
            OperatorType::Modulus => "MODULUS",
            OperatorType::Negation => "NEGATION",
            OperatorType::Equal => "EQUAL",
            OperatorType::LessThan => "LESS_THAN",
            OperatorType::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            OperatorType::IsDistinctFrom => "IS_DISTINCT_FROM",
            OperatorType::HashCode => "HASH_CODE",
            OperatorType::Subscript => "SUBSCRIPT",
            OperatorType::Cast => "CAST",
        }
    }

    /// Name under which the operator is registered as a function
    pub fn mangled_name(&self) -> String {
        format!("$operator${}", self.as_str())
    }
}

/// Which arguments accept null and whether the result may be null
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionNullability {
    pub return_nullable: bool,
    pub argument_nullable: Vec<bool>,
}

impl FunctionNullability {
    /// No argument accepts null
    pub fn strict(argument_count: usize) -> Self {
        Self {
            return_nullable: false,
            argument_nullable: vec![false; argument_count],
        }
    }

    pub fn is_argument_nullable(&self, index: usize) -> bool {
        self.argument_nullable.get(index).copied().unwrap_or(false)
    }
}

/// Bound signature of a resolved function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: String,
    pub argument_types: Vec<DataType>,
    pub return_type: DataType,
}

/// A function or operator bound to concrete argument types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedFunction {
    pub signature: Signature,
    pub deterministic: bool,
    pub nullability: FunctionNullability,
}

impl ResolvedFunction {
    pub fn new(
        name: impl Into<String>,
        argument_types: Vec<DataType>,
        return_type: DataType,
    ) -> Self {
        let nullability = FunctionNullability::strict(argument_types.len());
        Self {
            signature: Signature {
                name: name.into(),
                argument_types,
                return_type,
            },
            deterministic: true,
            nullability,
        }
    }

    pub fn non_deterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    pub fn with_nullability(mut self, nullability: FunctionNullability) -> Self {
        self.nullability = nullability;
        self
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn return_type(&self) -> &DataType {
        &self.signature.return_type
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }
}

impl fmt::Display for ResolvedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature.name)
    }
}

/// Capability to resolve and invoke functions and operators.
///
/// Invocation is synchronous. A user-data failure (bad argument, overflow)
/// must be reported as an [`ExpressionError`](crate::error::ExpressionError)
/// whose `is_user_error()` is true.
pub trait FunctionResolver: Send + Sync {
    /// Resolve a named scalar function for the given argument types
    fn resolve_function(
        &self,
        name: &str,
        argument_types: &[DataType],
    ) -> ExpressionResult<ResolvedFunction>;

    /// Resolve an operator for the given argument types
    fn resolve_operator(
        &self,
        operator: OperatorType,
        argument_types: &[DataType],
    ) -> ExpressionResult<ResolvedFunction>;

    /// Resolve the cast from one type to another
    fn get_coercion(&self, from: &DataType, to: &DataType) -> ExpressionResult<ResolvedFunction>;

    /// Smallest type both arguments can be coerced to, if any
    fn common_super_type(&self, left: &DataType, right: &DataType) -> Option<DataType>;

    /// Invoke a previously resolved function
    fn invoke(&self, function: &ResolvedFunction, arguments: &[Value]) -> ExpressionResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_names() {
        assert_eq!(OperatorType::Equal.mangled_name(), "$operator$EQUAL");
        assert_eq!(
            OperatorType::IsDistinctFrom.mangled_name(),
            "$operator$IS_DISTINCT_FROM"
        );
    }

    #[test]
    fn test_resolved_function() {
        let function = ResolvedFunction::new("random", vec![], DataType::Double).non_deterministic();
        assert!(!function.is_deterministic());
        assert_eq!(function.name(), "random");
        assert_eq!(function.return_type(), &DataType::Double);

        let nullability = FunctionNullability::strict(2);
        assert!(!nullability.is_argument_nullable(0));
        assert!(!nullability.is_argument_nullable(5));
    }
}
