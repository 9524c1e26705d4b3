//! Error types for expression evaluation and plan rewriting.

use crate::types::DataType;
use thiserror::Error;

/// Errors raised while evaluating or analyzing expressions.
///
/// Two classes share this enum. User-data errors are the query's real runtime
/// failures (bad argument, overflow, `fail(...)`); the interpreter defers them
/// while optimizing. Everything else is an internal-contract violation and is
/// never caught.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric overflow: {0}")]
    NumericOverflow(String),

    #[error("Invalid function argument: {0}")]
    InvalidFunctionArgument(String),

    #[error("Cannot cast {value} to {target}")]
    InvalidCast { value: String, target: DataType },

    #[error("{0}")]
    IndexOutOfBounds(String),

    #[error("{0}")]
    UserFailure(String),

    #[error("Type not found for expression: {expression}")]
    MissingType { expression: String },

    #[error("Expression interpreter returned an unresolved expression: {expression}")]
    Unresolved { expression: String },

    #[error("Function not found: {name}({arguments})")]
    FunctionNotFound { name: String, arguments: String },

    #[error("Function {function} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        context: String,
    },

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl ExpressionError {
    /// Whether this error is caused by the data being processed rather than by
    /// a bug in an upstream phase
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ExpressionError::DivisionByZero
                | ExpressionError::NumericOverflow(_)
                | ExpressionError::InvalidFunctionArgument(_)
                | ExpressionError::InvalidCast { .. }
                | ExpressionError::IndexOutOfBounds(_)
                | ExpressionError::UserFailure(_)
        )
    }

    pub(crate) fn type_mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        actual: impl ToString,
    ) -> Self {
        ExpressionError::TypeMismatch {
            expected: expected.into(),
            actual: actual.to_string(),
            context: context.into(),
        }
    }
}

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Errors raised by rewrite rules and the iterative optimizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

/// Result type for rule application
pub type OptimizerResult<T> = Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ExpressionError::DivisionByZero.to_string(), "Division by zero");

        let err = ExpressionError::InvalidCast {
            value: "'abc'".to_string(),
            target: DataType::Integer,
        };
        assert_eq!(err.to_string(), "Cannot cast 'abc' to integer");

        let err = ExpressionError::ArgumentCount {
            function: "date_trunc".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Function date_trunc expects 2 arguments, got 1"
        );

        let err: OptimizerError = ExpressionError::NotSupported("lambda".to_string()).into();
        assert_eq!(err.to_string(), "Not supported: lambda");
    }

    #[test]
    fn test_error_classes() {
        assert!(ExpressionError::DivisionByZero.is_user_error());
        assert!(ExpressionError::UserFailure("boom".to_string()).is_user_error());
        assert!(!ExpressionError::MissingType {
            expression: "x".to_string()
        }
        .is_user_error());
        assert!(!ExpressionError::NotSupported("x".to_string()).is_user_error());
    }
}
