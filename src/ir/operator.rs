//! Operator definitions for IR expressions.

use crate::function::OperatorType;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    IsDistinctFrom,
}

impl ComparisonOperator {
    /// Operator obtained by swapping the operands (`a < b` is `b > a`)
    pub fn flip(&self) -> Self {
        match self {
            ComparisonOperator::LessThan => ComparisonOperator::GreaterThan,
            ComparisonOperator::LessThanOrEqual => ComparisonOperator::GreaterThanOrEqual,
            ComparisonOperator::GreaterThan => ComparisonOperator::LessThan,
            ComparisonOperator::GreaterThanOrEqual => ComparisonOperator::LessThanOrEqual,
            other => *other,
        }
    }

    /// Logical complement of the operator, ignoring nulls.
    ///
    /// `IS DISTINCT FROM` has no complement among these operators.
    pub fn negate(&self) -> Option<Self> {
        match self {
            ComparisonOperator::Equal => Some(ComparisonOperator::NotEqual),
            ComparisonOperator::NotEqual => Some(ComparisonOperator::Equal),
            ComparisonOperator::LessThan => Some(ComparisonOperator::GreaterThanOrEqual),
            ComparisonOperator::LessThanOrEqual => Some(ComparisonOperator::GreaterThan),
            ComparisonOperator::GreaterThan => Some(ComparisonOperator::LessThanOrEqual),
            ComparisonOperator::GreaterThanOrEqual => Some(ComparisonOperator::LessThan),
            ComparisonOperator::IsDistinctFrom => None,
        }
    }

    /// Resolver operator implementing this comparison directly, if any
    pub fn operator_type(&self) -> Option<OperatorType> {
        match self {
            ComparisonOperator::Equal => Some(OperatorType::Equal),
            ComparisonOperator::LessThan => Some(OperatorType::LessThan),
            ComparisonOperator::LessThanOrEqual => Some(OperatorType::LessThanOrEqual),
            ComparisonOperator::IsDistinctFrom => Some(OperatorType::IsDistinctFrom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::IsDistinctFrom => "IS DISTINCT FROM",
        }
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    /// The dual connective (De Morgan)
    pub fn flip(&self) -> Self {
        match self {
            LogicalOperator::And => LogicalOperator::Or,
            LogicalOperator::Or => LogicalOperator::And,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl ArithmeticOperator {
    pub fn operator_type(&self) -> OperatorType {
        match self {
            ArithmeticOperator::Add => OperatorType::Add,
            ArithmeticOperator::Subtract => OperatorType::Subtract,
            ArithmeticOperator::Multiply => OperatorType::Multiply,
            ArithmeticOperator::Divide => OperatorType::Divide,
            ArithmeticOperator::Modulus => OperatorType::Modulus,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
            ArithmeticOperator::Modulus => "%",
        }
    }
}
