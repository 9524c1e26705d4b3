//! Scalar expression IR.

pub mod expr;
pub mod operator;
pub mod rewriter;
pub mod utils;
pub mod visitor;

pub use expr::{
    ArithmeticBinary, ArithmeticNegation, Between, Bind, Cast, Coalesce, Comparison, Constant,
    ExprKind, Expression, FunctionCall, InPredicate, IsNull, Lambda, Logical, Not, NodeId, NullIf,
    Row, SearchedCase, SimpleCase, Subscript, Symbol, SymbolReference, WhenClause,
};
pub use operator::{ArithmeticOperator, ComparisonOperator, LogicalOperator};
pub use rewriter::{default_rewrite, rewrite_with, ExpressionRewriter};
pub use visitor::IrVisitor;
