//! Static analyses over IR expressions: typing, determinism and nullability.

pub mod determinism;
pub mod nullability;
pub mod type_analyzer;

pub use determinism::is_deterministic;
pub use nullability::may_return_null_on_non_null_input;
pub use type_analyzer::{ExpressionTypes, IrTypeAnalyzer, TypeAnalyzer, TypeProvider};
