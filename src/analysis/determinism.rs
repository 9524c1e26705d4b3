//! Determinism of expressions.

use crate::ir::{ExprKind, Expression};

/// An expression is deterministic unless it calls a non-deterministic
/// function somewhere in its tree
pub fn is_deterministic(expression: &Expression) -> bool {
    match expression.kind() {
        ExprKind::FunctionCall(call) if !call.function.is_deterministic() => false,
        _ => expression.children().into_iter().all(is_deterministic),
    }
}
