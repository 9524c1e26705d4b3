//! Top-down tree rewriting.

use crate::error::ExpressionResult;
use crate::ir::expr::Expression;

/// A rewrite applied to every node of a tree, parents first.
///
/// Returning `Some` replaces the node and stops the descent into it; the
/// replacement is responsible for rewriting its own children, typically by
/// calling [`rewrite_with`] on them. Returning `None` rewrites the children
/// and rebuilds the node only if one of them changed.
pub trait ExpressionRewriter {
    fn rewrite(&mut self, node: &Expression) -> ExpressionResult<Option<Expression>>;
}

/// Apply `rewriter` to `expression` and everything below it
pub fn rewrite_with<R: ExpressionRewriter + ?Sized>(
    rewriter: &mut R,
    expression: &Expression,
) -> ExpressionResult<Expression> {
    match rewriter.rewrite(expression)? {
        Some(replacement) => Ok(replacement),
        None => default_rewrite(rewriter, expression),
    }
}

/// Rewrite the children of `expression`, keeping the node itself when no
/// child changed
pub fn default_rewrite<R: ExpressionRewriter + ?Sized>(
    rewriter: &mut R,
    expression: &Expression,
) -> ExpressionResult<Expression> {
    let children = expression.children();
    if children.is_empty() {
        return Ok(expression.clone());
    }

    let mut changed = false;
    let mut rewritten = Vec::with_capacity(children.len());
    for child in children {
        let new_child = rewrite_with(rewriter, child)?;
        changed |= !new_child.same_node(child);
        rewritten.push(new_child);
    }

    if changed {
        expression.replace_children(rewritten)
    } else {
        Ok(expression.clone())
    }
}
