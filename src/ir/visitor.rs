//! Double-dispatch traversal over expression variants.

use crate::ir::expr::*;

/// Visitor over the closed set of expression variants.
///
/// Every `visit_*` method falls back to [`IrVisitor::visit_expression`], so a
/// visitor only overrides the variants it cares about. [`Expression::accept`]
/// matches exhaustively, which means a new variant cannot be added without
/// giving it a `visit_*` method here.
pub trait IrVisitor {
    type Output;

    /// Fallback for every variant not overridden
    fn visit_expression(&mut self, node: &Expression) -> Self::Output;

    fn visit_constant(&mut self, node: &Expression, _constant: &Constant) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_symbol_reference(
        &mut self,
        node: &Expression,
        _reference: &SymbolReference,
    ) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_arithmetic_binary(
        &mut self,
        node: &Expression,
        _arithmetic: &ArithmeticBinary,
    ) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_arithmetic_negation(
        &mut self,
        node: &Expression,
        _negation: &ArithmeticNegation,
    ) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_comparison(&mut self, node: &Expression, _comparison: &Comparison) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_between(&mut self, node: &Expression, _between: &Between) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_logical(&mut self, node: &Expression, _logical: &Logical) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_not(&mut self, node: &Expression, _not: &Not) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_is_null(&mut self, node: &Expression, _is_null: &IsNull) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_coalesce(&mut self, node: &Expression, _coalesce: &Coalesce) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_null_if(&mut self, node: &Expression, _null_if: &NullIf) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_searched_case(&mut self, node: &Expression, _case: &SearchedCase) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_simple_case(&mut self, node: &Expression, _case: &SimpleCase) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_in_predicate(&mut self, node: &Expression, _in_predicate: &InPredicate) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_cast(&mut self, node: &Expression, _cast: &Cast) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_row(&mut self, node: &Expression, _row: &Row) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_subscript(&mut self, node: &Expression, _subscript: &Subscript) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_function_call(&mut self, node: &Expression, _call: &FunctionCall) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_lambda(&mut self, node: &Expression, _lambda: &Lambda) -> Self::Output {
        self.visit_expression(node)
    }

    fn visit_bind(&mut self, node: &Expression, _bind: &Bind) -> Self::Output {
        self.visit_expression(node)
    }
}

impl Expression {
    /// Dispatch to the visitor method for this node's variant
    pub fn accept<V: IrVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self.kind() {
            ExprKind::Constant(node) => visitor.visit_constant(self, node),
            ExprKind::SymbolReference(node) => visitor.visit_symbol_reference(self, node),
            ExprKind::ArithmeticBinary(node) => visitor.visit_arithmetic_binary(self, node),
            ExprKind::ArithmeticNegation(node) => visitor.visit_arithmetic_negation(self, node),
            ExprKind::Comparison(node) => visitor.visit_comparison(self, node),
            ExprKind::Between(node) => visitor.visit_between(self, node),
            ExprKind::Logical(node) => visitor.visit_logical(self, node),
            ExprKind::Not(node) => visitor.visit_not(self, node),
            ExprKind::IsNull(node) => visitor.visit_is_null(self, node),
            ExprKind::Coalesce(node) => visitor.visit_coalesce(self, node),
            ExprKind::NullIf(node) => visitor.visit_null_if(self, node),
            ExprKind::SearchedCase(node) => visitor.visit_searched_case(self, node),
            ExprKind::SimpleCase(node) => visitor.visit_simple_case(self, node),
            ExprKind::In(node) => visitor.visit_in_predicate(self, node),
            ExprKind::Cast(node) => visitor.visit_cast(self, node),
            ExprKind::Row(node) => visitor.visit_row(self, node),
            ExprKind::Subscript(node) => visitor.visit_subscript(self, node),
            ExprKind::FunctionCall(node) => visitor.visit_function_call(self, node),
            ExprKind::Lambda(node) => visitor.visit_lambda(self, node),
            ExprKind::Bind(node) => visitor.visit_bind(self, node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts comparisons anywhere in a tree
    struct ComparisonCounter {
        count: usize,
    }

    impl IrVisitor for ComparisonCounter {
        type Output = ();

        fn visit_expression(&mut self, node: &Expression) {
            for child in node.children() {
                child.accept(self);
            }
        }

        fn visit_comparison(&mut self, node: &Expression, _comparison: &Comparison) {
            self.count += 1;
            self.visit_expression(node);
        }
    }

    #[test]
    fn test_visitor_dispatch() {
        let expr = Expression::or(vec![
            Expression::equal(Expression::symbol("a"), Expression::bigint(1)),
            Expression::not(Expression::equal(
                Expression::symbol("b"),
                Expression::bigint(2),
            )),
        ]);
        let mut counter = ComparisonCounter { count: 0 };
        expr.accept(&mut counter);
        assert_eq!(counter.count, 2);
    }
}
