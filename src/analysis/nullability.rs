//! Static "may return null" analysis.

use crate::ir::{
    Cast, Constant, Expression, FunctionCall, InPredicate, IrVisitor, NullIf, SearchedCase,
    SimpleCase, Subscript,
};

/// Whether `expression` may produce NULL even when every symbol it reads is
/// bound to a non-null value.
///
/// The answer over-approximates: CASE, NULLIF, IN, subscripts and function
/// calls are always assumed nullable, whatever their operands.
pub fn may_return_null_on_non_null_input(expression: &Expression) -> bool {
    let mut visitor = NullabilityVisitor { nullable: false };
    expression.accept(&mut visitor);
    visitor.nullable
}

struct NullabilityVisitor {
    nullable: bool,
}

impl IrVisitor for NullabilityVisitor {
    type Output = ();

    fn visit_expression(&mut self, node: &Expression) {
        for child in node.children() {
            child.accept(self);
        }
    }

    fn visit_constant(&mut self, _node: &Expression, constant: &Constant) {
        if constant.value.is_null() {
            self.nullable = true;
        }
    }

    fn visit_cast(&mut self, _node: &Expression, cast: &Cast) {
        // a type-only coercion never turns a value into null; TRY_CAST can
        cast.expression.accept(self);
        if cast.safe {
            self.nullable = true;
        }
    }

    fn visit_null_if(&mut self, _node: &Expression, _null_if: &NullIf) {
        self.nullable = true;
    }

    fn visit_in_predicate(&mut self, _node: &Expression, _in_predicate: &InPredicate) {
        self.nullable = true;
    }

    fn visit_searched_case(&mut self, _node: &Expression, _case: &SearchedCase) {
        self.nullable = true;
    }

    fn visit_simple_case(&mut self, _node: &Expression, _case: &SimpleCase) {
        self.nullable = true;
    }

    fn visit_subscript(&mut self, _node: &Expression, _subscript: &Subscript) {
        self.nullable = true;
    }

    fn visit_function_call(&mut self, _node: &Expression, _call: &FunctionCall) {
        self.nullable = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ResolvedFunction;
    use crate::ir::WhenClause;
    use crate::types::DataType;

    #[test]
    fn test_leaves() {
        assert!(!may_return_null_on_non_null_input(&Expression::symbol("a")));
        assert!(!may_return_null_on_non_null_input(&Expression::bigint(1)));
        assert!(may_return_null_on_non_null_input(&Expression::null(DataType::BigInt)));
    }

    #[test]
    fn test_children_propagate() {
        let expr = Expression::and(vec![
            Expression::equal(Expression::symbol("a"), Expression::bigint(1)),
            Expression::is_null(Expression::null(DataType::BigInt)),
        ]);
        assert!(may_return_null_on_non_null_input(&expr));

        let expr = Expression::equal(Expression::symbol("a"), Expression::symbol("b"));
        assert!(!may_return_null_on_non_null_input(&expr));
    }

    #[test]
    fn test_conservative_constructs() {
        let case = Expression::searched_case(
            vec![WhenClause::new(Expression::symbol("c"), Expression::bigint(1))],
            Some(Expression::bigint(2)),
        );
        assert!(may_return_null_on_non_null_input(&case));

        let call = Expression::call(
            ResolvedFunction::new("lower", vec![DataType::Varchar], DataType::Varchar),
            vec![Expression::symbol("s")],
        );
        assert!(may_return_null_on_non_null_input(&call));

        let in_list = Expression::in_list(Expression::symbol("a"), vec![Expression::bigint(1)]);
        assert!(may_return_null_on_non_null_input(&in_list));
    }

    #[test]
    fn test_cast() {
        let cast = Expression::cast(Expression::symbol("a"), DataType::Varchar);
        assert!(!may_return_null_on_non_null_input(&cast));

        let try_cast = Expression::try_cast(Expression::symbol("a"), DataType::BigInt);
        assert!(may_return_null_on_non_null_input(&try_cast));
    }
}
