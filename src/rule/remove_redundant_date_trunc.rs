//! Removal of `date_trunc('day', ...)` over DATE values.

use crate::error::{ExpressionResult, OptimizerResult};
use crate::function::DATE_TRUNC_FUNCTION;
use crate::interpreter::{Folded, NoOpSymbolResolver};
use crate::ir::{rewrite_with, ExprKind, Expression, ExpressionRewriter};
use crate::rule::{ExpressionRewriteRuleSet, Rule, RuleContext};
use crate::types::DataType;
use crate::value::Value;

/// A DATE has no time of day, so truncating it to the day is a no-op
pub struct RemoveRedundantDateTrunc;

impl RemoveRedundantDateTrunc {
    pub fn rule_set() -> ExpressionRewriteRuleSet {
        ExpressionRewriteRuleSet::new("RemoveRedundantDateTrunc", rewrite)
    }

    pub fn rules() -> Vec<Box<dyn Rule>> {
        Self::rule_set().rules()
    }
}

pub fn rewrite(expression: &Expression, context: &RuleContext) -> OptimizerResult<Expression> {
    if expression.as_symbol().is_some() {
        return Ok(expression.clone());
    }
    Ok(rewrite_with(&mut DateTruncRewriter { context }, expression)?)
}

struct DateTruncRewriter<'a> {
    context: &'a RuleContext,
}

impl ExpressionRewriter for DateTruncRewriter<'_> {
    fn rewrite(&mut self, node: &Expression) -> ExpressionResult<Option<Expression>> {
        let call = match node.kind() {
            ExprKind::FunctionCall(call)
                if call.function.name() == DATE_TRUNC_FUNCTION && call.arguments.len() == 2 =>
            {
                call
            }
            _ => return Ok(None),
        };

        let unit = &call.arguments[0];
        let argument = &call.arguments[1];
        let types = self.context.get_types(node)?;
        if types.get(argument) != Some(&DataType::Date)
            || types.get(unit) != Some(&DataType::Varchar)
            || unit.as_constant().is_none()
        {
            return Ok(None);
        }

        let unit_value = self
            .context
            .interpreter(unit.clone(), types)?
            .optimize(&NoOpSymbolResolver)?;
        match unit_value {
            Folded::Value(Value::Varchar(unit)) if unit.to_lowercase() == "day" => {
                rewrite_with(self, argument).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TypeProvider;
    use crate::function::{BuiltinFunctions, FunctionResolver};
    use crate::rule::Session;
    use std::sync::Arc;

    fn context() -> RuleContext {
        RuleContext::new(
            Session::new("test"),
            TypeProvider::new()
                .with("d", DataType::Date)
                .with("unit", DataType::Varchar),
            Arc::new(BuiltinFunctions::new()),
        )
    }

    fn date_trunc(unit: Expression, argument: Expression) -> Expression {
        let function = BuiltinFunctions::new()
            .resolve_function(DATE_TRUNC_FUNCTION, &[DataType::Varchar, DataType::Date])
            .unwrap();
        Expression::call(function, vec![unit, argument])
    }

    #[test]
    fn test_day_unit_removed() {
        let expression = date_trunc(Expression::varchar("day"), Expression::symbol("d"));
        assert_eq!(rewrite(&expression, &context()).unwrap(), Expression::symbol("d"));

        let upper = date_trunc(Expression::varchar("DAY"), Expression::symbol("d"));
        assert_eq!(rewrite(&upper, &context()).unwrap(), Expression::symbol("d"));
    }

    #[test]
    fn test_nested_calls() {
        let inner = date_trunc(Expression::varchar("day"), Expression::symbol("d"));
        let outer = date_trunc(Expression::varchar("month"), inner);
        let rewritten = rewrite(&outer, &context()).unwrap();
        assert_eq!(
            rewritten,
            date_trunc(Expression::varchar("month"), Expression::symbol("d"))
        );
    }

    #[test]
    fn test_other_units_and_non_literals_kept() {
        let month = date_trunc(Expression::varchar("month"), Expression::symbol("d"));
        assert_eq!(rewrite(&month, &context()).unwrap(), month);

        let symbolic = date_trunc(Expression::symbol("unit"), Expression::symbol("d"));
        assert_eq!(rewrite(&symbolic, &context()).unwrap(), symbolic);
    }
}
