//! Per-construct evaluation rules.

use crate::analysis::{is_deterministic, ExpressionTypes};
use crate::error::{ExpressionError, ExpressionResult};
use crate::function::builtin::check_array_index;
use crate::function::{FunctionResolver, OperatorType, FAIL_FUNCTION};
use crate::interpreter::in_list::InListSet;
use crate::interpreter::lambda::{lambda_function, ShadowedSymbolResolver};
use crate::interpreter::{Folded, SymbolResolver};
use crate::ir::utils::is_dynamic_filter;
use crate::ir::{
    ArithmeticBinary, ArithmeticNegation, Between, Bind, Cast, Coalesce, Comparison,
    ComparisonOperator, Constant, ExprKind, Expression, FunctionCall, InPredicate, IrVisitor,
    IsNull, Lambda, Logical, LogicalOperator, NodeId, Not, NullIf, Row, SearchedCase, SimpleCase,
    Subscript, Symbol, SymbolReference, WhenClause,
};
use crate::types::DataType;
use crate::value::Value;
use log::trace;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub(crate) type InListCache = RefCell<HashMap<NodeId, Option<InListSet>>>;

/// One evaluation pass over a tree, in evaluate or optimize mode
pub(crate) struct Evaluator<'a> {
    pub(crate) functions: &'a Arc<dyn FunctionResolver>,
    pub(crate) types: &'a ExpressionTypes,
    /// `None` disables the hashed IN-list path
    pub(crate) in_list_cache: Option<&'a InListCache>,
    pub(crate) optimize: bool,
    pub(crate) resolver: &'a dyn SymbolResolver,
}

impl Evaluator<'_> {
    /// Process `node`. In optimize mode a user-data error is swallowed and the
    /// node is returned unevaluated, so that the failure happens at runtime
    /// only if the node is still reachable by then.
    pub(crate) fn process_guarded(&mut self, node: &Expression) -> ExpressionResult<Folded> {
        match node.accept(self) {
            Err(error) if self.optimize && error.is_user_error() => {
                trace!("Deferring '{}' raised by {}", error, node);
                Ok(Folded::Residual(node.clone()))
            }
            result => result,
        }
    }

    fn process_optional(&mut self, node: Option<&Expression>) -> ExpressionResult<Folded> {
        match node {
            Some(node) => self.process_guarded(node),
            None => Ok(Folded::null()),
        }
    }

    fn type_of(&self, node: &Expression) -> ExpressionResult<DataType> {
        self.types.type_of(node).cloned()
    }

    /// Re-emit a processed child as an expression, typing folded values with
    /// the type of the `original` node
    fn to_expression(&self, folded: Folded, original: &Expression) -> ExpressionResult<Expression> {
        match folded {
            Folded::Residual(expression) => Ok(expression),
            Folded::Value(value) => Ok(Expression::constant(self.type_of(original)?, value)),
        }
    }

    fn to_expressions(
        &self,
        folded: Vec<Folded>,
        originals: &[Expression],
    ) -> ExpressionResult<Vec<Expression>> {
        folded
            .into_iter()
            .zip(originals.iter())
            .map(|(folded, original)| self.to_expression(folded, original))
            .collect()
    }

    fn invoke_operator(
        &self,
        operator: OperatorType,
        argument_types: &[DataType],
        arguments: &[Value],
    ) -> ExpressionResult<Value> {
        let function = self.functions.resolve_operator(operator, argument_types)?;
        self.functions.invoke(&function, arguments)
    }

    fn is_equal(
        &self,
        left: &Value,
        left_type: &DataType,
        right: &Value,
        right_type: &DataType,
    ) -> ExpressionResult<bool> {
        let result = self.invoke_operator(
            OperatorType::Equal,
            &[left_type.clone(), right_type.clone()],
            &[left.clone(), right.clone()],
        )?;
        Ok(result == Value::Boolean(true))
    }

    fn expect_boolean(&self, value: Value, context: &str) -> ExpressionResult<Option<bool>> {
        match value {
            Value::Null => Ok(None),
            Value::Boolean(b) => Ok(Some(b)),
            other => Err(ExpressionError::type_mismatch(context, "boolean", other)),
        }
    }

    fn compare(
        &mut self,
        operator: ComparisonOperator,
        left: &Expression,
        right: &Expression,
    ) -> ExpressionResult<Folded> {
        match operator {
            ComparisonOperator::IsDistinctFrom => self.process_is_distinct_from(left, right),
            // the resolver only implements =, < and <=; the residual is
            // flipped back so callers never see the rewritten operator
            ComparisonOperator::NotEqual => {
                match self.compare(ComparisonOperator::Equal, left, right)? {
                    Folded::Residual(expression) => Ok(Folded::Residual(flip_comparison(expression))),
                    Folded::Value(value) => match self.expect_boolean(value, "comparison")? {
                        None => Ok(Folded::null()),
                        Some(equal) => Ok(Folded::Value(Value::Boolean(!equal))),
                    },
                }
            }
            // evaluated as `right < left`, so the right operand is processed first
            ComparisonOperator::GreaterThan | ComparisonOperator::GreaterThanOrEqual => {
                match self.compare(operator.flip(), right, left)? {
                    Folded::Residual(expression) => Ok(Folded::Residual(flip_comparison(expression))),
                    value => Ok(value),
                }
            }
            _ => self.process_comparison(operator, left, right),
        }
    }

    fn process_is_distinct_from(
        &mut self,
        left_node: &Expression,
        right_node: &Expression,
    ) -> ExpressionResult<Folded> {
        let left = self.process_guarded(left_node)?;
        let right = self.process_guarded(right_node)?;

        match (left, right) {
            (Folded::Value(Value::Null), Folded::Residual(other))
            | (Folded::Residual(other), Folded::Value(Value::Null)) => Ok(Folded::Residual(
                Expression::not(Expression::is_null(other)),
            )),
            (Folded::Value(left), Folded::Value(right)) => {
                let types = [self.type_of(left_node)?, self.type_of(right_node)?];
                Ok(Folded::Value(self.invoke_operator(
                    OperatorType::IsDistinctFrom,
                    &types,
                    &[left, right],
                )?))
            }
            (left, right) => Ok(Folded::Residual(Expression::comparison(
                ComparisonOperator::IsDistinctFrom,
                self.to_expression(left, left_node)?,
                self.to_expression(right, right_node)?,
            ))),
        }
    }

    fn process_comparison(
        &mut self,
        operator: ComparisonOperator,
        left_node: &Expression,
        right_node: &Expression,
    ) -> ExpressionResult<Folded> {
        let left = self.process_guarded(left_node)?;
        if left.is_null() {
            return Ok(Folded::null());
        }
        let right = self.process_guarded(right_node)?;
        if right.is_null() {
            return Ok(Folded::null());
        }

        match (left, right) {
            (Folded::Value(left), Folded::Value(right)) => {
                let operator_type = operator.operator_type().ok_or_else(|| {
                    ExpressionError::NotSupported(format!("comparison operator {}", operator.as_str()))
                })?;
                let types = [self.type_of(left_node)?, self.type_of(right_node)?];
                Ok(Folded::Value(self.invoke_operator(operator_type, &types, &[left, right])?))
            }
            (left, right) => Ok(Folded::Residual(Expression::comparison(
                operator,
                self.to_expression(left, left_node)?,
                self.to_expression(right, right_node)?,
            ))),
        }
    }

    fn process_coalesce_operands(&mut self, coalesce: &Coalesce) -> ExpressionResult<Vec<Folded>> {
        let mut operands = Vec::new();
        let mut unique = HashSet::new();
        for operand in &coalesce.operands {
            match self.process_guarded(operand)? {
                Folded::Residual(expression) => {
                    if let ExprKind::Coalesce(nested) = expression.kind() {
                        // already processed, so it holds no null literal
                        for nested_operand in &nested.operands {
                            if !is_deterministic(nested_operand) || unique.insert(nested_operand.clone()) {
                                operands.push(Folded::Residual(nested_operand.clone()));
                            }
                            if nested_operand
                                .as_constant()
                                .map_or(false, |c| !c.value.is_null())
                            {
                                return Ok(operands);
                            }
                        }
                    } else if !is_deterministic(&expression) || unique.insert(expression.clone()) {
                        operands.push(Folded::Residual(expression));
                    }
                }
                Folded::Value(Value::Null) => {}
                value => {
                    operands.push(value);
                    return Ok(operands);
                }
            }
        }
        Ok(operands)
    }

    /// Membership through the cached hashed set, or `None` when the list does
    /// not qualify (or caching is off)
    fn lookup_in_list_set(
        &self,
        node: &Expression,
        in_predicate: &InPredicate,
        value_type: &DataType,
        probe: &Value,
    ) -> ExpressionResult<Option<bool>> {
        let cache = match self.in_list_cache {
            Some(cache) => cache,
            None => return Ok(None),
        };

        if !cache.borrow().contains_key(&node.id()) {
            let constants: Option<Vec<Value>> = in_predicate
                .value_list
                .iter()
                .map(|e| {
                    e.as_constant()
                        .filter(|c| !c.value.is_null())
                        .map(|c| c.value.clone())
                })
                .collect();
            let set = match constants {
                Some(values) => {
                    let set = InListSet::build(self.functions.as_ref(), value_type, values)?;
                    trace!("Built IN-list set of {} values for {}", set.len(), node);
                    Some(set)
                }
                None => None,
            };
            cache.borrow_mut().insert(node.id(), set);
        }

        match cache.borrow().get(&node.id()) {
            Some(Some(set)) => Ok(Some(set.contains(self.functions.as_ref(), probe)?)),
            _ => Ok(None),
        }
    }
}

/// Turn a residual comparison produced for a flipped operator back into the
/// operator the caller asked for
fn flip_comparison(expression: Expression) -> Expression {
    match expression.kind() {
        ExprKind::Comparison(comparison) => match comparison.operator {
            ComparisonOperator::Equal => Expression::comparison(
                ComparisonOperator::NotEqual,
                comparison.left.clone(),
                comparison.right.clone(),
            ),
            ComparisonOperator::NotEqual => Expression::comparison(
                ComparisonOperator::Equal,
                comparison.left.clone(),
                comparison.right.clone(),
            ),
            ComparisonOperator::IsDistinctFrom => expression.clone(),
            operator => Expression::comparison(
                operator.flip(),
                comparison.right.clone(),
                comparison.left.clone(),
            ),
        },
        _ => expression,
    }
}

fn has_residual<'f>(values: impl IntoIterator<Item = &'f Folded>) -> bool {
    values.into_iter().any(Folded::is_residual)
}

impl IrVisitor for Evaluator<'_> {
    type Output = ExpressionResult<Folded>;

    fn visit_expression(&mut self, node: &Expression) -> ExpressionResult<Folded> {
        Err(ExpressionError::NotSupported(format!(
            "not yet implemented: {}",
            node
        )))
    }

    fn visit_constant(&mut self, _node: &Expression, constant: &Constant) -> ExpressionResult<Folded> {
        Ok(Folded::Value(constant.value.clone()))
    }

    fn visit_symbol_reference(
        &mut self,
        node: &Expression,
        reference: &SymbolReference,
    ) -> ExpressionResult<Folded> {
        match self.resolver.get(&Symbol::from(reference)) {
            Some(value) => Ok(Folded::Value(value)),
            None => Ok(Folded::Residual(node.clone())),
        }
    }

    fn visit_is_null(&mut self, _node: &Expression, is_null: &IsNull) -> ExpressionResult<Folded> {
        match self.process_guarded(&is_null.value)? {
            Folded::Residual(expression) => Ok(Folded::Residual(Expression::is_null(expression))),
            Folded::Value(value) => Ok(Folded::Value(Value::Boolean(value.is_null()))),
        }
    }

    fn visit_searched_case(
        &mut self,
        node: &Expression,
        case: &SearchedCase,
    ) -> ExpressionResult<Folded> {
        let mut when_clauses = Vec::new();
        let mut new_default = None;

        for clause in &case.when_clauses {
            match self.process_guarded(&clause.operand)? {
                Folded::Residual(operand) => {
                    let result = self.process_guarded(&clause.result)?;
                    when_clauses.push(WhenClause::new(
                        operand,
                        self.to_expression(result, &clause.result)?,
                    ));
                }
                Folded::Value(Value::Boolean(true)) => {
                    // first branch known to match; later branches are unreachable
                    new_default = Some(self.process_guarded(&clause.result)?);
                    break;
                }
                _ => {}
            }
        }

        let default_result = match new_default {
            Some(result) => result,
            None => self.process_optional(case.default_value.as_ref())?,
        };

        if when_clauses.is_empty() {
            return Ok(default_result);
        }

        let default_value = match default_result {
            Folded::Value(Value::Null) => None,
            other => Some(self.to_expression(other, node)?),
        };
        Ok(Folded::Residual(Expression::searched_case(
            when_clauses,
            default_value,
        )))
    }

    fn visit_simple_case(&mut self, node: &Expression, case: &SimpleCase) -> ExpressionResult<Folded> {
        let operand = self.process_guarded(&case.operand)?;
        let operand_type = self.type_of(&case.operand)?;

        if operand.is_null() {
            return self.process_optional(case.default_value.as_ref());
        }

        let mut when_clauses = Vec::new();
        let mut new_default = None;

        for clause in &case.when_clauses {
            let when_operand = self.process_guarded(&clause.operand)?;

            match (&operand, when_operand) {
                (Folded::Value(value), Folded::Value(candidate)) => {
                    if candidate.is_null() {
                        continue;
                    }
                    let candidate_type = self.type_of(&clause.operand)?;
                    if self.is_equal(value, &operand_type, &candidate, &candidate_type)? {
                        new_default = Some(self.process_guarded(&clause.result)?);
                        break;
                    }
                }
                (_, when_operand) => {
                    let result = self.process_guarded(&clause.result)?;
                    when_clauses.push(WhenClause::new(
                        self.to_expression(when_operand, &clause.operand)?,
                        self.to_expression(result, &clause.result)?,
                    ));
                }
            }
        }

        let default_result = match new_default {
            Some(result) => result,
            None => self.process_optional(case.default_value.as_ref())?,
        };

        if when_clauses.is_empty() {
            return Ok(default_result);
        }

        let default_value = match default_result {
            Folded::Value(Value::Null) => None,
            other => Some(self.to_expression(other, node)?),
        };
        Ok(Folded::Residual(Expression::simple_case(
            self.to_expression(operand, &case.operand)?,
            when_clauses,
            default_value,
        )))
    }

    fn visit_coalesce(&mut self, node: &Expression, coalesce: &Coalesce) -> ExpressionResult<Folded> {
        let mut operands = self.process_coalesce_operands(coalesce)?;
        match operands.len() {
            0 => Ok(Folded::null()),
            1 => Ok(operands.remove(0)),
            _ => {
                let expressions = operands
                    .into_iter()
                    .map(|operand| self.to_expression(operand, node))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                Ok(Folded::Residual(Expression::coalesce(expressions)))
            }
        }
    }

    fn visit_in_predicate(
        &mut self,
        node: &Expression,
        in_predicate: &InPredicate,
    ) -> ExpressionResult<Folded> {
        let value = self.process_guarded(&in_predicate.value)?;
        // NULL IN () would be false, but the list is never empty
        if value.is_null() {
            return Ok(Folded::null());
        }

        let value_type = self.type_of(&in_predicate.value)?;
        if let Folded::Value(probe) = &value {
            // equality of composite values may be unknown, which a set cannot express
            if !value_type.is_composite() {
                if let Some(found) = self.lookup_in_list_set(node, in_predicate, &value_type, probe)? {
                    return Ok(Folded::Value(Value::Boolean(found)));
                }
            }
        }

        let mut has_unresolved = value.is_residual();
        let mut has_null = false;
        let mut found = false;
        let mut residual_values = Vec::new();
        let equal = self
            .functions
            .resolve_operator(OperatorType::Equal, &[value_type.clone(), value_type.clone()])?;

        for element in &in_predicate.value_list {
            let probe = match &value {
                Folded::Value(probe) => probe,
                Folded::Residual(_) => {
                    // a literal cannot be simplified further against an unknown probe
                    if element.as_constant().is_some() {
                        residual_values.push(element.clone());
                    } else {
                        // every element must evaluate successfully, so errors
                        // here fail the whole predicate
                        let element_value = element.accept(self)?;
                        residual_values.push(self.to_expression(element_value, element)?);
                    }
                    continue;
                }
            };

            match element.accept(self)? {
                Folded::Residual(expression) => {
                    has_unresolved = true;
                    residual_values.push(expression);
                }
                Folded::Value(Value::Null) => has_null = true,
                Folded::Value(element_value) => {
                    let arguments = [probe.clone(), element_value];
                    match self.functions.invoke(&equal, &arguments)? {
                        Value::Null => has_null = true,
                        // no short-circuit: every element is evaluated
                        Value::Boolean(true) => found = true,
                        _ => {}
                    }
                }
            }
        }

        if found {
            return Ok(Folded::Value(Value::Boolean(true)));
        }

        if has_unresolved {
            if has_null {
                let element_type = self.type_of(&in_predicate.value_list[0])?;
                residual_values.push(Expression::null(element_type));
            }
            let mut seen = HashSet::new();
            let (deterministic, non_deterministic): (Vec<_>, Vec<_>) =
                residual_values.into_iter().partition(is_deterministic);
            let mut simplified: Vec<Expression> = deterministic
                .into_iter()
                .filter(|e| seen.insert(e.clone()))
                .collect();
            simplified.extend(non_deterministic);

            let value_expression = self.to_expression(value, &in_predicate.value)?;
            if simplified.len() == 1 {
                return Ok(Folded::Residual(Expression::equal(
                    value_expression,
                    simplified.remove(0),
                )));
            }
            return Ok(Folded::Residual(Expression::in_list(value_expression, simplified)));
        }

        if has_null {
            return Ok(Folded::null());
        }
        Ok(Folded::Value(Value::Boolean(false)))
    }

    fn visit_arithmetic_negation(
        &mut self,
        _node: &Expression,
        negation: &ArithmeticNegation,
    ) -> ExpressionResult<Folded> {
        match self.process_guarded(&negation.value)? {
            Folded::Value(Value::Null) => Ok(Folded::null()),
            Folded::Residual(expression) => match expression.kind() {
                ExprKind::ArithmeticNegation(inner) => Ok(Folded::Residual(inner.value.clone())),
                _ => Ok(Folded::Residual(Expression::negation(expression))),
            },
            Folded::Value(value) => {
                let value_type = self.type_of(&negation.value)?;
                Ok(Folded::Value(self.invoke_operator(
                    OperatorType::Negation,
                    &[value_type],
                    &[value],
                )?))
            }
        }
    }

    fn visit_arithmetic_binary(
        &mut self,
        _node: &Expression,
        arithmetic: &ArithmeticBinary,
    ) -> ExpressionResult<Folded> {
        let left = self.process_guarded(&arithmetic.left)?;
        if left.is_null() {
            return Ok(Folded::null());
        }
        let right = self.process_guarded(&arithmetic.right)?;
        if right.is_null() {
            return Ok(Folded::null());
        }

        match (left, right) {
            (Folded::Value(left), Folded::Value(right)) => Ok(Folded::Value(
                self.functions.invoke(&arithmetic.function, &[left, right])?,
            )),
            (left, right) => Ok(Folded::Residual(Expression::arithmetic(
                arithmetic.operator,
                arithmetic.function.clone(),
                self.to_expression(left, &arithmetic.left)?,
                self.to_expression(right, &arithmetic.right)?,
            ))),
        }
    }

    fn visit_comparison(
        &mut self,
        _node: &Expression,
        comparison: &Comparison,
    ) -> ExpressionResult<Folded> {
        self.compare(comparison.operator, &comparison.left, &comparison.right)
    }

    fn visit_between(&mut self, _node: &Expression, between: &Between) -> ExpressionResult<Folded> {
        let value = self.process_guarded(&between.value)?;
        if value.is_null() {
            return Ok(Folded::null());
        }
        let min = self.process_guarded(&between.min)?;
        let max = self.process_guarded(&between.max)?;

        let (value, min, max) = match (value, min, max) {
            (Folded::Value(value), Folded::Value(min), Folded::Value(max)) => (value, min, max),
            (value, min, max) => {
                return Ok(Folded::Residual(Expression::between(
                    self.to_expression(value, &between.value)?,
                    self.to_expression(min, &between.min)?,
                    self.to_expression(max, &between.max)?,
                )))
            }
        };

        let value_type = self.type_of(&between.value)?;
        let greater_or_equal_to_min = if min.is_null() {
            None
        } else {
            let types = [self.type_of(&between.min)?, value_type.clone()];
            let result = self.invoke_operator(OperatorType::LessThanOrEqual, &types, &[min, value.clone()])?;
            self.expect_boolean(result, "BETWEEN")?
        };
        let less_or_equal_to_max = if max.is_null() {
            None
        } else {
            let types = [value_type, self.type_of(&between.max)?];
            let result = self.invoke_operator(OperatorType::LessThanOrEqual, &types, &[value, max])?;
            self.expect_boolean(result, "BETWEEN")?
        };

        // one false bound decides, even when the other is unknown
        let result = match (greater_or_equal_to_min, less_or_equal_to_max) {
            (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
            (Some(true), Some(true)) => Value::Boolean(true),
            _ => Value::Null,
        };
        Ok(Folded::Value(result))
    }

    fn visit_null_if(&mut self, _node: &Expression, null_if: &NullIf) -> ExpressionResult<Folded> {
        let first = self.process_guarded(&null_if.first)?;
        if first.is_null() {
            return Ok(Folded::null());
        }
        let second = self.process_guarded(&null_if.second)?;
        if second.is_null() {
            return Ok(first);
        }

        let (first, second) = match (first, second) {
            (Folded::Value(first), Folded::Value(second)) => (first, second),
            (first, second) => {
                return Ok(Folded::Residual(Expression::null_if(
                    self.to_expression(first, &null_if.first)?,
                    self.to_expression(second, &null_if.second)?,
                )))
            }
        };

        let first_type = self.type_of(&null_if.first)?;
        let second_type = self.type_of(&null_if.second)?;
        let common_type = self
            .functions
            .common_super_type(&first_type, &second_type)
            .ok_or_else(|| {
                ExpressionError::type_mismatch("NULLIF", first_type.to_string(), &second_type)
            })?;

        let first_cast = self.functions.get_coercion(&first_type, &common_type)?;
        let second_cast = self.functions.get_coercion(&second_type, &common_type)?;
        let first_common = self.functions.invoke(&first_cast, &[first.clone()])?;
        let second_common = self.functions.invoke(&second_cast, &[second])?;

        if self.is_equal(&first_common, &common_type, &second_common, &common_type)? {
            return Ok(Folded::null());
        }
        Ok(Folded::Value(first))
    }

    fn visit_not(&mut self, _node: &Expression, not: &Not) -> ExpressionResult<Folded> {
        match self.process_guarded(&not.value)? {
            Folded::Residual(expression) => Ok(Folded::Residual(Expression::not(expression))),
            Folded::Value(value) => match self.expect_boolean(value, "NOT")? {
                None => Ok(Folded::null()),
                Some(b) => Ok(Folded::Value(Value::Boolean(!b))),
            },
        }
    }

    fn visit_logical(&mut self, _node: &Expression, logical: &Logical) -> ExpressionResult<Folded> {
        let (absorbing, identity) = match logical.operator {
            LogicalOperator::And => (false, true),
            LogicalOperator::Or => (true, false),
        };

        let mut terms = Vec::new();
        for term in &logical.terms {
            let processed = self.process_guarded(term)?;
            match processed.as_value().and_then(Value::as_bool) {
                Some(b) if b == absorbing => return Ok(Folded::Value(Value::Boolean(absorbing))),
                Some(_) => {}
                None => terms.push((processed, term)),
            }
        }

        match terms.len() {
            0 => return Ok(Folded::Value(Value::Boolean(identity))),
            1 => return Ok(terms.remove(0).0),
            _ => {}
        }

        if terms.iter().all(|(processed, _)| processed.is_null()) {
            return Ok(Folded::null());
        }

        let expressions = terms
            .into_iter()
            .map(|(processed, term)| self.to_expression(processed, term))
            .collect::<ExpressionResult<Vec<_>>>()?;
        Ok(Folded::Residual(Expression::logical(logical.operator, expressions)))
    }

    fn visit_function_call(
        &mut self,
        node: &Expression,
        call: &FunctionCall,
    ) -> ExpressionResult<Folded> {
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.process_guarded(argument)?);
        }

        let function = &call.function;
        let null_into_strict_argument = arguments
            .iter()
            .enumerate()
            .any(|(i, argument)| argument.is_null() && !function.nullability.is_argument_nullable(i));
        if null_into_strict_argument {
            return Ok(Folded::null());
        }

        // calls to fail() and other side-effecting functions are kept until
        // the code that would make them unreachable has been simplified
        let keep_residual = has_residual(&arguments)
            || (self.optimize
                && (!function.is_deterministic()
                    || is_dynamic_filter(node)
                    || function.name() == FAIL_FUNCTION));
        if keep_residual {
            return Ok(Folded::Residual(Expression::call(
                function.clone(),
                self.to_expressions(arguments, &call.arguments)?,
            )));
        }

        let values: Vec<Value> = arguments.into_iter().filter_map(Folded::into_value).collect();
        Ok(Folded::Value(self.functions.invoke(function, &values)?))
    }

    fn visit_lambda(&mut self, node: &Expression, lambda: &Lambda) -> ExpressionResult<Folded> {
        if self.optimize {
            // a callable cannot be turned back into IR, so only the body is optimized
            let resolver = ShadowedSymbolResolver {
                hidden: &lambda.arguments,
                outer: self.resolver,
            };
            let mut body_evaluator = Evaluator {
                functions: self.functions,
                types: self.types,
                in_list_cache: self.in_list_cache,
                optimize: true,
                resolver: &resolver,
            };
            let body = body_evaluator.process_guarded(&lambda.body)?;
            let body = body_evaluator.to_expression(body, &lambda.body)?;
            return Ok(Folded::Residual(Expression::lambda(
                lambda.arguments.clone(),
                body,
            )));
        }

        match self.type_of(node)? {
            DataType::Function(parameters, _) if parameters.len() == lambda.arguments.len() => {}
            other => {
                return Err(ExpressionError::type_mismatch(
                    "lambda",
                    format!("function of {} arguments", lambda.arguments.len()),
                    other,
                ))
            }
        }

        Ok(Folded::Value(Value::Function(lambda_function(
            Arc::clone(self.functions),
            self.types.clone(),
            self.in_list_cache.is_some(),
            lambda.arguments.clone(),
            lambda.body.clone(),
        ))))
    }

    fn visit_bind(&mut self, _node: &Expression, bind: &Bind) -> ExpressionResult<Folded> {
        let mut values = Vec::with_capacity(bind.values.len());
        for value in &bind.values {
            values.push(self.process_guarded(value)?);
        }
        let function = self.process_guarded(&bind.function)?;

        if has_residual(&values) || function.is_residual() {
            return Ok(Folded::Residual(Expression::bind(
                self.to_expressions(values, &bind.values)?,
                self.to_expression(function, &bind.function)?,
            )));
        }

        match function {
            Folded::Value(Value::Function(function)) => {
                let leading = values.into_iter().filter_map(Folded::into_value).collect();
                Ok(Folded::Value(Value::Function(function.bind(leading))))
            }
            other => Err(ExpressionError::type_mismatch(
                "BIND",
                "function",
                format!("{:?}", other),
            )),
        }
    }

    fn visit_cast(&mut self, _node: &Expression, cast: &Cast) -> ExpressionResult<Folded> {
        let value = self.process_guarded(&cast.expression)?;
        let source_type = self.type_of(&cast.expression)?;

        match value {
            Folded::Residual(expression) => {
                if source_type == cast.target_type {
                    return Ok(Folded::Residual(expression));
                }
                Ok(Folded::Residual(Expression::new(ExprKind::Cast(Cast {
                    expression,
                    target_type: cast.target_type.clone(),
                    safe: cast.safe,
                }))))
            }
            Folded::Value(Value::Null) => Ok(Folded::null()),
            Folded::Value(value) => {
                let coercion = self.functions.get_coercion(&source_type, &cast.target_type)?;
                match self.functions.invoke(&coercion, &[value]) {
                    Ok(result) => Ok(Folded::Value(result)),
                    Err(error) if cast.safe && error.is_user_error() => Ok(Folded::null()),
                    Err(error) => Err(error),
                }
            }
        }
    }

    fn visit_row(&mut self, _node: &Expression, row: &Row) -> ExpressionResult<Folded> {
        let mut values = Vec::with_capacity(row.items.len());
        for item in &row.items {
            values.push(self.process_guarded(item)?);
        }

        if has_residual(&values) {
            return Ok(Folded::Residual(Expression::row(
                self.to_expressions(values, &row.items)?,
            )));
        }
        Ok(Folded::Value(Value::Row(
            values.into_iter().filter_map(Folded::into_value).collect(),
        )))
    }

    fn visit_subscript(&mut self, _node: &Expression, subscript: &Subscript) -> ExpressionResult<Folded> {
        let base = self.process_guarded(&subscript.base)?;
        if base.is_null() {
            return Ok(Folded::null());
        }
        let index = self.process_guarded(&subscript.index)?;
        if index.is_null() {
            return Ok(Folded::null());
        }

        let base_type = self.type_of(&subscript.base)?;
        if let (Folded::Value(index), DataType::Array(_)) = (&index, &base_type) {
            if let Some(position) = index.as_i64() {
                check_array_index(position)?;
            }
        }

        let (base, index) = match (base, index) {
            (Folded::Value(base), Folded::Value(index)) => (base, index),
            (base, index) => {
                return Ok(Folded::Residual(Expression::subscript(
                    self.to_expression(base, &subscript.base)?,
                    self.to_expression(index, &subscript.index)?,
                )))
            }
        };

        // rows have no subscript operator; read the field directly
        if let Value::Row(fields) = &base {
            let position = index
                .as_i64()
                .ok_or_else(|| ExpressionError::type_mismatch("row subscript", "integer", &index))?;
            return position
                .checked_sub(1)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| fields.get(i))
                .map(|field| Folded::Value(field.clone()))
                .ok_or_else(|| {
                    ExpressionError::InvalidFunctionArgument(format!(
                        "ROW index out of bounds: {}",
                        position
                    ))
                });
        }

        let types = [base_type, self.type_of(&subscript.index)?];
        Ok(Folded::Value(self.invoke_operator(
            OperatorType::Subscript,
            &types,
            &[base, index],
        )?))
    }
}
