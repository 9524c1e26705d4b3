//! Built-in function catalog.
//!
//! A small, self-contained implementation of [`FunctionResolver`] covering
//! the operators the interpreter relies on plus a handful of scalar
//! functions. Embedders with a real catalog supply their own resolver.

use crate::error::{ExpressionError, ExpressionResult};
use crate::function::cast::{can_cast, cast_value};
use crate::function::datetime::truncate_date;
use crate::function::{
    FunctionNullability, FunctionResolver, OperatorType, ResolvedFunction, DATE_TRUNC_FUNCTION,
    DYNAMIC_FILTER_FUNCTION, FAIL_FUNCTION,
};
use crate::types::DataType;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const OPERATOR_PREFIX: &str = "$operator$";

/// Validate a 1-based array index before it reaches the subscript operator
pub fn check_array_index(index: i64) -> ExpressionResult<()> {
    if index == 0 {
        return Err(ExpressionError::InvalidFunctionArgument(
            "SQL array indices start at 1".to_string(),
        ));
    }
    if index < 0 {
        return Err(ExpressionError::InvalidFunctionArgument(format!(
            "Array subscript is negative: {}",
            index
        )));
    }
    Ok(())
}

/// Function catalog backed by native Rust implementations
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinFunctions;

impl BuiltinFunctions {
    pub fn new() -> Self {
        Self
    }
}

fn not_found(name: &str, argument_types: &[DataType]) -> ExpressionError {
    ExpressionError::FunctionNotFound {
        name: name.to_string(),
        arguments: argument_types
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn same_type(argument_types: &[DataType]) -> Option<DataType> {
    match argument_types {
        [DataType::Unknown, other] | [other, DataType::Unknown] => Some(other.clone()),
        [left, right] if left == right => Some(left.clone()),
        _ => None,
    }
}

fn is_orderable(data_type: &DataType) -> bool {
    match data_type {
        DataType::Map(_, _) | DataType::Function(_, _) => false,
        DataType::Array(element) => is_orderable(element),
        DataType::Row(fields) => fields.iter().all(|f| is_orderable(&f.data_type)),
        _ => true,
    }
}

impl FunctionResolver for BuiltinFunctions {
    fn resolve_function(
        &self,
        name: &str,
        argument_types: &[DataType],
    ) -> ExpressionResult<ResolvedFunction> {
        use DataType::*;
        let types = argument_types.to_vec();
        let resolved = match (name, argument_types) {
            (DATE_TRUNC_FUNCTION, [Varchar, Date]) => ResolvedFunction::new(name, types, Date),
            ("concat", args) if args.len() >= 2 && args.iter().all(|t| *t == Varchar) => {
                ResolvedFunction::new(name, types, Varchar)
            }
            ("lower" | "upper", [Varchar]) => ResolvedFunction::new(name, types, Varchar),
            ("length", [Varchar]) => ResolvedFunction::new(name, types, BigInt),
            ("abs", [t]) if t.is_numeric() => {
                let return_type = t.clone();
                ResolvedFunction::new(name, types, return_type)
            }
            ("random", []) => ResolvedFunction::new(name, types, Double).non_deterministic(),
            (FAIL_FUNCTION, [Varchar]) => ResolvedFunction::new(name, types, Unknown),
            ("transform", [Array(element), Function(parameters, output)])
                if parameters.len() == 1 && parameters[0] == **element =>
            {
                let return_type = DataType::array((**output).clone());
                ResolvedFunction::new(name, types, return_type)
            }
            (DYNAMIC_FILTER_FUNCTION, [_, Varchar]) => ResolvedFunction::new(name, types, Boolean)
                .with_nullability(FunctionNullability {
                    return_nullable: false,
                    argument_nullable: vec![true, false],
                }),
            _ => return Err(not_found(name, argument_types)),
        };
        Ok(resolved)
    }

    fn resolve_operator(
        &self,
        operator: OperatorType,
        argument_types: &[DataType],
    ) -> ExpressionResult<ResolvedFunction> {
        let name = operator.mangled_name();
        let types = argument_types.to_vec();
        let resolved = match operator {
            OperatorType::Equal => {
                same_type(argument_types).ok_or_else(|| not_found(&name, argument_types))?;
                ResolvedFunction::new(name, types, DataType::Boolean).with_nullability(
                    FunctionNullability {
                        return_nullable: true,
                        argument_nullable: vec![false, false],
                    },
                )
            }
            OperatorType::LessThan | OperatorType::LessThanOrEqual => {
                match same_type(argument_types) {
                    Some(t) if is_orderable(&t) => {}
                    _ => return Err(not_found(&name, argument_types)),
                }
                ResolvedFunction::new(name, types, DataType::Boolean)
            }
            OperatorType::IsDistinctFrom => {
                same_type(argument_types).ok_or_else(|| not_found(&name, argument_types))?;
                ResolvedFunction::new(name, types, DataType::Boolean).with_nullability(
                    FunctionNullability {
                        return_nullable: false,
                        argument_nullable: vec![true, true],
                    },
                )
            }
            OperatorType::HashCode => match argument_types {
                [_] => ResolvedFunction::new(name, types, DataType::BigInt),
                _ => return Err(not_found(&name, argument_types)),
            },
            OperatorType::Negation => match argument_types {
                [t] if t.is_numeric() => {
                    let return_type = t.clone();
                    ResolvedFunction::new(name, types, return_type)
                }
                _ => return Err(not_found(&name, argument_types)),
            },
            OperatorType::Add
            | OperatorType::Subtract
            | OperatorType::Multiply
            | OperatorType::Divide
            | OperatorType::Modulus => match same_type(argument_types) {
                Some(t) if t.is_numeric() => ResolvedFunction::new(name, types, t),
                _ => return Err(not_found(&name, argument_types)),
            },
            OperatorType::Subscript => {
                let return_type = match argument_types {
                    [DataType::Array(element), DataType::Integer | DataType::BigInt] => {
                        (**element).clone()
                    }
                    [DataType::Map(key, value), index] if **key == *index => (**value).clone(),
                    _ => return Err(not_found(&name, argument_types)),
                };
                ResolvedFunction::new(name, types, return_type).with_nullability(
                    FunctionNullability {
                        return_nullable: true,
                        argument_nullable: vec![false, false],
                    },
                )
            }
            OperatorType::Cast => {
                return Err(ExpressionError::NotSupported(
                    "casts are resolved through get_coercion".to_string(),
                ))
            }
        };
        Ok(resolved)
    }

    fn get_coercion(&self, from: &DataType, to: &DataType) -> ExpressionResult<ResolvedFunction> {
        if !can_cast(from, to) {
            return Err(not_found(&OperatorType::Cast.mangled_name(), &[from.clone()]));
        }
        Ok(ResolvedFunction::new(
            OperatorType::Cast.mangled_name(),
            vec![from.clone()],
            to.clone(),
        ))
    }

    fn common_super_type(&self, left: &DataType, right: &DataType) -> Option<DataType> {
        use DataType::*;
        match (left, right) {
            (l, r) if l == r => Some(l.clone()),
            (Unknown, other) | (other, Unknown) => Some(other.clone()),
            (Integer, BigInt) | (BigInt, Integer) => Some(BigInt),
            (Integer | BigInt, Double) | (Double, Integer | BigInt) => Some(Double),
            (Array(l), Array(r)) => self.common_super_type(l, r).map(DataType::array),
            _ => None,
        }
    }

    fn invoke(&self, function: &ResolvedFunction, arguments: &[Value]) -> ExpressionResult<Value> {
        let expected = function.signature.argument_types.len();
        if arguments.len() != expected {
            return Err(ExpressionError::ArgumentCount {
                function: function.name().to_string(),
                expected,
                actual: arguments.len(),
            });
        }

        if let Some(operator) = function.name().strip_prefix(OPERATOR_PREFIX) {
            return invoke_operator(operator, function, arguments);
        }

        let null_argument = arguments
            .iter()
            .enumerate()
            .any(|(i, v)| v.is_null() && !function.nullability.is_argument_nullable(i));
        if null_argument {
            return Ok(Value::Null);
        }

        match (function.name(), arguments) {
            (DATE_TRUNC_FUNCTION, [Value::Varchar(unit), Value::Date(days)]) => {
                Ok(Value::Date(truncate_date(unit, *days)?))
            }
            ("concat", args) => {
                let mut result = String::new();
                for arg in args {
                    result.push_str(arg.as_str().unwrap_or_default());
                }
                Ok(Value::Varchar(result))
            }
            ("lower", [Value::Varchar(s)]) => Ok(Value::Varchar(s.to_lowercase())),
            ("upper", [Value::Varchar(s)]) => Ok(Value::Varchar(s.to_uppercase())),
            ("length", [Value::Varchar(s)]) => Ok(Value::BigInt(s.chars().count() as i64)),
            ("abs", [Value::Integer(v)]) => v
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| ExpressionError::NumericOverflow(format!("integer abs overflow: {}", v))),
            ("abs", [Value::BigInt(v)]) => v
                .checked_abs()
                .map(Value::BigInt)
                .ok_or_else(|| ExpressionError::NumericOverflow(format!("bigint abs overflow: {}", v))),
            ("abs", [Value::Double(v)]) => Ok(Value::Double(v.abs())),
            ("random", []) => Ok(Value::Double(rand::random::<f64>())),
            (FAIL_FUNCTION, [Value::Varchar(message)]) => {
                Err(ExpressionError::UserFailure(message.clone()))
            }
            ("transform", [Value::Array(items), Value::Function(f)]) => items
                .iter()
                .map(|item| f.invoke(std::slice::from_ref(item)))
                .collect::<ExpressionResult<Vec<_>>>()
                .map(Value::Array),
            (DYNAMIC_FILTER_FUNCTION, _) => Ok(Value::Boolean(true)),
            (name, args) => Err(ExpressionError::type_mismatch(
                name,
                function
                    .signature
                    .argument_types
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", "),
            )),
        }
    }
}

fn invoke_operator(
    operator: &str,
    function: &ResolvedFunction,
    arguments: &[Value],
) -> ExpressionResult<Value> {
    match (operator, arguments) {
        ("IS_DISTINCT_FROM", [left, right]) => Ok(Value::Boolean(is_distinct(left, right)?)),
        (_, args) if args.iter().any(Value::is_null) => Ok(Value::Null),
        ("EQUAL", [left, right]) => Ok(equal(left, right)?.map_or(Value::Null, Value::Boolean)),
        ("LESS_THAN", [left, right]) => Ok(Value::Boolean(
            compare(left, right)? == Some(Ordering::Less),
        )),
        ("LESS_THAN_OR_EQUAL", [left, right]) => Ok(Value::Boolean(matches!(
            compare(left, right)?,
            Some(Ordering::Less | Ordering::Equal)
        ))),
        ("HASH_CODE", [value]) => Ok(Value::BigInt(hash_code(value))),
        ("NEGATION", [value]) => negate(value),
        ("ADD" | "SUBTRACT" | "MULTIPLY" | "DIVIDE" | "MODULUS", [left, right]) => {
            arithmetic(operator, left, right)
        }
        ("SUBSCRIPT", [base, index]) => subscript(base, index),
        ("CAST", [value]) => cast_value(
            value,
            &function.signature.argument_types[0],
            &function.signature.return_type,
        ),
        _ => Err(not_found(function.name(), &function.signature.argument_types)),
    }
}

/// SQL equality. `None` means unknown, which happens when composite values
/// contain nulls in positions that decide the outcome.
pub fn equal(left: &Value, right: &Value) -> ExpressionResult<Option<bool>> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::Array(l), Value::Array(r)) | (Value::Row(l), Value::Row(r)) => {
            if l.len() != r.len() {
                return Ok(Some(false));
            }
            let mut unknown = false;
            for (a, b) in l.iter().zip(r.iter()) {
                match equal(a, b)? {
                    Some(false) => return Ok(Some(false)),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            Ok(if unknown { None } else { Some(true) })
        }
        (Value::Map(l), Value::Map(r)) => {
            if l.len() != r.len() {
                return Ok(Some(false));
            }
            let mut unknown = false;
            for (key, value) in l {
                let mut matched = None;
                for (other_key, other_value) in r {
                    if equal(key, other_key)? == Some(true) {
                        matched = Some(other_value);
                        break;
                    }
                }
                match matched {
                    None => return Ok(Some(false)),
                    Some(other_value) => match equal(value, other_value)? {
                        Some(false) => return Ok(Some(false)),
                        None => unknown = true,
                        Some(true) => {}
                    },
                }
            }
            Ok(if unknown { None } else { Some(true) })
        }
        (Value::Function(_), _) | (_, Value::Function(_)) => Err(ExpressionError::NotSupported(
            "equality of function values".to_string(),
        )),
        (Value::Double(a), Value::Double(b)) => Ok(Some(a == b)),
        _ => Ok(compare(left, right)?.map(|ordering| ordering == Ordering::Equal)),
    }
}

fn is_distinct(left: &Value, right: &Value) -> ExpressionResult<bool> {
    match (left, right) {
        (Value::Null, Value::Null) => Ok(false),
        (Value::Null, _) | (_, Value::Null) => Ok(true),
        (Value::Array(l), Value::Array(r)) | (Value::Row(l), Value::Row(r)) => {
            if l.len() != r.len() {
                return Ok(true);
            }
            for (a, b) in l.iter().zip(r.iter()) {
                if is_distinct(a, b)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Value::Double(a), Value::Double(b)) if a.is_nan() && b.is_nan() => Ok(false),
        _ => Ok(equal(left, right)? != Some(true)),
    }
}

/// Total order over non-null values of the same type. `None` when the values
/// are unordered (NaN).
pub fn compare(left: &Value, right: &Value) -> ExpressionResult<Option<Ordering>> {
    let ordering = match (left, right) {
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Varchar(a), Value::Varchar(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Double(a), other) => other.as_i64().and_then(|b| a.partial_cmp(&(b as f64))),
        (other, Value::Double(b)) => other.as_i64().and_then(|a| (a as f64).partial_cmp(b)),
        (Value::Array(l), Value::Array(r)) | (Value::Row(l), Value::Row(r)) => {
            for (a, b) in l.iter().zip(r.iter()) {
                if a.is_null() || b.is_null() {
                    return Err(ExpressionError::InvalidFunctionArgument(
                        "comparison not supported for values with null elements".to_string(),
                    ));
                }
                match compare(a, b)? {
                    Some(Ordering::Equal) => {}
                    other => return Ok(other),
                }
            }
            Some(l.len().cmp(&r.len()))
        }
        (a, b) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => {
                return Err(ExpressionError::type_mismatch(
                    "comparison",
                    a.to_string(),
                    b.to_string(),
                ))
            }
        },
    };
    Ok(ordering)
}

fn hash_code(value: &Value) -> i64 {
    let mut hasher = DefaultHasher::new();
    match value {
        // 0.0 = -0.0 under SQL equality, so they must hash alike
        Value::Double(v) if *v == 0.0 => Value::Double(0.0).hash(&mut hasher),
        Value::Integer(v) => Value::BigInt(*v as i64).hash(&mut hasher),
        other => other.hash(&mut hasher),
    }
    hasher.finish() as i64
}

fn negate(value: &Value) -> ExpressionResult<Value> {
    match value {
        Value::Integer(v) => v
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| ExpressionError::NumericOverflow(format!("integer negation overflow: {}", v))),
        Value::BigInt(v) => v
            .checked_neg()
            .map(Value::BigInt)
            .ok_or_else(|| ExpressionError::NumericOverflow(format!("bigint negation overflow: {}", v))),
        Value::Double(v) => Ok(Value::Double(-v)),
        other => Err(ExpressionError::type_mismatch("negation", "numeric", other)),
    }
}

fn arithmetic(operator: &str, left: &Value, right: &Value) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(match operator {
            "ADD" => a + b,
            "SUBTRACT" => a - b,
            "MULTIPLY" => a * b,
            "DIVIDE" => a / b,
            _ => a % b,
        })),
        (Value::Integer(a), Value::Integer(b)) => {
            integer_arithmetic(operator, *a as i64, *b as i64, "integer").and_then(|v| {
                i32::try_from(v).map(Value::Integer).map_err(|_| {
                    ExpressionError::NumericOverflow(format!(
                        "integer {} overflow: {} {} {}",
                        operator.to_lowercase(),
                        a,
                        symbol(operator),
                        b
                    ))
                })
            })
        }
        (a, b) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => integer_arithmetic(operator, a, b, "bigint").map(Value::BigInt),
            _ => Err(ExpressionError::type_mismatch(
                "arithmetic",
                "numeric operands",
                format!("{} {} {}", left, symbol(operator), right),
            )),
        },
    }
}

fn symbol(operator: &str) -> &'static str {
    match operator {
        "ADD" => "+",
        "SUBTRACT" => "-",
        "MULTIPLY" => "*",
        "DIVIDE" => "/",
        _ => "%",
    }
}

fn integer_arithmetic(operator: &str, a: i64, b: i64, type_name: &str) -> ExpressionResult<i64> {
    if matches!(operator, "DIVIDE" | "MODULUS") && b == 0 {
        return Err(ExpressionError::DivisionByZero);
    }
    let result = match operator {
        "ADD" => a.checked_add(b),
        "SUBTRACT" => a.checked_sub(b),
        "MULTIPLY" => a.checked_mul(b),
        "DIVIDE" => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result.ok_or_else(|| {
        ExpressionError::NumericOverflow(format!(
            "{} {} overflow: {} {} {}",
            type_name,
            operator.to_lowercase(),
            a,
            symbol(operator),
            b
        ))
    })
}

fn subscript(base: &Value, index: &Value) -> ExpressionResult<Value> {
    match base {
        Value::Array(items) => {
            let position = index
                .as_i64()
                .ok_or_else(|| ExpressionError::type_mismatch("subscript", "integer index", index))?;
            check_array_index(position)?;
            if position as usize > items.len() {
                return Err(ExpressionError::IndexOutOfBounds(format!(
                    "Array subscript must be less than or equal to array length: {} > {}",
                    position,
                    items.len()
                )));
            }
            Ok(items[position as usize - 1].clone())
        }
        Value::Map(entries) => {
            for (key, value) in entries {
                if equal(key, index)? == Some(true) {
                    return Ok(value.clone());
                }
            }
            Err(ExpressionError::InvalidFunctionArgument(format!(
                "Key not present in map: {}",
                index
            )))
        }
        other => Err(ExpressionError::type_mismatch("subscript", "array or map", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke_operator_on(operator: OperatorType, types: &[DataType], args: &[Value]) -> ExpressionResult<Value> {
        let functions = BuiltinFunctions::new();
        let resolved = functions.resolve_operator(operator, types)?;
        functions.invoke(&resolved, args)
    }

    #[test]
    fn test_comparison_operators() {
        let ints = [DataType::BigInt, DataType::BigInt];
        assert_eq!(
            invoke_operator_on(OperatorType::Equal, &ints, &[Value::BigInt(3), Value::BigInt(3)])
                .unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            invoke_operator_on(OperatorType::LessThan, &ints, &[Value::BigInt(3), Value::BigInt(4)])
                .unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            invoke_operator_on(
                OperatorType::LessThanOrEqual,
                &ints,
                &[Value::BigInt(5), Value::BigInt(4)]
            )
            .unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            invoke_operator_on(OperatorType::Equal, &ints, &[Value::Null, Value::BigInt(4)]).unwrap(),
            Value::Null
        );
        assert!(BuiltinFunctions::new()
            .resolve_operator(OperatorType::LessThan, &[DataType::BigInt, DataType::Varchar])
            .is_err());
    }

    #[test]
    fn test_is_distinct_from() {
        let types = [DataType::Integer, DataType::Integer];
        let distinct = |l: Value, r: Value| {
            invoke_operator_on(OperatorType::IsDistinctFrom, &types, &[l, r]).unwrap()
        };
        assert_eq!(distinct(Value::Null, Value::Null), Value::Boolean(false));
        assert_eq!(distinct(Value::Null, Value::Integer(1)), Value::Boolean(true));
        assert_eq!(distinct(Value::Integer(1), Value::Integer(1)), Value::Boolean(false));
        assert_eq!(distinct(Value::Integer(1), Value::Integer(2)), Value::Boolean(true));
    }

    #[test]
    fn test_composite_equality_with_nulls() {
        let left = Value::Array(vec![Value::Integer(1), Value::Null]);
        let right = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(equal(&left, &right).unwrap(), None);

        let right = Value::Array(vec![Value::Integer(2), Value::Null]);
        assert_eq!(equal(&left, &right).unwrap(), Some(false));
    }

    #[test]
    fn test_arithmetic() {
        let ints = [DataType::Integer, DataType::Integer];
        assert_eq!(
            invoke_operator_on(OperatorType::Add, &ints, &[Value::Integer(2), Value::Integer(3)])
                .unwrap(),
            Value::Integer(5)
        );
        assert!(matches!(
            invoke_operator_on(
                OperatorType::Add,
                &ints,
                &[Value::Integer(i32::MAX), Value::Integer(1)]
            ),
            Err(ExpressionError::NumericOverflow(_))
        ));
        assert_eq!(
            invoke_operator_on(OperatorType::Divide, &ints, &[Value::Integer(1), Value::Integer(0)]),
            Err(ExpressionError::DivisionByZero)
        );
        assert_eq!(
            invoke_operator_on(
                OperatorType::Negation,
                &[DataType::Double],
                &[Value::Double(1.5)]
            )
            .unwrap(),
            Value::Double(-1.5)
        );
    }

    #[test]
    fn test_subscript() {
        let types = [DataType::array(DataType::Varchar), DataType::BigInt];
        let array = Value::Array(vec![Value::varchar("a"), Value::varchar("b")]);
        assert_eq!(
            invoke_operator_on(OperatorType::Subscript, &types, &[array.clone(), Value::BigInt(2)])
                .unwrap(),
            Value::varchar("b")
        );
        assert!(matches!(
            invoke_operator_on(OperatorType::Subscript, &types, &[array.clone(), Value::BigInt(3)]),
            Err(ExpressionError::IndexOutOfBounds(_))
        ));
        assert!(matches!(
            invoke_operator_on(OperatorType::Subscript, &types, &[array, Value::BigInt(0)]),
            Err(ExpressionError::InvalidFunctionArgument(_))
        ));

        let map_types = [DataType::map(DataType::Varchar, DataType::BigInt), DataType::Varchar];
        let map = Value::Map(vec![(Value::varchar("k"), Value::BigInt(9))]);
        assert_eq!(
            invoke_operator_on(OperatorType::Subscript, &map_types, &[map.clone(), Value::varchar("k")])
                .unwrap(),
            Value::BigInt(9)
        );
        assert!(invoke_operator_on(OperatorType::Subscript, &map_types, &[map, Value::varchar("x")])
            .is_err());
    }

    #[test]
    fn test_hash_code_consistent_with_equal() {
        assert_eq!(hash_code(&Value::Double(0.0)), hash_code(&Value::Double(-0.0)));
        assert_eq!(hash_code(&Value::varchar("a")), hash_code(&Value::varchar("a")));
        assert_ne!(hash_code(&Value::varchar("a")), hash_code(&Value::varchar("b")));
    }

    #[test]
    fn test_scalar_functions() {
        let functions = BuiltinFunctions::new();

        let date_trunc = functions
            .resolve_function("date_trunc", &[DataType::Varchar, DataType::Date])
            .unwrap();
        assert_eq!(
            functions
                .invoke(&date_trunc, &[Value::varchar("day"), Value::Date(100)])
                .unwrap(),
            Value::Date(100)
        );

        let fail = functions.resolve_function("fail", &[DataType::Varchar]).unwrap();
        assert_eq!(
            functions.invoke(&fail, &[Value::varchar("boom")]),
            Err(ExpressionError::UserFailure("boom".to_string()))
        );
        assert_eq!(functions.invoke(&fail, &[Value::Null]).unwrap(), Value::Null);

        let random = functions.resolve_function("random", &[]).unwrap();
        assert!(!random.is_deterministic());

        let concat = functions
            .resolve_function("concat", &[DataType::Varchar, DataType::Varchar])
            .unwrap();
        assert_eq!(
            functions
                .invoke(&concat, &[Value::varchar("ab"), Value::varchar("cd")])
                .unwrap(),
            Value::varchar("abcd")
        );

        assert!(matches!(
            functions.resolve_function("nope", &[]),
            Err(ExpressionError::FunctionNotFound { .. })
        ));
    }

    #[test]
    fn test_common_super_type() {
        let functions = BuiltinFunctions::new();
        assert_eq!(
            functions.common_super_type(&DataType::Integer, &DataType::BigInt),
            Some(DataType::BigInt)
        );
        assert_eq!(
            functions.common_super_type(&DataType::Unknown, &DataType::Varchar),
            Some(DataType::Varchar)
        );
        assert_eq!(
            functions.common_super_type(&DataType::Varchar, &DataType::Date),
            None
        );
    }
}
