//! Value conversions behind the CAST operator.

use crate::error::{ExpressionError, ExpressionResult};
use crate::function::datetime;
use crate::types::DataType;
use crate::value::Value;

/// Whether a cast from `from` to `to` is defined
pub fn can_cast(from: &DataType, to: &DataType) -> bool {
    use DataType::*;
    if from == to {
        return true;
    }
    match (from, to) {
        (Unknown, _) => true,
        (Boolean | Integer | BigInt | Double, Boolean | Integer | BigInt | Double) => true,
        (Boolean | Integer | BigInt | Double | Date, Varchar) => true,
        (Varchar, Boolean | Integer | BigInt | Double | Date) => true,
        (Array(a), Array(b)) => can_cast(a, b),
        (Map(k1, v1), Map(k2, v2)) => can_cast(k1, k2) && can_cast(v1, v2),
        (Row(a), Row(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b.iter())
                    .all(|(x, y)| can_cast(&x.data_type, &y.data_type))
        }
        _ => false,
    }
}

fn invalid(value: &Value, target: &DataType) -> ExpressionError {
    ExpressionError::InvalidCast {
        value: value.to_string(),
        target: target.clone(),
    }
}

fn to_i64(value: &Value, target: &DataType) -> ExpressionResult<i64> {
    match value {
        Value::Boolean(b) => Ok(*b as i64),
        Value::Integer(v) => Ok(*v as i64),
        Value::BigInt(v) => Ok(*v),
        Value::Double(v) => {
            let rounded = v.round();
            if rounded.is_nan() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
                return Err(invalid(value, target));
            }
            Ok(rounded as i64)
        }
        Value::Varchar(s) => s.trim().parse::<i64>().map_err(|_| invalid(value, target)),
        _ => Err(invalid(value, target)),
    }
}

/// Convert a non-null value of type `from` into type `to`
pub fn cast_value(value: &Value, from: &DataType, to: &DataType) -> ExpressionResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if from == to {
        return Ok(value.clone());
    }

    match to {
        DataType::Boolean => match value {
            Value::Varchar(s) => match s.trim().to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(invalid(value, to)),
            },
            Value::Double(v) => Ok(Value::Boolean(*v != 0.0)),
            other => Ok(Value::Boolean(to_i64(other, to)? != 0)),
        },
        DataType::Integer => {
            let v = to_i64(value, to)?;
            i32::try_from(v)
                .map(Value::Integer)
                .map_err(|_| ExpressionError::NumericOverflow(format!("Out of range for integer: {}", v)))
        }
        DataType::BigInt => Ok(Value::BigInt(to_i64(value, to)?)),
        DataType::Double => match value {
            Value::Double(v) => Ok(Value::Double(*v)),
            Value::Varchar(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| invalid(value, to)),
            other => Ok(Value::Double(to_i64(other, to)? as f64)),
        },
        DataType::Varchar => match value {
            Value::Varchar(s) => Ok(Value::Varchar(s.clone())),
            Value::Date(days) => Ok(Value::Varchar(datetime::format_date(*days)?)),
            Value::Double(v) => Ok(Value::Varchar(format!("{:?}", v))),
            Value::Boolean(b) => Ok(Value::Varchar(b.to_string())),
            Value::Integer(v) => Ok(Value::Varchar(v.to_string())),
            Value::BigInt(v) => Ok(Value::Varchar(v.to_string())),
            _ => Err(invalid(value, to)),
        },
        DataType::Date => match value {
            Value::Varchar(s) => datetime::parse_date(s)
                .map(Value::Date)
                .ok_or_else(|| invalid(value, to)),
            _ => Err(invalid(value, to)),
        },
        DataType::Array(target_element) => match (value, from) {
            (Value::Array(items), DataType::Array(source_element)) => items
                .iter()
                .map(|item| cast_value(item, source_element, target_element))
                .collect::<ExpressionResult<Vec<_>>>()
                .map(Value::Array),
            _ => Err(invalid(value, to)),
        },
        DataType::Map(target_key, target_value) => match (value, from) {
            (Value::Map(entries), DataType::Map(source_key, source_value)) => entries
                .iter()
                .map(|(k, v)| {
                    Ok((
                        cast_value(k, source_key, target_key)?,
                        cast_value(v, source_value, target_value)?,
                    ))
                })
                .collect::<ExpressionResult<Vec<_>>>()
                .map(Value::Map),
            _ => Err(invalid(value, to)),
        },
        DataType::Row(target_fields) => match (value, from) {
            (Value::Row(fields), DataType::Row(source_fields))
                if fields.len() == target_fields.len() =>
            {
                fields
                    .iter()
                    .zip(source_fields.iter().zip(target_fields.iter()))
                    .map(|(field, (source, target))| {
                        cast_value(field, &source.data_type, &target.data_type)
                    })
                    .collect::<ExpressionResult<Vec<_>>>()
                    .map(Value::Row)
            }
            _ => Err(invalid(value, to)),
        },
        DataType::Unknown | DataType::Function(_, _) => Err(invalid(value, to)),
    }
}
