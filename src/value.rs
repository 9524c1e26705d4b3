//! Runtime values produced by the interpreter.

use crate::error::ExpressionResult;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

type Callable = dyn Fn(&[Value]) -> ExpressionResult<Value> + Send + Sync;

/// A callable value produced by evaluating a lambda or a bind expression.
///
/// Two function values are equal only if they are the same instance.
#[derive(Clone)]
pub struct FunctionValue {
    arity: usize,
    callable: Arc<Callable>,
}

impl FunctionValue {
    pub fn new<F>(arity: usize, callable: F) -> Self
    where
        F: Fn(&[Value]) -> ExpressionResult<Value> + Send + Sync + 'static,
    {
        Self {
            arity,
            callable: Arc::new(callable),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn invoke(&self, arguments: &[Value]) -> ExpressionResult<Value> {
        (self.callable)(arguments)
    }

    /// Fix the leading arguments of this function
    pub fn bind(&self, leading: Vec<Value>) -> FunctionValue {
        let inner = self.clone();
        let arity = self.arity.saturating_sub(leading.len());
        FunctionValue::new(arity, move |rest| {
            let mut arguments = leading.clone();
            arguments.extend_from_slice(rest);
            inner.invoke(&arguments)
        })
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionValue(arity={})", self.arity)
    }
}

impl PartialEq for FunctionValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callable, &other.callable)
    }
}

/// Values flowing through expression evaluation
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Double(f64),
    Varchar(String),
    /// Days since 1970-01-01
    Date(i32),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Row(Vec<Value>),
    Function(FunctionValue),
}

impl Value {
    pub fn varchar(value: impl Into<String>) -> Self {
        Value::Varchar(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral value widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) => Some(s),
            _ => None,
        }
    }
}

// Structural equality, used to compare constants inside expression trees.
// SQL equality goes through the EQUAL operator instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Varchar(a), Value::Varchar(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Row(a), Value::Row(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::BigInt(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Varchar(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Array(items) | Value::Row(items) => items.hash(state),
            Value::Map(entries) => entries.hash(state),
            Value::Function(function) => {
                (Arc::as_ptr(&function.callable) as *const () as usize).hash(state)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::Varchar(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Date(days) => write!(f, "DATE {}", days),
            Value::Array(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Row(fields) => {
                write!(f, "(")?;
                write_list(f, fields)?;
                write!(f, ")")
            }
            Value::Function(function) => write!(f, "<function/{}>", function.arity),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structural_equality() {
        assert_eq!(Value::Integer(1), Value::Integer(1));
        assert_ne!(Value::Integer(1), Value::BigInt(1));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_eq!(
            Value::Row(vec![Value::Null, Value::varchar("a")]),
            Value::Row(vec![Value::Null, Value::varchar("a")])
        );
    }

    #[test]
    fn test_hash_consistent_with_eq() {
        let mut set = HashSet::new();
        set.insert(Value::varchar("x"));
        set.insert(Value::varchar("x"));
        set.insert(Value::Array(vec![Value::Integer(1)]));
        set.insert(Value::Array(vec![Value::Integer(1)]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_function_value_bind() {
        let add = FunctionValue::new(2, |args| {
            Ok(Value::BigInt(
                args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0),
            ))
        });
        let add_ten = add.bind(vec![Value::BigInt(10)]);
        assert_eq!(add_ten.arity(), 1);
        assert_eq!(add_ten.invoke(&[Value::BigInt(5)]).unwrap(), Value::BigInt(15));

        assert_eq!(add, add.clone());
        assert_ne!(add, add_ten);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::varchar("it's").to_string(), "'it''s'");
        assert_eq!(
            Value::Array(vec![Value::Integer(1), Value::Null]).to_string(),
            "[1, null]"
        );
        assert_eq!(Value::Double(1.0).to_string(), "1.0");
    }
}
