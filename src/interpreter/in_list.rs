//! Hashed lookup set for constant IN lists.

use crate::error::{ExpressionError, ExpressionResult};
use crate::function::{FunctionResolver, OperatorType, ResolvedFunction};
use crate::types::DataType;
use crate::value::Value;
use std::collections::HashMap;

/// Set of non-null values hashed and compared with the resolver's own
/// `HASH_CODE` and `EQUAL` operators for the element type, so membership
/// agrees with SQL equality rather than with structural equality of [`Value`].
#[derive(Debug)]
pub struct InListSet {
    hash_code: ResolvedFunction,
    equal: ResolvedFunction,
    buckets: HashMap<i64, Vec<Value>>,
    len: usize,
}

impl InListSet {
    /// Build a set over `values`, all of which must be non-null
    pub fn build(
        functions: &dyn FunctionResolver,
        element_type: &DataType,
        values: impl IntoIterator<Item = Value>,
    ) -> ExpressionResult<Self> {
        let hash_code = functions.resolve_operator(OperatorType::HashCode, &[element_type.clone()])?;
        let equal = functions.resolve_operator(
            OperatorType::Equal,
            &[element_type.clone(), element_type.clone()],
        )?;
        let mut set = Self {
            hash_code,
            equal,
            buckets: HashMap::new(),
            len: 0,
        };
        for value in values {
            set.insert(functions, value)?;
        }
        Ok(set)
    }

    fn hash(&self, functions: &dyn FunctionResolver, value: &Value) -> ExpressionResult<i64> {
        match functions.invoke(&self.hash_code, std::slice::from_ref(value))? {
            Value::BigInt(hash) => Ok(hash),
            other => Err(ExpressionError::type_mismatch("hash code", "bigint", other)),
        }
    }

    fn insert(&mut self, functions: &dyn FunctionResolver, value: Value) -> ExpressionResult<()> {
        if self.contains(functions, &value)? {
            return Ok(());
        }
        let hash = self.hash(functions, &value)?;
        self.buckets.entry(hash).or_default().push(value);
        self.len += 1;
        Ok(())
    }

    /// Whether an element is equal to `value`. A null equality result counts
    /// as no match.
    pub fn contains(&self, functions: &dyn FunctionResolver, value: &Value) -> ExpressionResult<bool> {
        let hash = self.hash(functions, value)?;
        if let Some(bucket) = self.buckets.get(&hash) {
            for candidate in bucket {
                let arguments = [value.clone(), candidate.clone()];
                if functions.invoke(&self.equal, &arguments)? == Value::Boolean(true) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
