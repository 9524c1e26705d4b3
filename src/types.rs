//! SQL data types understood by the expression core.

use std::fmt;

/// A named (or anonymous) field of a ROW type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowField {
    pub name: Option<String>,
    pub data_type: DataType,
}

impl RowField {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: Some(name.into()),
            data_type,
        }
    }

    pub fn anonymous(data_type: DataType) -> Self {
        Self {
            name: None,
            data_type,
        }
    }
}

/// Resolved data type of an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Integer,
    BigInt,
    Double,
    Varchar,
    Date,
    /// Type of an untyped NULL literal
    Unknown,
    Array(Box<DataType>),
    Map(Box<DataType>, Box<DataType>),
    Row(Vec<RowField>),
    /// Type of a lambda: argument types and return type
    Function(Vec<DataType>, Box<DataType>),
}

impl DataType {
    pub fn array(element: DataType) -> Self {
        DataType::Array(Box::new(element))
    }

    pub fn map(key: DataType, value: DataType) -> Self {
        DataType::Map(Box::new(key), Box::new(value))
    }

    pub fn row(fields: impl IntoIterator<Item = DataType>) -> Self {
        DataType::Row(fields.into_iter().map(RowField::anonymous).collect())
    }

    pub fn function(arguments: Vec<DataType>, return_type: DataType) -> Self {
        DataType::Function(arguments, Box::new(return_type))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::BigInt | DataType::Double)
    }

    /// Floating point types, where NOT (a < b) is not the same as a >= b because of NaN
    pub fn is_floating_point(&self) -> bool {
        matches!(self, DataType::Double)
    }

    /// Composite types whose equality and hashing cannot be used for set lookups,
    /// because they may contain nulls
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            DataType::Array(_) | DataType::Map(_, _) | DataType::Row(_)
        )
    }

    /// Types of the parameters of a ROW, ARRAY, MAP or function type
    pub fn type_parameters(&self) -> Vec<DataType> {
        match self {
            DataType::Array(element) => vec![(**element).clone()],
            DataType::Map(key, value) => vec![(**key).clone(), (**value).clone()],
            DataType::Row(fields) => fields.iter().map(|f| f.data_type.clone()).collect(),
            DataType::Function(arguments, return_type) => {
                let mut parameters = arguments.clone();
                parameters.push((**return_type).clone());
                parameters
            }
            _ => vec![],
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "boolean"),
            DataType::Integer => write!(f, "integer"),
            DataType::BigInt => write!(f, "bigint"),
            DataType::Double => write!(f, "double"),
            DataType::Varchar => write!(f, "varchar"),
            DataType::Date => write!(f, "date"),
            DataType::Unknown => write!(f, "unknown"),
            DataType::Array(element) => write!(f, "array({})", element),
            DataType::Map(key, value) => write!(f, "map({}, {})", key, value),
            DataType::Row(fields) => {
                write!(f, "row(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &field.name {
                        Some(name) => write!(f, "{} {}", name, field.data_type)?,
                        None => write!(f, "{}", field.data_type)?,
                    }
                }
                write!(f, ")")
            }
            DataType::Function(arguments, return_type) => {
                write!(f, "function(")?;
                for argument in arguments {
                    write!(f, "{}, ", argument)?;
                }
                write!(f, "{})", return_type)
            }
        }
    }
}
