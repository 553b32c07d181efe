//! Column implementation for storing typed vectors of data

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{ColumnKind, DataType, Field};

/// Typed storage behind a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// 64-bit signed integers
    Int64(Vec<i64>),

    /// 64-bit floats
    Float64(Vec<f64>),

    /// UTF-8 strings
    Utf8(Vec<String>),
}

impl ColumnData {
    /// Physical type of the stored values
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Utf8(_) => DataType::Utf8,
        }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
        }
    }

    /// Whether there are no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather values at the given row positions
    pub fn take(&self, indices: &[usize]) -> Self {
        match self {
            ColumnData::Int64(v) => ColumnData::Int64(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Float64(v) => ColumnData::Float64(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Utf8(v) => {
                ColumnData::Utf8(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A single hashable cell value, used for join keys and category labels
#[derive(Debug, Clone)]
pub enum Value {
    /// Integer value
    Int(i64),

    /// Float value, compared by bit pattern
    Float(f64),

    /// String value
    Str(String),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
        }
    }
}

/// A named column of data with a logical kind
///
/// The value storage is shared, so cloning a column or renaming it does not
/// copy the data.
#[derive(Debug, Clone)]
pub struct Column {
    /// Declaration of the column
    field: Field,

    /// The actual data values
    data: Arc<ColumnData>,
}

impl Column {
    /// Create a new column; the field's data type must match the storage
    pub fn new(field: Field, data: ColumnData) -> Result<Self> {
        if field.data_type() != data.data_type() {
            return Err(Error::Schema(format!(
                "column '{}' declared as {} but holds {} values",
                field.name(),
                field.data_type(),
                data.data_type()
            )));
        }

        Ok(Self {
            field,
            data: Arc::new(data),
        })
    }

    /// Integer column
    pub fn from_i64(name: &str, kind: ColumnKind, values: Vec<i64>) -> Self {
        Self {
            field: Field::new(name, DataType::Int64, kind),
            data: Arc::new(ColumnData::Int64(values)),
        }
    }

    /// Float column
    pub fn from_f64(name: &str, kind: ColumnKind, values: Vec<f64>) -> Self {
        Self {
            field: Field::new(name, DataType::Float64, kind),
            data: Arc::new(ColumnData::Float64(values)),
        }
    }

    /// String column
    pub fn from_strings<S: Into<String>>(name: &str, kind: ColumnKind, values: Vec<S>) -> Self {
        Self {
            field: Field::new(name, DataType::Utf8, kind),
            data: Arc::new(ColumnData::Utf8(
                values.into_iter().map(Into::into).collect(),
            )),
        }
    }

    /// Get the name of this column
    pub fn name(&self) -> &str {
        self.field.name()
    }

    /// Get the field of this column
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Get the data type of this column
    pub fn data_type(&self) -> DataType {
        self.field.data_type()
    }

    /// Get the logical kind of this column
    pub fn kind(&self) -> ColumnKind {
        self.field.kind()
    }

    /// Get the length of this column (number of values)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if this column is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get access to the value storage
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// The same data under a new name
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            field: self.field.renamed(name),
            data: Arc::clone(&self.data),
        }
    }

    /// The same data with a different logical kind
    pub fn with_kind(&self, kind: ColumnKind) -> Self {
        Self {
            field: Field::new(self.name(), self.data_type(), kind),
            data: Arc::clone(&self.data),
        }
    }

    /// Gather rows at the given positions into a new column
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            field: self.field.clone(),
            data: Arc::new(self.data.take(indices)),
        }
    }

    /// Hashable value at `row`
    pub fn value(&self, row: usize) -> Option<Value> {
        match self.data.as_ref() {
            ColumnData::Int64(v) => v.get(row).map(|&x| Value::Int(x)),
            ColumnData::Float64(v) => v.get(row).map(|&x| Value::Float(x)),
            ColumnData::Utf8(v) => v.get(row).map(|x| Value::Str(x.clone())),
        }
    }

    /// Iterate all values as hashable values
    pub fn values(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        match self.data.as_ref() {
            ColumnData::Int64(v) => Box::new(v.iter().map(|&x| Value::Int(x))),
            ColumnData::Float64(v) => Box::new(v.iter().map(|&x| Value::Float(x))),
            ColumnData::Utf8(v) => Box::new(v.iter().map(|x| Value::Str(x.clone()))),
        }
    }

    /// Numeric value at `row`, `None` for string columns
    pub fn numeric_value(&self, row: usize) -> Option<f64> {
        match self.data.as_ref() {
            ColumnData::Int64(v) => v.get(row).map(|&x| x as f64),
            ColumnData::Float64(v) => v.get(row).copied(),
            ColumnData::Utf8(_) => None,
        }
    }
}
