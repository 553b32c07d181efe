//! Schema definition for relational tables

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Physical type of column values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer
    Int64,

    /// 64-bit floating point
    Float64,

    /// UTF-8 encoded string
    Utf8,
}

impl DataType {
    /// Whether values of this type can be placed in a numeric matrix
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataType::Int64 => write!(f, "Int64"),
            DataType::Float64 => write!(f, "Float64"),
            DataType::Utf8 => write!(f, "Utf8"),
        }
    }
}

/// Logical role of a column in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Hashable identifier used for joins and dictionary encoding
    Key,

    /// Finite domain value, expanded by one-hot encoding
    Categorical,

    /// Plain numeric feature
    Numeric,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColumnKind::Key => write!(f, "key"),
            ColumnKind::Categorical => write!(f, "categorical"),
            ColumnKind::Numeric => write!(f, "numeric"),
        }
    }
}

/// A named, typed column declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Name of the column
    pub name: String,

    /// Physical type of the values
    pub data_type: DataType,

    /// Logical role of the column
    pub kind: ColumnKind,
}

impl Field {
    /// Create a new field
    pub fn new(name: &str, data_type: DataType, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            kind,
        }
    }

    /// Shorthand for a key field
    pub fn key(name: &str, data_type: DataType) -> Self {
        Self::new(name, data_type, ColumnKind::Key)
    }

    /// Shorthand for a categorical field
    pub fn categorical(name: &str, data_type: DataType) -> Self {
        Self::new(name, data_type, ColumnKind::Categorical)
    }

    /// Shorthand for a numeric field
    pub fn numeric(name: &str, data_type: DataType) -> Self {
        Self::new(name, data_type, ColumnKind::Numeric)
    }

    /// Get the name of this field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the data type of this field
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Get the kind of this field
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Whether values of this field can enter a numeric matrix as-is
    pub fn is_numeric(&self) -> bool {
        self.data_type.is_numeric() && self.kind != ColumnKind::Categorical
    }

    /// Copy of this field under a different name
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: self.data_type,
            kind: self.kind,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} ({})", self.name, self.data_type, self.kind)
    }
}

/// An ordered set of uniquely named fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    /// Fields in declaration order
    fields: Vec<Field>,

    /// Name to position lookup
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Schema {
    /// Create a schema, rejecting duplicate column names
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), i).is_some() {
                return Err(Error::Schema(format!(
                    "duplicate column name '{}'",
                    field.name
                )));
            }
        }

        Ok(Self { fields, index })
    }

    /// Get all fields
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get a field by position
    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the named field
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::Schema(format!("column '{name}' not found")))
    }

    /// Whether a field with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
        }
        write!(f, "]")
    }
}
