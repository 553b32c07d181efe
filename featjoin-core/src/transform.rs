//! Table transforms and transform chains for table preparation

use std::sync::{Arc, Mutex};

use crate::encode::{one_hot_encode_all, KeyDictionary};
use crate::error::{Error, Result};
use crate::table::Table;

/// A transformation from one table to a new table
pub trait TableTransform: Send + Sync {
    /// Transform a table, leaving the input untouched
    fn transform(&self, table: &Table) -> Result<Table>;

    /// Short human-readable description
    fn describe(&self) -> String;
}

/// Dictionary-encode a key column
///
/// Transforms that should agree on codes (both sides of a join) share the
/// same dictionary via [`DictionaryEncode::shared`].
pub struct DictionaryEncode {
    /// Column to encode
    column: String,

    /// Dictionary assigning codes
    dictionary: Arc<Mutex<KeyDictionary>>,
}

impl DictionaryEncode {
    /// Encode `column` with a private dictionary
    pub fn new(column: &str) -> Self {
        Self::shared(column, Arc::new(Mutex::new(KeyDictionary::new())))
    }

    /// Encode `column` with a dictionary shared with other transforms
    pub fn shared(column: &str, dictionary: Arc<Mutex<KeyDictionary>>) -> Self {
        Self {
            column: column.to_string(),
            dictionary,
        }
    }
}

impl TableTransform for DictionaryEncode {
    fn transform(&self, table: &Table) -> Result<Table> {
        let mut dictionary = self
            .dictionary
            .lock()
            .map_err(|_| Error::InvalidArgument("key dictionary lock poisoned".into()))?;
        dictionary.encode(table, &self.column)
    }

    fn describe(&self) -> String {
        format!("dictionary_encode({})", self.column)
    }
}

/// One-hot encode a categorical column
pub struct OneHotEncode {
    /// Columns to expand, in order
    columns: Vec<String>,
}

impl OneHotEncode {
    /// Expand each of `columns`
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

impl TableTransform for OneHotEncode {
    fn transform(&self, table: &Table) -> Result<Table> {
        let columns: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        one_hot_encode_all(table, &columns)
    }

    fn describe(&self) -> String {
        format!("one_hot_encode({})", self.columns.join(", "))
    }
}

/// Keep only the named columns, in the given order
pub struct Project {
    /// Columns to keep
    columns: Vec<String>,
}

impl Project {
    /// Project onto `columns`
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

impl TableTransform for Project {
    fn transform(&self, table: &Table) -> Result<Table> {
        let names: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        table.project_by_names(&names)
    }

    fn describe(&self) -> String {
        format!("project({})", self.columns.join(", "))
    }
}

/// A chain of transforms that can be executed as a single transform
#[derive(Default)]
pub struct TransformChain {
    /// The transforms in this chain
    transforms: Vec<Box<dyn TableTransform>>,
}

impl TransformChain {
    /// Create a new transform chain
    pub fn new(transforms: Vec<Box<dyn TableTransform>>) -> Self {
        Self { transforms }
    }

    /// Append a transform
    #[must_use]
    pub fn then<T: TableTransform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }
}

impl TableTransform for TransformChain {
    fn transform(&self, table: &Table) -> Result<Table> {
        let mut current = table.clone();

        for transform in &self.transforms {
            current = transform.transform(&current)?;
        }

        Ok(current)
    }

    fn describe(&self) -> String {
        self.transforms
            .iter()
            .map(|t| t.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, ColumnData};
    use crate::schema::ColumnKind;

    #[test]
    fn test_chain_applies_in_order() {
        let table = Table::new(vec![
            Column::from_strings("id", ColumnKind::Key, vec!["b", "a"]),
            Column::from_strings("drop_me", ColumnKind::Categorical, vec!["x", "y"]),
            Column::from_strings("seg", ColumnKind::Categorical, vec!["s", "t"]),
        ])
        .unwrap();

        let chain = TransformChain::default()
            .then(DictionaryEncode::new("id"))
            .then(Project::new(&["id", "drop_me", "seg"]))
            .then(OneHotEncode::new(&["seg", "drop_me"]));

        let out = chain.transform(&table).unwrap();
        let names: Vec<&str> = out.schema().names().collect();
        assert_eq!(names, vec!["id", "s", "t", "x", "y"]);
        assert_eq!(out.column(0).unwrap().data(), &ColumnData::Int64(vec![0, 1]));
        assert_eq!(
            chain.describe(),
            "dictionary_encode(id) -> project(id, drop_me, seg) -> one_hot_encode(seg, drop_me)"
        );
    }

    #[test]
    fn test_chain_stops_at_first_error() {
        let table = Table::new(vec![Column::from_i64("id", ColumnKind::Key, vec![1])]).unwrap();
        let chain = TransformChain::default()
            .then(OneHotEncode::new(&["missing"]))
            .then(DictionaryEncode::new("id"));
        assert!(matches!(chain.transform(&table), Err(Error::Schema(_))));
    }
}
