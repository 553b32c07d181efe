//! Immutable columnar tables

use std::fmt;
use std::sync::Arc;

use crate::column::{Column, ColumnData, Value};
use crate::error::{Error, Result};
use crate::schema::{ColumnKind, Schema};

/// An ordered set of named columns sharing a row count
///
/// Every transformation returns a new table; column storage is shared
/// between the old and new table where it is unchanged.
#[derive(Debug, Clone)]
pub struct Table {
    /// Schema describing the columns
    schema: Arc<Schema>,

    /// Columns in this table
    columns: Vec<Column>,

    /// Number of rows in this table
    row_count: usize,
}

impl Table {
    /// Create a new table from columns of equal length and unique names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let schema = Schema::new(columns.iter().map(|c| c.field().clone()).collect())?;

        let row_count = columns.first().map_or(0, Column::len);
        for column in &columns {
            if column.len() != row_count {
                return Err(Error::Schema(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    row_count
                )));
            }
        }

        Ok(Self {
            schema: Arc::new(schema),
            columns,
            row_count,
        })
    }

    /// Get the schema of this table
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Get the number of rows in this table
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Get the number of columns in this table
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if this table has no rows
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Get a reference to a column by index
    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns.get(index).ok_or_else(|| {
            Error::Schema(format!(
                "column index {index} out of range for {} columns",
                self.columns.len()
            ))
        })
    }

    /// Get a reference to a column by name
    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        let index = self.schema.index_of(name)?;
        self.column(index)
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Create a projection of this table with only the specified columns
    pub fn project(&self, indices: &[usize]) -> Result<Self> {
        let columns = indices
            .iter()
            .map(|&i| self.column(i).cloned())
            .collect::<Result<Vec<_>>>()?;

        Self::new(columns).map(|mut t| {
            t.row_count = self.row_count;
            t
        })
    }

    /// Create a projection of this table with only the specified column names
    pub fn project_by_names(&self, names: &[&str]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|&name| self.schema.index_of(name))
            .collect::<Result<Vec<_>>>()?;
        self.project(&indices)
    }

    /// Replace the named column with `replacement` at the same position
    pub fn replace_column(&self, name: &str, replacement: Column) -> Result<Self> {
        let index = self.schema.index_of(name)?;
        let mut columns = self.columns.clone();
        columns[index] = replacement;
        Self::new(columns)
    }

    /// Drop the named column
    pub fn drop_column(&self, name: &str) -> Result<Self> {
        let index = self.schema.index_of(name)?;
        let mut columns = self.columns.clone();
        columns.remove(index);

        let mut table = Self::new(columns)?;
        table.row_count = self.row_count;
        Ok(table)
    }

    /// Append columns at the end
    pub fn with_columns(&self, extra: Vec<Column>) -> Result<Self> {
        let mut columns = self.columns.clone();
        columns.extend(extra);

        let mut table = Self::new(columns)?;
        if table.columns.is_empty() {
            table.row_count = self.row_count;
        }
        Ok(table)
    }

    /// Append a dense key column numbering rows from `start`
    pub fn with_row_index(&self, name: &str, start: i64) -> Result<Self> {
        let values = (0..self.row_count).map(|i| start + i as i64).collect();
        self.with_columns(vec![Column::from_i64(name, ColumnKind::Key, values)])
    }

    /// Rename every column through `rename`
    pub fn rename_with<F>(&self, mut rename: F) -> Result<Self>
    where
        F: FnMut(&str) -> String,
    {
        let columns = self
            .columns
            .iter()
            .map(|c| c.renamed(&rename(c.name())))
            .collect();
        Self::new(columns)
    }

    /// Gather the given rows into a new table
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.row_count) {
            return Err(Error::InvalidArgument(format!(
                "row {bad} out of range for {} rows",
                self.row_count
            )));
        }

        let columns = self.columns.iter().map(|c| c.take(indices)).collect();
        let mut table = Self::new(columns)?;
        table.row_count = indices.len();
        Ok(table)
    }

    /// All values of one row, in column order
    pub fn row(&self, index: usize) -> Result<Vec<Value>> {
        self.columns
            .iter()
            .map(|c| {
                c.value(index).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "row {index} out of range for {} rows",
                        self.row_count
                    ))
                })
            })
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Table: {} rows, {} columns",
            self.row_count,
            self.columns.len()
        )?;
        writeln!(f, "Schema: {}", self.schema)?;

        // Limit number of rows to display
        const MAX_ROWS: usize = 10;
        const MAX_COLS: usize = 5;

        let display_cols = self.columns.len().min(MAX_COLS);

        for (i, column) in self.columns.iter().take(display_cols).enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{:15}", column.name())?;
        }

        if display_cols < self.columns.len() {
            write!(
                f,
                " | ... ({} more columns)",
                self.columns.len() - display_cols
            )?;
        }
        writeln!(f)?;

        for i in 0..display_cols {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{:-<15}", "")?;
        }
        writeln!(f)?;

        let display_rows = self.row_count.min(MAX_ROWS);
        for row in 0..display_rows {
            for (col, column) in self.columns.iter().take(display_cols).enumerate() {
                if col > 0 {
                    write!(f, " | ")?;
                }
                match column.data() {
                    ColumnData::Int64(v) => write!(f, "{:15}", v[row])?,
                    ColumnData::Float64(v) => write!(f, "{:15.6}", v[row])?,
                    ColumnData::Utf8(v) => write!(f, "{:15}", v[row])?,
                }
            }
            writeln!(f)?;
        }

        if self.row_count > MAX_ROWS {
            writeln!(f, "... ({} more rows)", self.row_count - MAX_ROWS)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(vec![
            Column::from_i64("id", ColumnKind::Key, vec![10, 20, 30]),
            Column::from_f64("price", ColumnKind::Numeric, vec![1.5, 2.5, 3.5]),
            Column::from_strings("color", ColumnKind::Categorical, vec!["r", "g", "r"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let result = Table::new(vec![
            Column::from_i64("a", ColumnKind::Key, vec![1, 2]),
            Column::from_i64("b", ColumnKind::Key, vec![1]),
        ]);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_project_by_names_reorders() {
        let table = sample().project_by_names(&["color", "id"]).unwrap();
        let names: Vec<&str> = table.schema().names().collect();
        assert_eq!(names, vec!["color", "id"]);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        assert!(matches!(
            sample().project_by_names(&["nope"]),
            Err(Error::Schema(_))
        ));
        assert!(matches!(sample().drop_column("nope"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_with_row_index() {
        let table = sample().with_row_index("row_id", 1).unwrap();
        let column = table.column_by_name("row_id").unwrap();
        assert_eq!(column.kind(), ColumnKind::Key);
        assert_eq!(column.data(), &ColumnData::Int64(vec![1, 2, 3]));
    }

    #[test]
    fn test_take_keeps_original_untouched() {
        let table = sample();
        let taken = table.take(&[2, 2]).unwrap();
        assert_eq!(taken.row_count(), 2);
        assert_eq!(table.row_count(), 3);
        assert_eq!(taken.row(1).unwrap()[0], Value::Int(30));
        assert!(table.take(&[3]).is_err());
    }

    #[test]
    fn test_display_mentions_shape() {
        let rendered = sample().to_string();
        assert!(rendered.starts_with("Table: 3 rows, 3 columns"));
    }
}
