//! Headerless delimited table reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use featjoin_core::{Column, DataType, Field, Table};
use tracing::info;

use crate::error::{Error, Result};

/// Options for the table reader
#[derive(Debug, Clone)]
pub struct TableReaderOptions {
    /// Delimiter character
    pub delimiter: u8,

    /// Whether `"` starts a quoted field
    pub quoting: bool,

    /// Whether to trim whitespace around fields
    pub trim: bool,
}

impl Default for TableReaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            quoting: false,
            trim: false,
        }
    }
}

/// Per-column value buffer while reading
enum Builder {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Utf8(Vec<String>),
}

impl Builder {
    fn for_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Int64 => Builder::Int(Vec::new()),
            DataType::Float64 => Builder::Float(Vec::new()),
            DataType::Utf8 => Builder::Utf8(Vec::new()),
        }
    }

    fn push(&mut self, raw: &str) -> std::result::Result<(), String> {
        match self {
            Builder::Int(values) => {
                let value = raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("'{raw}' is not an integer: {e}"))?;
                values.push(value);
            }
            Builder::Float(values) => {
                let value = raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("'{raw}' is not a number: {e}"))?;
                values.push(value);
            }
            Builder::Utf8(values) => values.push(raw.to_string()),
        }
        Ok(())
    }

    fn finish(self, field: &Field) -> Column {
        let name = field.name();
        let kind = field.kind();
        match self {
            Builder::Int(values) => Column::from_i64(name, kind, values),
            Builder::Float(values) => Column::from_f64(name, kind, values),
            Builder::Utf8(values) => Column::from_strings(name, kind, values),
        }
    }
}

/// Reads a headerless delimited stream into a [`Table`]
///
/// Declared columns map to the leading fields of each row in order; any
/// further fields, such as the empty one after a trailing delimiter, are
/// ignored.
pub struct TableReader<R: Read> {
    /// Inner CSV reader
    reader: csv::Reader<R>,

    /// Declared columns
    columns: Vec<Field>,
}

impl<R: Read> TableReader<R> {
    /// Create a reader over `reader` with the declared `columns`
    pub fn new(reader: R, columns: Vec<Field>, options: &TableReaderOptions) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::InvalidArgument("no columns declared".into()));
        }

        let reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quoting(options.quoting)
            .trim(if options.trim {
                csv::Trim::All
            } else {
                csv::Trim::None
            })
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        Ok(Self { reader, columns })
    }

    /// Read every remaining row
    pub fn read_table(&mut self) -> Result<Table> {
        let mut builders: Vec<Builder> = self
            .columns
            .iter()
            .map(|f| Builder::for_type(f.data_type()))
            .collect();

        let mut record = StringRecord::new();
        let mut row = 0;
        while self.reader.read_record(&mut record)? {
            row += 1;
            if record.len() < self.columns.len() {
                return Err(Error::Format {
                    row,
                    column: self.columns[record.len()].name().to_string(),
                    message: format!(
                        "expected at least {} fields, found {}",
                        self.columns.len(),
                        record.len()
                    ),
                });
            }

            let cells = self.columns.iter().zip(&mut builders).zip(record.iter());
            for ((field, builder), raw) in cells {
                builder.push(raw).map_err(|message| Error::Format {
                    row,
                    column: field.name().to_string(),
                    message,
                })?;
            }
        }

        let columns = self
            .columns
            .iter()
            .zip(builders)
            .map(|(field, builder)| builder.finish(field))
            .collect();
        Ok(Table::new(columns)?)
    }
}

/// Load a headerless delimited file, mapping `columns` positionally
pub fn load_table<P: AsRef<Path>>(path: P, delimiter: u8, columns: &[Field]) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let options = TableReaderOptions {
        delimiter,
        ..TableReaderOptions::default()
    };

    let table = TableReader::new(file, columns.to_vec(), &options)?.read_table()?;
    info!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.column_count(),
        "table loaded"
    );
    Ok(table)
}
