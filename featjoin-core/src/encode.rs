//! Dictionary and one-hot encoding of relational columns

use std::collections::HashMap;

use tracing::debug;

use crate::column::{Column, Value};
use crate::error::{Error, Result};
use crate::schema::ColumnKind;
use crate::table::Table;

/// Maps key values to dense integer codes in first-seen order
///
/// A dictionary can be reused across several tables so that the same key
/// value receives the same code on both sides of a join.
#[derive(Debug, Clone, Default)]
pub struct KeyDictionary {
    /// Code assigned to each distinct value
    codes: HashMap<Value, i64>,

    /// Distinct values in code order
    values: Vec<Value>,
}

impl KeyDictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct values seen so far
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value has been seen
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value behind a code
    pub fn value(&self, code: i64) -> Option<&Value> {
        usize::try_from(code).ok().and_then(|i| self.values.get(i))
    }

    /// Code for `value`, assigning the next free code on first sight
    pub fn code(&mut self, value: Value) -> i64 {
        if let Some(&code) = self.codes.get(&value) {
            return code;
        }
        let code = self.values.len() as i64;
        self.values.push(value.clone());
        self.codes.insert(value, code);
        code
    }

    /// Replace the named key column of `table` with its codes
    pub fn encode(&mut self, table: &Table, column: &str) -> Result<Table> {
        let source = key_column(table, column)?;
        let codes: Vec<i64> = source.values().map(|v| self.code(v)).collect();

        debug!(
            column,
            rows = codes.len(),
            distinct = self.len(),
            "dictionary encoded column"
        );

        table.replace_column(column, Column::from_i64(column, ColumnKind::Key, codes))
    }
}

fn key_column<'a>(table: &'a Table, column: &str) -> Result<&'a Column> {
    let source = table.column_by_name(column)?;
    if source.kind() != ColumnKind::Key {
        return Err(Error::Schema(format!(
            "column '{column}' is {}, dictionary encoding needs a key column",
            source.kind()
        )));
    }
    Ok(source)
}

/// Replace a key column's values with codes `0..k-1` in first-seen order
pub fn dictionary_encode(table: &Table, column: &str) -> Result<Table> {
    KeyDictionary::new().encode(table, column)
}

/// Replace a categorical column with one 0/1 column per distinct value
///
/// New columns are named after the values, appended after the remaining
/// columns in first-seen order. The original column is dropped.
pub fn one_hot_encode(table: &Table, column: &str) -> Result<Table> {
    let source = table.column_by_name(column)?;
    if source.kind() != ColumnKind::Categorical {
        return Err(Error::Schema(format!(
            "column '{column}' is {}, one-hot encoding needs a categorical column",
            source.kind()
        )));
    }

    let mut dictionary = KeyDictionary::new();
    let codes: Vec<i64> = source.values().map(|v| dictionary.code(v)).collect();

    let mut indicators = vec![vec![0.0; codes.len()]; dictionary.len()];
    for (row, &code) in codes.iter().enumerate() {
        indicators[code as usize][row] = 1.0;
    }

    let expanded = dictionary
        .values
        .iter()
        .zip(indicators)
        .map(|(value, values)| Column::from_f64(&value.to_string(), ColumnKind::Numeric, values))
        .collect();

    debug!(column, width = dictionary.len(), "one-hot encoded column");

    table.drop_column(column)?.with_columns(expanded)
}

/// Apply [`one_hot_encode`] to each column in order
pub fn one_hot_encode_all(table: &Table, columns: &[&str]) -> Result<Table> {
    let mut current = table.clone();
    for column in columns {
        current = one_hot_encode(&current, column)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnData;
    use proptest::prelude::*;

    fn orders() -> Table {
        Table::new(vec![
            Column::from_strings("order", ColumnKind::Key, vec!["o9", "o3", "o9", "o1"]),
            Column::from_strings("status", ColumnKind::Categorical, vec!["F", "O", "F", "P"]),
            Column::from_f64("price", ColumnKind::Numeric, vec![1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_dictionary_codes_follow_first_seen_order() {
        let encoded = dictionary_encode(&orders(), "order").unwrap();
        let column = encoded.column_by_name("order").unwrap();
        assert_eq!(column.data(), &ColumnData::Int64(vec![0, 1, 0, 2]));
        assert_eq!(column.kind(), ColumnKind::Key);
        assert_eq!(encoded.schema().index_of("order").unwrap(), 0);
    }

    #[test]
    fn test_dictionary_encode_requires_key_column() {
        assert!(matches!(
            dictionary_encode(&orders(), "status"),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            dictionary_encode(&orders(), "missing"),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_shared_dictionary_aligns_tables() {
        let left = Table::new(vec![Column::from_i64("k", ColumnKind::Key, vec![7, 5])]).unwrap();
        let right =
            Table::new(vec![Column::from_i64("k", ColumnKind::Key, vec![5, 8, 7])]).unwrap();

        let mut dictionary = KeyDictionary::new();
        let left = dictionary.encode(&left, "k").unwrap();
        let right = dictionary.encode(&right, "k").unwrap();

        assert_eq!(left.column(0).unwrap().data(), &ColumnData::Int64(vec![0, 1]));
        assert_eq!(right.column(0).unwrap().data(), &ColumnData::Int64(vec![1, 2, 0]));
        assert_eq!(dictionary.value(2), Some(&Value::Int(8)));
    }

    #[test]
    fn test_one_hot_appends_columns_in_first_seen_order() {
        let encoded = one_hot_encode(&orders(), "status").unwrap();
        let names: Vec<&str> = encoded.schema().names().collect();
        assert_eq!(names, vec!["order", "price", "F", "O", "P"]);
        assert_eq!(
            encoded.column_by_name("F").unwrap().data(),
            &ColumnData::Float64(vec![1.0, 0.0, 1.0, 0.0])
        );
        assert!(encoded.column_by_name("status").is_err());
    }

    #[test]
    fn test_one_hot_requires_categorical_column() {
        assert!(matches!(
            one_hot_encode(&orders(), "price"),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            one_hot_encode(&orders(), "absent"),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_one_hot_name_collision_is_schema_error() {
        let table = Table::new(vec![
            Column::from_f64("A", ColumnKind::Numeric, vec![1.0]),
            Column::from_strings("grade", ColumnKind::Categorical, vec!["A"]),
        ])
        .unwrap();
        assert!(matches!(one_hot_encode(&table, "grade"), Err(Error::Schema(_))));
    }

    proptest! {
        #[test]
        fn prop_dictionary_codes_are_a_permutation(
            keys in prop::collection::vec(0i64..20, 0..64),
        ) {
            let table =
                Table::new(vec![Column::from_i64("k", ColumnKind::Key, keys.clone())]).unwrap();
            let encoded = dictionary_encode(&table, "k").unwrap();
            prop_assert_eq!(encoded.row_count(), keys.len());

            let ColumnData::Int64(codes) = encoded.column(0).unwrap().data().clone() else {
                panic!("codes must be integers");
            };
            let mut distinct: Vec<i64> = codes.clone();
            distinct.sort_unstable();
            distinct.dedup();
            let expected: Vec<i64> = (0..distinct.len() as i64).collect();
            prop_assert_eq!(distinct, expected);

            // equal keys map to equal codes and vice versa
            for i in 0..keys.len() {
                for j in 0..keys.len() {
                    prop_assert_eq!(keys[i] == keys[j], codes[i] == codes[j]);
                }
            }
        }

        #[test]
        fn prop_one_hot_rows_sum_to_one(labels in prop::collection::vec("[a-e]", 1..48)) {
            let distinct = {
                let mut d = labels.clone();
                d.sort();
                d.dedup();
                d.len()
            };
            let table = Table::new(vec![
                Column::from_f64("x", ColumnKind::Numeric, vec![0.0; labels.len()]),
                Column::from_strings("label", ColumnKind::Categorical, labels.clone()),
            ]).unwrap();

            let encoded = one_hot_encode(&table, "label").unwrap();
            prop_assert_eq!(encoded.column_count(), 1 + distinct);
            prop_assert!(encoded.column_by_name("label").is_err());

            for row in 0..labels.len() {
                let sum: f64 = encoded.columns()[1..]
                    .iter()
                    .filter_map(|c| c.numeric_value(row))
                    .sum();
                prop_assert!((sum - 1.0).abs() < f64::EPSILON);
            }
        }

        #[test]
        fn prop_one_hot_all_replaces_each_column_with_a_unit_block(
            rows in prop::collection::vec(("[a-d]", "[p-s]"), 1..32),
        ) {
            let (first, second): (Vec<String>, Vec<String>) = rows.iter().cloned().unzip();
            // distinct alphabets keep the indicator names apart
            let table = Table::new(vec![
                Column::from_strings("lower", ColumnKind::Categorical, first.clone()),
                Column::from_f64("x", ColumnKind::Numeric, vec![2.0; rows.len()]),
                Column::from_strings("upper", ColumnKind::Categorical, second.clone()),
            ]).unwrap();

            let encoded = one_hot_encode_all(&table, &["lower", "upper"]).unwrap();
            prop_assert!(encoded.column_by_name("lower").is_err());
            prop_assert!(encoded.column_by_name("upper").is_err());
            prop_assert_eq!(encoded.column(0).unwrap().name(), "x");
            prop_assert!(encoded.columns().iter().all(|c| c.kind() != ColumnKind::Categorical));

            for values in [&first, &second] {
                let mut block: Vec<&str> = values.iter().map(String::as_str).collect();
                block.sort_unstable();
                block.dedup();
                for row in 0..rows.len() {
                    let sum: f64 = block
                        .iter()
                        .filter_map(|name| encoded.column_by_name(name).ok())
                        .filter_map(|c| c.numeric_value(row))
                        .sum();
                    prop_assert!((sum - 1.0).abs() < f64::EPSILON);
                }
            }
            prop_assert_eq!(encoded.column_count(), 1 + {
                let mut all: Vec<&String> = first.iter().chain(&second).collect();
                all.sort_unstable();
                all.dedup();
                all.len()
            });
        }
    }
}
