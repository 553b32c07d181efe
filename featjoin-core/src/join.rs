//! Join composition over encoded tables
//!
//! A [`JoinSpec`] names a base table and a sequence of inner equi-join steps.
//! Each step joins the accumulated result (left) with a table role from the
//! [`TableSet`] (right). Rows without a partner on either side are dropped.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::column::{Column, ColumnData, Value};
use crate::error::{Error, Result};
use crate::schema::{ColumnKind, Field, Schema};
use crate::table::Table;

/// Tables addressed by role name
pub type TableSet = HashMap<String, Table>;

/// Suffixes applied to colliding non-key column names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixPolicy {
    /// Suffix for the accumulated (left) side
    pub left: String,

    /// Suffix for the joined (right) side
    pub right: String,
}

impl SuffixPolicy {
    /// Create a suffix policy
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

impl Default for SuffixPolicy {
    fn default() -> Self {
        Self::new("_x", "_y")
    }
}

/// Key columns matched by one join step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKeys {
    /// Key columns on the accumulated side
    pub left: Vec<String>,

    /// Key columns on the joined side, positionally paired with `left`
    pub right: Vec<String>,
}

impl JoinKeys {
    /// Join on a column with the same name on both sides
    pub fn on(name: &str) -> Self {
        Self::between(name, name)
    }

    /// Join `left` on the accumulated side with `right` on the joined side
    pub fn between(left: &str, right: &str) -> Self {
        Self {
            left: vec![left.to_string()],
            right: vec![right.to_string()],
        }
    }

    /// Composite key with the same names on both sides
    pub fn on_many(names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|n| (*n).to_string()).collect();
        Self {
            left: names.clone(),
            right: names,
        }
    }
}

/// One inner join step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStep {
    /// Role of the table joined in this step
    pub right: String,

    /// Key columns to match
    pub keys: JoinKeys,

    /// Collision suffixes
    pub suffixes: SuffixPolicy,
}

/// Declared join topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// Fact table joined to dimension tables on distinct keys
    Star,

    /// Fact table joined to a copy of itself, then to dimension tables
    SelfJoin,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Topology::Star => write!(f, "SQ"),
            Topology::SelfJoin => write!(f, "SJ"),
        }
    }
}

/// A join topology: base table role plus ordered join steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Topology label
    pub topology: Topology,

    /// Role of the starting table
    pub base: String,

    /// Steps in execution order
    pub steps: Vec<JoinStep>,
}

impl JoinSpec {
    /// Star join: `fact` joined to each `(dimension, key)` in order
    pub fn star(fact: &str, dimensions: &[(&str, &str)]) -> Self {
        let mut spec = Self {
            topology: Topology::Star,
            base: fact.to_string(),
            steps: Vec::new(),
        };
        for (dimension, key) in dimensions {
            spec = spec.join(dimension, JoinKeys::on(key));
        }
        spec
    }

    /// Self join: `fact` joined to a copy of itself on `key`
    ///
    /// Further dimension steps are added with [`JoinSpec::join`].
    pub fn self_join(fact: &str, key: &str, suffixes: SuffixPolicy) -> Self {
        Self {
            topology: Topology::SelfJoin,
            base: fact.to_string(),
            steps: vec![JoinStep {
                right: fact.to_string(),
                keys: JoinKeys::on(key),
                suffixes,
            }],
        }
    }

    /// Append a step with the default suffix policy
    #[must_use]
    pub fn join(self, right: &str, keys: JoinKeys) -> Self {
        self.join_with_suffixes(right, keys, SuffixPolicy::default())
    }

    /// Append a step with explicit suffixes
    #[must_use]
    pub fn join_with_suffixes(
        mut self,
        right: &str,
        keys: JoinKeys,
        suffixes: SuffixPolicy,
    ) -> Self {
        self.steps.push(JoinStep {
            right: right.to_string(),
            keys,
            suffixes,
        });
        self
    }
}

/// Column layout of one join step's output
struct StepPlan {
    /// Key column positions on the left
    left_keys: Vec<usize>,

    /// Key column positions on the right
    right_keys: Vec<usize>,

    /// `(left position, output name)` in output order
    left_columns: Vec<(usize, String)>,

    /// `(right position, output name)` in output order
    right_columns: Vec<(usize, String)>,
}

impl StepPlan {
    fn new(left: &Schema, right: &Schema, step: &JoinStep) -> Result<Self> {
        let keys = &step.keys;
        if keys.left.is_empty() || keys.left.len() != keys.right.len() {
            return Err(Error::InvalidArgument(format!(
                "join with '{}' needs matching non-empty key lists, got {:?} and {:?}",
                step.right, keys.left, keys.right
            )));
        }

        let left_keys = resolve_keys(left, &keys.left, "left")?;
        let right_keys = resolve_keys(right, &keys.right, &step.right)?;
        check_key_types(left, &left_keys, right, &right_keys)?;

        // A right key with the same name as its left partner is merged into it
        let merged: HashSet<usize> = keys
            .left
            .iter()
            .zip(&keys.right)
            .zip(&right_keys)
            .filter(|((l, r), _)| l == r)
            .map(|(_, &pos)| pos)
            .collect();

        let kept_right: Vec<usize> = (0..right.len()).filter(|i| !merged.contains(i)).collect();

        let left_names: HashSet<&str> = left.names().collect();
        let right_names: HashSet<&str> = kept_right
            .iter()
            .filter_map(|&i| right.field(i).map(Field::name))
            .collect();
        let colliding: HashSet<&str> = left_names.intersection(&right_names).copied().collect();

        let rename = |name: &str, suffix: &str| {
            if colliding.contains(name) {
                format!("{name}{suffix}")
            } else {
                name.to_string()
            }
        };

        let left_columns = left
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| (i, rename(f.name(), &step.suffixes.left)))
            .collect();
        let right_columns = kept_right
            .iter()
            .filter_map(|&i| right.field(i).map(|f| (i, rename(f.name(), &step.suffixes.right))))
            .collect();

        Ok(Self {
            left_keys,
            right_keys,
            left_columns,
            right_columns,
        })
    }

    fn output_schema(&self, left: &Schema, right: &Schema) -> Result<Schema> {
        let fields = self
            .left_columns
            .iter()
            .filter_map(|(i, name)| left.field(*i).map(|f| f.renamed(name)))
            .chain(
                self.right_columns
                    .iter()
                    .filter_map(|(i, name)| right.field(*i).map(|f| f.renamed(name))),
            )
            .collect();

        Schema::new(fields).map_err(|e| {
            Error::Schema(format!("suffix policy does not yield unique names: {e}"))
        })
    }
}

fn resolve_keys(schema: &Schema, names: &[String], side: &str) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            let index = schema.index_of(name).map_err(|_| {
                Error::JoinKey(format!("key column '{name}' missing on {side} side"))
            })?;
            match schema.field(index) {
                Some(field) if field.kind() == ColumnKind::Key => Ok(index),
                Some(field) => Err(Error::JoinKey(format!(
                    "column '{name}' on {side} side is {}, not a key",
                    field.kind()
                ))),
                None => Err(Error::JoinKey(format!("key column '{name}' missing on {side} side"))),
            }
        })
        .collect()
}

/// Every key pair must have the same data type, single or composite
fn check_key_types(
    left: &Schema,
    left_keys: &[usize],
    right: &Schema,
    right_keys: &[usize],
) -> Result<()> {
    let pairs = left_keys
        .iter()
        .zip(right_keys)
        .filter_map(|(&l, &r)| left.field(l).zip(right.field(r)));
    for (l, r) in pairs {
        if l.data_type() != r.data_type() {
            return Err(Error::JoinKey(format!(
                "key '{}' is {} on the left but '{}' is {} on the right",
                l.name(),
                l.data_type(),
                r.name(),
                r.data_type()
            )));
        }
    }
    Ok(())
}

/// Hash index over the right side's key columns
enum KeyIndex {
    /// Single integer key, the common case after dictionary encoding
    Int(HashMap<i64, Vec<usize>>),

    /// Any other key combination
    Composite(HashMap<Vec<Value>, Vec<usize>>),
}

impl KeyIndex {
    fn build(columns: &[&Column], rows: usize) -> Self {
        if let [single] = columns {
            if let ColumnData::Int64(values) = single.data() {
                let mut index: HashMap<i64, Vec<usize>> = HashMap::new();
                for (row, &v) in values.iter().enumerate() {
                    index.entry(v).or_default().push(row);
                }
                return KeyIndex::Int(index);
            }
        }

        let mut index: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
        for row in 0..rows {
            index.entry(composite_key(columns, row)).or_default().push(row);
        }
        KeyIndex::Composite(index)
    }

    fn probe(&self, columns: &[&Column], row: usize) -> Option<&[usize]> {
        match self {
            KeyIndex::Int(index) => match columns {
                [single] => match single.data() {
                    ColumnData::Int64(values) => index.get(&values[row]).map(Vec::as_slice),
                    _ => None,
                },
                _ => None,
            },
            KeyIndex::Composite(index) => {
                index.get(&composite_key(columns, row)).map(Vec::as_slice)
            }
        }
    }
}

fn composite_key(columns: &[&Column], row: usize) -> Vec<Value> {
    columns.iter().filter_map(|c| c.value(row)).collect()
}

/// Inner join of `left` with `right` as described by `step`
pub fn join(left: &Table, right: &Table, step: &JoinStep) -> Result<Table> {
    let plan = StepPlan::new(left.schema(), right.schema(), step)?;
    // validates the suffix policy before any rows are touched
    plan.output_schema(left.schema(), right.schema())?;

    let left_key_columns = plan
        .left_keys
        .iter()
        .map(|&i| left.column(i))
        .collect::<Result<Vec<_>>>()?;
    let right_key_columns = plan
        .right_keys
        .iter()
        .map(|&i| right.column(i))
        .collect::<Result<Vec<_>>>()?;

    let index = KeyIndex::build(&right_key_columns, right.row_count());

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    for row in 0..left.row_count() {
        if let Some(matches) = index.probe(&left_key_columns, row) {
            for &m in matches {
                left_rows.push(row);
                right_rows.push(m);
            }
        }
    }

    let mut columns = Vec::with_capacity(plan.left_columns.len() + plan.right_columns.len());
    for (i, name) in &plan.left_columns {
        columns.push(left.column(*i)?.take(&left_rows).renamed(name));
    }
    for (i, name) in &plan.right_columns {
        columns.push(right.column(*i)?.take(&right_rows).renamed(name));
    }

    let joined = Table::new(columns)?;
    debug!(
        right = %step.right,
        left_rows = left.row_count(),
        right_rows = right.row_count(),
        output_rows = joined.row_count(),
        "join step"
    );
    Ok(joined)
}

fn table_for<'a>(tables: &'a TableSet, role: &str) -> Result<&'a Table> {
    tables
        .get(role)
        .ok_or_else(|| Error::InvalidArgument(format!("no table for role '{role}'")))
}

/// Execute every step of `spec` in order and return the joined table
#[instrument(skip(tables, spec), fields(base = %spec.base, topology = %spec.topology))]
pub fn compose(tables: &TableSet, spec: &JoinSpec) -> Result<Table> {
    let mut current = table_for(tables, &spec.base)?.clone();
    for step in &spec.steps {
        let right = table_for(tables, &step.right)?;
        current = join(&current, right, step)?;
    }
    Ok(current)
}

/// Schema `compose` would produce, computed from schemas alone
pub fn output_schema(tables: &TableSet, spec: &JoinSpec) -> Result<Schema> {
    let mut current = table_for(tables, &spec.base)?.schema().as_ref().clone();
    for step in &spec.steps {
        let right = table_for(tables, &step.right)?.schema();
        let plan = StepPlan::new(&current, right, step)?;
        current = plan.output_schema(&current, right)?;
    }
    Ok(current)
}
