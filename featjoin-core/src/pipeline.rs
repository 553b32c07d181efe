//! Join-then-build feature pipelines

use tracing::debug;

use crate::error::Result;
use crate::join::{compose, output_schema, JoinSpec, TableSet};
use crate::matrix::{check_feature_field, to_matrix, FeatureMatrix, Representation};

/// Encoded tables plus the recipe that turns them into a feature matrix
///
/// Materializing runs the join and the matrix build every time, so a
/// workload fed by a pipeline measures end-to-end inference.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    /// Encoded tables by role
    tables: TableSet,

    /// Join topology
    spec: JoinSpec,

    /// Representation of the built matrix
    representation: Representation,
}

impl FeaturePipeline {
    /// Create a pipeline
    pub fn new(tables: TableSet, spec: JoinSpec, representation: Representation) -> Self {
        Self {
            tables,
            spec,
            representation,
        }
    }

    /// The encoded tables
    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    /// The join topology
    pub fn spec(&self) -> &JoinSpec {
        &self.spec
    }

    /// Representation of the built matrix
    pub fn representation(&self) -> Representation {
        self.representation
    }

    /// Column count C of the feature matrix, without joining
    ///
    /// Fails with [`Error::Type`](crate::error::Error::Type) when a joined
    /// column could not enter the matrix.
    pub fn width(&self) -> Result<usize> {
        let schema = output_schema(&self.tables, &self.spec)?;
        for field in schema.fields() {
            check_feature_field(field)?;
        }
        Ok(schema.len())
    }

    /// Join the tables and build the feature matrix
    pub fn materialize(&self) -> Result<FeatureMatrix> {
        let joined = compose(&self.tables, &self.spec)?;
        debug!(
            rows = joined.row_count(),
            cols = joined.column_count(),
            "materialized feature pipeline"
        );
        to_matrix(&joined, self.representation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::schema::ColumnKind;
    use crate::table::Table;

    #[test]
    fn test_width_matches_materialized_matrix() {
        let mut tables = TableSet::new();
        tables.insert(
            "fact".into(),
            Table::new(vec![
                Column::from_i64("k", ColumnKind::Key, vec![0, 1, 1]),
                Column::from_f64("v", ColumnKind::Numeric, vec![1.0, 2.0, 3.0]),
            ])
            .unwrap(),
        );
        tables.insert(
            "dim".into(),
            Table::new(vec![
                Column::from_i64("k", ColumnKind::Key, vec![1]),
                Column::from_f64("w", ColumnKind::Numeric, vec![5.0]),
            ])
            .unwrap(),
        );

        let pipeline = FeaturePipeline::new(
            tables,
            JoinSpec::star("fact", &[("dim", "k")]),
            Representation::Sparse,
        );
        let matrix = pipeline.materialize().unwrap();
        assert_eq!(pipeline.width().unwrap(), 3);
        assert_eq!(matrix.cols(), 3);
        assert_eq!(matrix.rows(), 2);
    }

    #[test]
    fn test_width_rejects_unencoded_columns() {
        let mut tables = TableSet::new();
        tables.insert(
            "fact".into(),
            Table::new(vec![
                Column::from_i64("k", ColumnKind::Key, vec![0]),
                Column::from_strings("label", ColumnKind::Categorical, vec!["a"]),
            ])
            .unwrap(),
        );
        let pipeline =
            FeaturePipeline::new(tables, JoinSpec::star("fact", &[]), Representation::Dense);
        assert!(matches!(pipeline.width(), Err(crate::error::Error::Type(_))));
    }
}
