//! TPC-H inference workloads
//!
//! Five `.tbl` files are read, their join keys dictionary-encoded against
//! shared dictionaries, projected onto the feature columns and one-hot
//! encoded. The encoded tables then feed four workloads over two join
//! topologies: the star join
//! `lineitem ⋈ orders ⋈ customer ⋈ supplier ⋈ part` and the self join
//! `lineitem ⋈ lineitem ⋈ part ⋈ supplier ⋈ supplier`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use featjoin_core::matrix::uniform_matrix;
use featjoin_core::transform::{DictionaryEncode, OneHotEncode, Project};
use featjoin_core::{
    ColumnKind, DataType, FeaturePipeline, Field, JoinKeys, JoinSpec, KeyDictionary, OperandSource,
    Operands, SuffixPolicy, Table, TableSet, TableTransform, TransformChain, Workload, WorkloadCase,
};
use featjoin_readers::load_table;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::TpchConfig;
use crate::error::{Error, Result};

/// Table roles, in load order
pub const TABLES: [&str; 5] = ["lineitem", "orders", "customer", "supplier", "part"];

/// Leading columns of a TPC-H table file that the workloads read
///
/// Later fields of each row are ignored by the reader.
pub fn columns(table: &str) -> Option<Vec<Field>> {
    use DataType::{Float64, Int64, Utf8};

    let text = |name: &str| Field::new(name, Utf8, ColumnKind::Categorical);
    let fields = match table {
        "lineitem" => vec![
            Field::key("OrderKey", Int64),
            Field::key("PartKey", Int64),
            Field::key("SuppKey", Int64),
        ],
        "orders" => vec![
            Field::key("OrderKey", Int64),
            Field::key("CustomerKey", Int64),
            Field::categorical("OrderStatus", Utf8),
            Field::numeric("TotalPrice", Float64),
            text("OrderDate"),
            Field::categorical("OrderPriority", Utf8),
            text("Clerk"),
            Field::categorical("ShipPriority", Int64),
        ],
        "customer" => vec![
            Field::key("CustomerKey", Int64),
            text("Name"),
            text("Address"),
            Field::categorical("NationKey", Int64),
            text("Phone"),
            Field::numeric("AcctBal", Float64),
            Field::categorical("MktSegment", Utf8),
        ],
        "supplier" => vec![
            Field::key("SuppKey", Int64),
            text("Name"),
            text("Address"),
            Field::categorical("NationKey", Int64),
            text("Phone"),
            Field::numeric("AcctBal", Float64),
        ],
        "part" => vec![
            Field::key("PartKey", Int64),
            text("Name"),
            Field::categorical("MFGR", Utf8),
            Field::categorical("Brand", Utf8),
            text("Type"),
            Field::numeric("Size", Int64),
            Field::categorical("Container", Utf8),
            Field::numeric("RetailPrice", Float64),
        ],
        _ => return None,
    };
    Some(fields)
}

/// Read the five raw tables from `dir/<role>.tbl`
pub fn load_tables<P: AsRef<Path>>(dir: P, delimiter: u8) -> Result<TableSet> {
    let dir = dir.as_ref();
    let mut tables = TableSet::new();
    for role in TABLES {
        let fields = columns(role)
            .ok_or_else(|| Error::InvalidConfig(format!("no column declaration for '{role}'")))?;
        let table = load_table(dir.join(format!("{role}.tbl")), delimiter, &fields)?;
        tables.insert(role.to_string(), table);
    }
    Ok(tables)
}

/// Encode, project and one-hot the raw tables
///
/// Keys of one domain (orders, customers, suppliers, parts) share a
/// dictionary so codes agree across the tables that join on them. Line
/// items get a `LineItemKey` numbered from 1.
pub fn prepare(raw: &TableSet) -> Result<TableSet> {
    let orders = shared_dictionary();
    let customers = shared_dictionary();
    let suppliers = shared_dictionary();
    let parts = shared_dictionary();

    let recipes: [(&str, TransformChain); 5] = [
        (
            "lineitem",
            TransformChain::default()
                .then(DictionaryEncode::shared("OrderKey", orders.clone()))
                .then(DictionaryEncode::shared("PartKey", parts.clone()))
                .then(DictionaryEncode::shared("SuppKey", suppliers.clone()))
                .then(Project::new(&["LineItemKey", "OrderKey", "PartKey", "SuppKey"])),
        ),
        (
            "orders",
            TransformChain::default()
                .then(DictionaryEncode::shared("OrderKey", orders))
                .then(DictionaryEncode::shared("CustomerKey", customers.clone()))
                .then(Project::new(&[
                    "OrderKey",
                    "CustomerKey",
                    "OrderStatus",
                    "TotalPrice",
                    "OrderPriority",
                    "ShipPriority",
                ]))
                .then(OneHotEncode::new(&["OrderStatus", "OrderPriority", "ShipPriority"])),
        ),
        (
            "customer",
            TransformChain::default()
                .then(DictionaryEncode::shared("CustomerKey", customers))
                .then(Project::new(&["CustomerKey", "NationKey", "AcctBal", "MktSegment"]))
                .then(OneHotEncode::new(&["NationKey", "MktSegment"])),
        ),
        (
            "supplier",
            TransformChain::default()
                .then(DictionaryEncode::shared("SuppKey", suppliers))
                .then(Project::new(&["SuppKey", "NationKey", "AcctBal"]))
                .then(OneHotEncode::new(&["NationKey"])),
        ),
        (
            "part",
            TransformChain::default()
                .then(DictionaryEncode::shared("PartKey", parts))
                .then(Project::new(&[
                    "PartKey",
                    "MFGR",
                    "Brand",
                    "Size",
                    "Container",
                    "RetailPrice",
                ]))
                .then(OneHotEncode::new(&["MFGR", "Brand", "Container"])),
        ),
    ];

    let mut prepared = TableSet::new();
    for (role, recipe) in recipes {
        let table = raw
            .get(role)
            .ok_or_else(|| Error::InvalidConfig(format!("table '{role}' was not loaded")))?;
        let table = if role == "lineitem" {
            table.with_row_index("LineItemKey", 1)?
        } else {
            table.clone()
        };

        let table: Table = recipe.transform(&table)?;
        info!(
            table = role,
            rows = table.row_count(),
            columns = table.column_count(),
            steps = %recipe.describe(),
            "table prepared"
        );
        prepared.insert(role.to_string(), table);
    }
    Ok(prepared)
}

fn shared_dictionary() -> Arc<Mutex<KeyDictionary>> {
    Arc::new(Mutex::new(KeyDictionary::new()))
}

/// `lineitem ⋈ orders ⋈ customer ⋈ supplier ⋈ part`
pub fn star_join() -> JoinSpec {
    JoinSpec::star(
        "lineitem",
        &[
            ("orders", "OrderKey"),
            ("customer", "CustomerKey"),
            ("supplier", "SuppKey"),
            ("part", "PartKey"),
        ],
    )
}

/// `lineitem ⋈ lineitem (PartKey) ⋈ part ⋈ supplier (SuppKey_x) ⋈ supplier (SuppKey_y)`
///
/// The second supplier step uses its own suffixes, since `_x` names are
/// already taken by the first line item copy.
pub fn self_join() -> JoinSpec {
    JoinSpec::self_join("lineitem", "PartKey", SuffixPolicy::default())
        .join("part", JoinKeys::on("PartKey"))
        .join("supplier", JoinKeys::between("SuppKey_x", "SuppKey"))
        .join_with_suffixes(
            "supplier",
            JoinKeys::between("SuppKey_y", "SuppKey"),
            SuffixPolicy::new("_1", "_2"),
        )
}

/// The four inference workloads for each topology
///
/// Parameter tensors are sized from the joined width and drawn uniformly
/// from `[0, 1)`.
pub fn cases(tables: &TableSet, config: &TpchConfig, seed: u64) -> Result<Vec<WorkloadCase>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let hidden = config.hidden_width;
    let mut cases = Vec::new();

    for spec in [star_join(), self_join()] {
        let label = spec.topology.to_string();
        let pipeline = FeaturePipeline::new(tables.clone(), spec, config.representation);
        let width = pipeline.width()?;
        info!(topology = %label, width, end_to_end = config.end_to_end, "feature pipeline ready");

        let operands: Operands = if config.end_to_end {
            pipeline.into()
        } else {
            pipeline.materialize()?.into()
        };
        let fixed = || OperandSource::Fixed(operands.clone());

        cases.push(WorkloadCase::new(
            &format!("Linear Regression ({label})"),
            Workload::linear_regression(uniform_matrix(width, 1, &mut rng)),
            fixed(),
        ));
        cases.push(WorkloadCase::new(
            &format!("Logistic Regression ({label})"),
            Workload::logistic_regression(uniform_matrix(width, 1, &mut rng)),
            fixed(),
        ));
        cases.push(WorkloadCase::new(
            &format!("Covariance ({label})"),
            Workload::Covariance,
            fixed(),
        ));
        cases.push(WorkloadCase::new(
            &format!("Neural Network ({label})"),
            Workload::neural_net_forward(
                uniform_matrix(width, hidden, &mut rng),
                uniform_matrix(hidden, hidden, &mut rng),
                uniform_matrix(hidden, 1, &mut rng),
            ),
            fixed(),
        ));
    }
    Ok(cases)
}
