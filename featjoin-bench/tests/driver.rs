use std::fs;
use std::path::Path;

use featjoin_bench::{run_matrix_chain, run_tpch, write_report, BenchConfig, Error};
use featjoin_core::BackendKind;
use tempfile::tempdir;

fn write_tbl(dir: &Path, name: &str, rows: &[&str]) {
    let mut text = rows.join("|\n");
    text.push_str("|\n");
    fs::write(dir.join(format!("{name}.tbl")), text).unwrap();
}

/// A tiny TPC-H instance: 4 line items, 2 orders, 2 customers, 2 suppliers, 2 parts
fn write_tpch(dir: &Path) {
    write_tbl(
        dir,
        "lineitem",
        &[
            "1|10|1|1|17|21168.23|0.04|0.02|N|O|1996-03-13|1996-02-12|1996-03-22|DELIVER IN PERSON|TRUCK|egular courts",
            "1|20|2|2|36|45983.16|0.09|0.06|N|O|1996-04-12|1996-02-28|1996-04-20|TAKE BACK RETURN|MAIL|ly final",
            "2|10|2|1|38|44694.46|0.00|0.05|N|O|1997-01-28|1997-01-14|1997-02-02|TAKE BACK RETURN|RAIL|ven requests",
            "2|20|1|2|45|54058.05|0.06|0.00|R|F|1994-02-02|1994-01-04|1994-02-23|NONE|AIR|ongside",
        ],
    );
    write_tbl(
        dir,
        "orders",
        &[
            "1|100|O|173665.47|1996-01-02|5-LOW|Clerk#000000951|0|nstructions sleep",
            "2|200|F|46929.18|1996-12-01|1-URGENT|Clerk#000000880|0|foxes",
        ],
    );
    write_tbl(
        dir,
        "customer",
        &[
            "100|Customer#100|IVhzIApeRb|15|25-989-741-2988|711.56|BUILDING|to the even",
            "200|Customer#200|XSTf4,NCwDVaW|13|23-768-687-3665|121.65|AUTOMOBILE|l accounts",
        ],
    );
    write_tbl(
        dir,
        "supplier",
        &[
            "1|Supplier#1|N kD4on9OM|17|27-918-335-1736|5755.94|each slyly",
            "2|Supplier#2|89eJ5ksX3Imx|5|15-679-861-2259|4032.68|slyly bold",
        ],
    );
    write_tbl(
        dir,
        "part",
        &[
            "10|goldenrod lavender|Manufacturer#1|Brand#13|PROMO BURNISHED COPPER|7|JUMBO PKG|901.00|ly. slyly ironi",
            "20|blush thistle|Manufacturer#1|Brand#13|LARGE BRUSHED BRASS|1|LG CASE|902.00|lar accounts",
        ],
    );
}

fn small_config(dir: &Path) -> BenchConfig {
    let mut config = BenchConfig {
        backends: vec![BackendKind::Native, BackendKind::Ndarray],
        threads: vec![1],
        ..BenchConfig::default()
    };
    config.tpch.data_dir = dir.to_path_buf();
    config.tpch.repetitions = 2;
    config.tpch.warmup = 1;
    config.matrix_chain.size = 24;
    config.matrix_chain.dense_width_divisor = 4;
    config.matrix_chain.densities = vec![0.1, 0.01];
    config.matrix_chain.repetitions = 2;
    config.matrix_chain.warmup = 1;
    config
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let config = BenchConfig::load(dir.path().join("absent.json")).unwrap();
    assert_eq!(config, BenchConfig::default());
}

#[test]
fn malformed_config_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.json");
    fs::write(&path, "{ \"threads\": [1, ").unwrap();
    assert!(matches!(BenchConfig::load(&path), Err(Error::ConfigParse { .. })));
}

#[test]
fn config_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.json");
    fs::write(&path, r#"{"threads": [3], "seed": 9, "tpch": {"hidden_width": 4}}"#).unwrap();

    let config = BenchConfig::load(&path).unwrap();
    assert_eq!(config.threads, vec![3]);
    assert_eq!(config.seed, 9);
    assert_eq!(config.tpch.hidden_width, 4);
    assert_eq!(config.tpch.repetitions, 4);
}

#[test]
fn tpch_sweep_measures_every_workload() {
    let dir = tempdir().unwrap();
    write_tpch(dir.path());
    let config = small_config(dir.path());
    config.validate().unwrap();

    let outcome = run_tpch(&config).unwrap();
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.results.len(), 2 * 8);
    assert_eq!(outcome.results[0].method, "Native (1 Core)");
    assert_eq!(outcome.results[0].algorithm, "Linear Regression (SQ)");
    assert!(outcome.results.iter().all(|r| r.parameter.is_none() && r.mean_seconds >= 0.0));

    let report = dir.path().join("out").join("tpch.csv");
    assert_eq!(write_report(&report, &outcome.results).unwrap(), 16);
    let text = fs::read_to_string(&report).unwrap();
    let expected = "Method,Algorithm,Sparsity,Runtime\nNative (1 Core),Linear Regression (SQ),,";
    assert!(text.starts_with(expected));
}

#[test]
fn tpch_sweep_reports_missing_tables() {
    let dir = tempdir().unwrap();
    let config = small_config(dir.path());
    assert!(matches!(run_tpch(&config), Err(Error::Readers(_))));
}

#[test]
fn matrix_chain_sweep_carries_densities() {
    let dir = tempdir().unwrap();
    let config = small_config(dir.path());

    let outcome = run_matrix_chain(&config).unwrap();
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.results.len(), 2 * 2 * 5);
    assert_eq!(outcome.results[0].parameter, Some(0.1));
    assert_eq!(outcome.results[5].parameter, Some(0.01));
    assert_eq!(outcome.results[4].algorithm, "ABC Dense");
}

#[test]
fn shipped_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/bench.json");
    let config = BenchConfig::load(path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.matrix_chain.densities.len(), 5);
    assert_eq!(config.tpch.delimiter, '|');
}
