//! Command line entry point for the featjoin sweeps

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use featjoin_bench::{log_failures, run_matrix_chain, run_tpch, write_report, BenchConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "featjoin-bench", version, about = "Join-then-algebra benchmark sweeps")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inference workloads over joined TPC-H tables
    Tpch,

    /// Matrix-chain products across sparsity levels
    MatrixChain,
}

#[derive(Args, Debug)]
struct Overrides {
    /// JSON sweep description; defaults are used when it does not exist
    #[arg(long, global = true, default_value = "configs/bench.json")]
    config: PathBuf,

    /// Directory holding the TPC-H `.tbl` files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Report file
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Parallelism degree to sweep; repeat for several
    #[arg(long = "threads", global = true)]
    threads: Vec<usize>,

    /// Runs per workload
    #[arg(long, global = true)]
    repetitions: Option<usize>,

    /// Leading runs discarded
    #[arg(long, global = true)]
    warmup: Option<usize>,

    /// Seed for generated operands and parameters
    #[arg(long, global = true)]
    seed: Option<u64>,
}

impl Overrides {
    fn apply(&self, command: &Command, config: &mut BenchConfig) {
        if let Some(dir) = &self.data_dir {
            config.tpch.data_dir.clone_from(dir);
        }
        if !self.threads.is_empty() {
            config.threads.clone_from(&self.threads);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        let (output, repetitions, warmup) = match command {
            Command::Tpch => (
                &mut config.tpch.output,
                &mut config.tpch.repetitions,
                &mut config.tpch.warmup,
            ),
            Command::MatrixChain => (
                &mut config.matrix_chain.output,
                &mut config.matrix_chain.repetitions,
                &mut config.matrix_chain.warmup,
            ),
        };
        if let Some(path) = &self.output {
            output.clone_from(path);
        }
        if let Some(n) = self.repetitions {
            *repetitions = n;
        }
        if let Some(n) = self.warmup {
            *warmup = n;
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = BenchConfig::load(&cli.overrides.config)
        .with_context(|| format!("loading {}", cli.overrides.config.display()))?;
    cli.overrides.apply(&cli.command, &mut config);
    config.validate().context("invalid sweep description")?;

    let (outcome, output) = match cli.command {
        Command::Tpch => (
            run_tpch(&config).context("TPC-H sweep failed")?,
            &config.tpch.output,
        ),
        Command::MatrixChain => (
            run_matrix_chain(&config).context("matrix-chain sweep failed")?,
            &config.matrix_chain.output,
        ),
    };

    log_failures(&outcome);
    let rows = write_report(output, &outcome.results)
        .with_context(|| format!("writing report {}", output.display()))?;
    info!(
        rows,
        failures = outcome.failures.len(),
        path = %output.display(),
        "sweep finished"
    );
    Ok(())
}
