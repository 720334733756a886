//! Command-line front ends for the differential plan checker.
//!
//! Two binaries share this crate. `plan-checker` compares the full
//! plan trees produced by the two planners, `mp-checker` compares only
//! their single-partition versus multi-partition routing verdicts.
//! Both load a schema DDL file once, then check either a single
//! statement (`-q`) or a batch file with one statement per line
//! (`-f`). Mismatch reports go to stderr; stdout stays empty. The exit
//! status carries the overall outcome: 0 when every compared statement
//! agreed, 1 when at least one divergence was found, 2 when the
//! invocation itself failed.

pub mod args;

use std::fs;
use std::io::{self, BufReader};

use anyhow::{bail, Context, Result};
use tracing::debug;

use merlin_common::schema::Catalog;
use merlin_plancheck::{
    BatchDriver, BatchSummary, MpConsistencyChecker, PlanChecker, StatementChecker,
};
use merlin_sql_frontend::load_schema;

pub use args::Args;

/// Selects which comparison the shared driver runs.
#[derive(Debug, Clone, Copy)]
pub enum CheckerMode {
    /// Full plan-tree and attribute comparison.
    Plan,
    /// Partition-routing agreement only.
    Routing,
}

/// Installs the stderr log subscriber, honoring `RUST_LOG` when set.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the schema and checks the requested input, returning the
/// batch counters. Usage and I/O problems surface as errors; plan
/// divergences only show up in the summary.
pub fn run(mode: CheckerMode, args: &Args) -> Result<BatchSummary> {
    let ddl = fs::read_to_string(&args.ddl)
        .with_context(|| format!("cannot read DDL file {}", args.ddl))?;
    let mut catalog = Catalog::new();
    load_schema(&mut catalog, &ddl)
        .with_context(|| format!("cannot load schema from {}", args.ddl))?;
    debug!("Schema loaded from {}", args.ddl);

    match mode {
        CheckerMode::Plan => drive(PlanChecker::new(&catalog), args),
        CheckerMode::Routing => drive(MpConsistencyChecker::new(&catalog), args),
    }
}

fn drive<C: StatementChecker>(checker: C, args: &Args) -> Result<BatchSummary> {
    let driver = BatchDriver::new(checker);
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match (&args.query, &args.file) {
        (Some(query), _) => {
            debug!("Mode: -q single statement");
            Ok(driver.run_statement(query, &mut out)?)
        }
        (None, Some(path)) => {
            debug!("Mode: -f {}", path);
            let file = fs::File::open(path)
                .with_context(|| format!("cannot open statement file {}", path))?;
            Ok(driver.run_lines(BufReader::new(file), &mut out)?)
        }
        (None, None) => bail!("nothing to check: pass -q <sql> or -f <path>"),
    }
}
