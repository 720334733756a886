//! Compiling one statement through both planners.
//!
//! The legacy side parses and binds through the shared frontend and
//! hands the bound statement to [`AlderPlanner`]; the rule-based side
//! runs its own phase chain from the raw text. Either side may refuse
//! a statement the other accepts, and with one exception that is not
//! worth reporting: a statement rejected everywhere cannot diverge.
//! The exception is the silent single-partition downgrade, where alder
//! refuses a statement as distributed-unsupported while merlin routes
//! the same statement single-partition. That asymmetry is exactly the
//! correctness class this harness exists to catch, so it is promoted
//! to a reported divergence instead of being dropped.

use alder_planner::{is_distributed_unsupported, AlderPlanner};
use merlin_common::error::{SqlError, SqlResult};
use merlin_common::schema::Catalog;
use merlin_plan::CompiledPlan;
use merlin_planner::MerlinSession;
use merlin_sql_frontend::Binder;
use tracing::debug;

use crate::error::CheckError;
use crate::filter;
use crate::report::MismatchReport;

/// Strip one trailing statement terminator.
pub fn strip_terminator(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').map(str::trim_end).unwrap_or(trimmed)
}

/// Both plans for one statement, ready to diff.
#[derive(Debug)]
pub struct CompiledPlanPair {
    pub statement: String,
    pub alder: CompiledPlan,
    pub merlin: CompiledPlan,
}

/// Raw per-side results, before deciding what a failure means.
#[derive(Debug)]
pub struct SideOutcomes {
    pub statement: String,
    pub alder: SqlResult<CompiledPlan>,
    pub merlin: SqlResult<CompiledPlan>,
}

impl SideOutcomes {
    /// The promoted asymmetry: alder rejected the statement as
    /// distributed-unsupported while merlin planned it
    /// single-partition.
    pub fn silent_downgrade(&self) -> Option<&SqlError> {
        match (&self.alder, &self.merlin) {
            (Err(err), Ok(plan))
                if is_distributed_unsupported(err) && !plan.is_multi_partition() =>
            {
                Some(err)
            }
            _ => None,
        }
    }

    /// Report form of the promoted asymmetry, `None` when absent.
    pub fn downgrade_report(&self) -> Option<MismatchReport> {
        self.silent_downgrade().map(|err| {
            let mut report = MismatchReport::new(&self.statement);
            report.append_detail(format!(
                "silent single-partition downgrade: alder rejected the statement ({}) while merlin planned it single-partition",
                err
            ));
            report
        })
    }

    /// Keep only statements both planners compiled.
    pub fn into_pair(self) -> Result<CompiledPlanPair, CheckError> {
        let SideOutcomes {
            statement,
            alder,
            merlin,
        } = self;
        let alder = alder.map_err(|source| CheckError::Compile {
            side: "alder",
            source,
        })?;
        let merlin = merlin.map_err(|source| CheckError::Compile {
            side: "merlin",
            source,
        })?;
        Ok(CompiledPlanPair {
            statement,
            alder,
            merlin,
        })
    }
}

/// Runs the filter and both planners over the same catalog.
pub struct DualPlanCompiler<'a> {
    catalog: &'a Catalog,
}

impl<'a> DualPlanCompiler<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        DualPlanCompiler { catalog }
    }

    /// Filter, then compile on both sides, reporting each side's raw
    /// result. `Err` covers only pre-compilation drops.
    pub fn compile_sides(&self, sql: &str) -> Result<SideOutcomes, CheckError> {
        let statement = strip_terminator(sql);
        let parsed = filter::check(statement)?;
        debug!(statement, "compiling on both sides");
        let alder = Binder::new(self.catalog)
            .bind(&parsed)
            .and_then(|bound| AlderPlanner::compile(&bound));
        let merlin = MerlinSession::new(self.catalog).compile(statement);
        Ok(SideOutcomes {
            statement: statement.to_string(),
            alder,
            merlin,
        })
    }

    /// Filter and compile, keeping only statements both sides accept.
    pub fn compile(&self, sql: &str) -> Result<CompiledPlanPair, CheckError> {
        self.compile_sides(sql)?.into_pair()
    }
}
