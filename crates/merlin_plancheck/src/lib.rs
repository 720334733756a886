//! Differential checking of the rule-based planner against the legacy
//! planner.
//!
//! Both planners compile the same statements against the same catalog.
//! This crate filters batch input down to the comparable subset, runs
//! both compilers, and reports every statement where the plan trees,
//! the routing decision, or the plan attributes disagree. Agreement is
//! silent: a clean run prints nothing and exits zero.

pub mod batch;
pub mod compiler;
pub mod differ;
pub mod error;
pub mod filter;
pub mod mp_check;
pub mod normalize;
pub mod phase_runner;
pub mod report;

#[cfg(test)]
mod tests;

pub use batch::{BatchDriver, BatchSummary, PlanChecker, StatementChecker, StatementOutcome};
pub use compiler::{CompiledPlanPair, DualPlanCompiler, SideOutcomes};
pub use differ::diff;
pub use error::CheckError;
pub use filter::is_eligible;
pub use mp_check::{classify_routing, MpConsistencyChecker, RoutingAgreement};
pub use normalize::{normalize_columns, strip_node_ids};
pub use phase_runner::PhaseRunner;
pub use report::MismatchReport;
