//! The replacement query optimizer. A statement moves through an
//! explicit phase chain: parse, validate against the catalog, convert
//! to a relational tree, rewrite it with rules, check partition
//! routing, convert to the physical operator vocabulary, and finally
//! inline helper nodes into their inputs.
//!
//! Anonymous output columns are named `EXPR$0`, `EXPR$1`, ... by
//! zero-based select-list position.
//!
//! Routing recognizes partition-column pinning in either operand
//! order, and accepts a join of two partitioned tables when their
//! partition columns are equi-joined in the ON clause. Statements it
//! cannot distribute are rejected with the [`MP_UNSUPPORTED_PREFIX`]
//! message class.

use merlin_common::error::SqlError;

pub mod logical_plan;
pub mod optimizer;
pub mod phase;
pub mod physical;
pub mod planner;
pub mod routing;

pub use logical_plan::LogicalPlan;
pub use optimizer::OptimizerConfig;
pub use phase::{PipelineState, PlannerPhase};
pub use planner::MerlinSession;
pub use routing::RoutingDecision;

/// Message prefix of the multi-partition rejection class. Callers
/// should match through [`is_mp_unsupported`] rather than this
/// constant.
pub const MP_UNSUPPORTED_PREFIX: &str = "unsupported multi-partition query: ";

/// Whether an error is this planner's multi-partition rejection.
pub fn is_mp_unsupported(err: &SqlError) -> bool {
    matches!(err, SqlError::Planning(msg) if msg.starts_with(MP_UNSUPPORTED_PREFIX))
}
