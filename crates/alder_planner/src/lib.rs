//! The legacy hand-written optimizer. Translates a bound SELECT into a
//! [`merlin_plan::CompiledPlan`] in a single pass, building the operator
//! tree in its final, inlined form.
//!
//! Anonymous output columns are named `C1`, `C2`, ... by one-based
//! select-list position.
//!
//! Distributed planning is conservative: a statement routes
//! single-partition only when every partitioned table it touches is
//! pinned by a `col = value` equality (that operand order) in the WHERE
//! clause. Multi-partition OFFSET and DISTINCT, and any join of two
//! partitioned tables, are rejected outright with the
//! [`DIST_UNSUPPORTED_PREFIX`] message class.

use merlin_common::error::SqlError;

pub mod planner;

pub use planner::AlderPlanner;

/// Message prefix of the distributed-unsupported rejection class.
/// Callers should match through [`is_distributed_unsupported`] rather
/// than this constant.
pub const DIST_UNSUPPORTED_PREFIX: &str = "not supported in distributed mode: ";

/// Whether an error is this planner's distributed-unsupported
/// rejection.
pub fn is_distributed_unsupported(err: &SqlError) -> bool {
    matches!(err, SqlError::Planning(msg) if msg.starts_with(DIST_UNSUPPORTED_PREFIX))
}
