use merlin_common::error::SqlError;
use merlin_plan::PlanAttributes;
use thiserror::Error;

/// Everything that can go wrong while checking one statement.
///
/// The first three variants describe statements that never reach a
/// comparison; batch runs drop them silently. The mismatch variants
/// carry the text that goes into a [`crate::MismatchReport`]. The last
/// two only arise from [`crate::PhaseRunner`] assertions and are always
/// fatal to the calling test.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The statement is not valid SQL under the shared frontend.
    #[error("statement does not parse: {0}")]
    Parse(SqlError),

    /// DDL, DML, or anything else outside the comparison allow-list.
    #[error("statement is outside the comparison allow-list")]
    FilterRejection,

    /// One planner refused a statement the filter let through.
    #[error("{side} failed to compile: {source}")]
    Compile { side: &'static str, source: SqlError },

    /// Rendered plan trees differ after column-name normalization.
    #[error("plan trees differ\nExpected:\n{expected}\nActual:\n{actual}")]
    TreeMismatch { expected: String, actual: String },

    /// Exactly one side split the plan into coordinator and fragment.
    #[error("two-part plan mismatch: alder produced a {alder} plan, merlin produced a {merlin} plan")]
    TwoPartMismatch {
        alder: &'static str,
        merlin: &'static str,
    },

    /// The whole-plan attributes disagree even if the trees match.
    #[error("plan attributes differ: alder {alder:?}, merlin {merlin:?}")]
    AttributeMismatch {
        alder: PlanAttributes,
        merlin: PlanAttributes,
    },

    /// A phase raised where the runner declared no failure.
    #[error("unexpected failure in phase {phase}: {source}")]
    UnexpectedException { phase: &'static str, source: SqlError },

    /// The declared failure did not happen, or happened with the wrong
    /// kind or message.
    #[error("{0}")]
    ExpectedExceptionMismatch(String),
}
