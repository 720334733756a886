//! Eligibility gate for batch inputs.
//!
//! Batch files mix schema DDL, partitioning declarations, and worse
//! with the queries worth comparing. Only plain SELECT statements go
//! through to the planners; everything else is dropped without a word
//! so that mixed batches run clean.

use merlin_sql_frontend::{classify, parse_one, StatementKind};
use sqlparser::ast::Statement;
use tracing::trace;

use crate::error::CheckError;

/// Run the gate, keeping the parsed statement for the caller.
///
/// Rejects statements that do not parse under the shared frontend,
/// DDL of any kind, and statements outside the SELECT allow-list.
pub fn check(sql: &str) -> Result<Statement, CheckError> {
    let stmt = match parse_one(sql) {
        Ok(stmt) => stmt,
        Err(err) => {
            trace!(%err, "dropping unparseable statement");
            return Err(CheckError::Parse(err));
        }
    };
    match classify(&stmt) {
        StatementKind::Query => Ok(stmt),
        kind => {
            trace!(?kind, "dropping statement outside the allow-list");
            Err(CheckError::FilterRejection)
        }
    }
}

/// Whether a statement should be planned by both sides and compared.
/// Rejection is always silent; callers skip the statement.
pub fn is_eligible(sql: &str) -> bool {
    check(sql).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_eligible() {
        assert!(is_eligible("SELECT a FROM t"));
        assert!(is_eligible("select a from t where a > ?"));
    }

    #[test]
    fn test_ddl_is_rejected() {
        assert!(!is_eligible("CREATE TABLE T (a INT)"));
        assert!(!is_eligible("DROP TABLE t"));
        assert!(!is_eligible("CREATE INDEX i ON t (a)"));
    }

    #[test]
    fn test_dml_is_rejected() {
        assert!(!is_eligible("INSERT INTO t VALUES (1)"));
        assert!(!is_eligible("UPDATE t SET a = 1"));
        assert!(!is_eligible("DELETE FROM t"));
    }

    #[test]
    fn test_unparseable_is_rejected() {
        assert!(!is_eligible(""));
        assert!(!is_eligible("SELEC a FRM t"));
        assert!(!is_eligible("PARTITION TABLE t ON COLUMN a"));
    }

    #[test]
    fn test_check_distinguishes_rejection_kinds() {
        assert!(matches!(check("SELEC a"), Err(CheckError::Parse(_))));
        assert!(matches!(
            check("CREATE TABLE T (a INT)"),
            Err(CheckError::FilterRejection)
        ));
    }
}
