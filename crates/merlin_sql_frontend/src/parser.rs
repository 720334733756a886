use merlin_common::error::{SqlError, SqlResult};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Parse SQL text that must contain exactly one statement.
pub fn parse_one(sql: &str) -> SqlResult<Statement> {
    let dialect = GenericDialect {};
    let mut statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::parse(e.to_string()))?;
    match statements.len() {
        0 => Err(SqlError::parse("empty statement")),
        1 => Ok(statements.remove(0)),
        n => Err(SqlError::parse(format!(
            "expected a single statement, found {}",
            n
        ))),
    }
}

/// Coarse statement classification used for batch eligibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Dml,
    Ddl,
    Utility,
}

pub fn classify(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::Query(_) => StatementKind::Query,
        Statement::Insert(_) | Statement::Update { .. } | Statement::Delete(_) => {
            StatementKind::Dml
        }
        Statement::CreateTable(_)
        | Statement::CreateIndex(_)
        | Statement::CreateView { .. }
        | Statement::AlterTable { .. }
        | Statement::Drop { .. }
        | Statement::Truncate { .. } => StatementKind::Ddl,
        _ => StatementKind::Utility,
    }
}

/// A `PARTITION TABLE <table> ON COLUMN <column>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDirective {
    pub table: String,
    pub column: String,
}

/// Recognize a partitioning declaration. Returns `Ok(None)` when the
/// statement is not one, and an error when it starts like one but is
/// malformed.
pub fn parse_partition_directive(sql: &str) -> SqlResult<Option<PartitionDirective>> {
    let tokens: Vec<&str> = sql.split_whitespace().collect();
    if tokens.first().map(|t| t.to_uppercase()) != Some("PARTITION".to_string()) {
        return Ok(None);
    }
    let keyword_at = |i: usize, want: &str| {
        tokens
            .get(i)
            .map(|t| t.to_uppercase() == want)
            .unwrap_or(false)
    };
    if tokens.len() != 6
        || !keyword_at(1, "TABLE")
        || !keyword_at(3, "ON")
        || !keyword_at(4, "COLUMN")
    {
        return Err(SqlError::parse(format!(
            "malformed partitioning declaration: {}",
            sql
        )));
    }
    Ok(Some(PartitionDirective {
        table: tokens[2].to_string(),
        column: tokens[5].to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_select() {
        let stmt = parse_one("SELECT a FROM t").unwrap();
        assert!(matches!(stmt, Statement::Query(_)));
    }

    #[test]
    fn test_parse_rejects_multiple() {
        match parse_one("SELECT 1; SELECT 2") {
            Err(e) => assert!(e.message().contains("single statement")),
            Ok(_) => panic!("Expected parse error"),
        }
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(parse_one("").is_err());
        assert!(parse_one("   ").is_err());
    }

    #[test]
    fn test_classify() {
        let q = parse_one("SELECT 1").unwrap();
        assert_eq!(classify(&q), StatementKind::Query);
        let i = parse_one("INSERT INTO t VALUES (1)").unwrap();
        assert_eq!(classify(&i), StatementKind::Dml);
        let c = parse_one("CREATE TABLE t (a INT)").unwrap();
        assert_eq!(classify(&c), StatementKind::Ddl);
        let u = parse_one("UPDATE t SET a = 1").unwrap();
        assert_eq!(classify(&u), StatementKind::Dml);
    }

    #[test]
    fn test_partition_directive() {
        let d = parse_partition_directive("PARTITION TABLE orders ON COLUMN customer_id")
            .unwrap()
            .unwrap();
        assert_eq!(d.table, "orders");
        assert_eq!(d.column, "customer_id");
    }

    #[test]
    fn test_partition_directive_case_insensitive() {
        let d = parse_partition_directive("partition table T on column C")
            .unwrap()
            .unwrap();
        assert_eq!(d.table, "T");
        assert_eq!(d.column, "C");
    }

    #[test]
    fn test_partition_directive_not_one() {
        assert_eq!(
            parse_partition_directive("SELECT 1").unwrap(),
            None
        );
    }

    #[test]
    fn test_partition_directive_malformed() {
        assert!(parse_partition_directive("PARTITION TABLE t").is_err());
        assert!(parse_partition_directive("PARTITION TABLE t BY COLUMN c").is_err());
    }
}
