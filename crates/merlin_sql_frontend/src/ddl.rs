use merlin_common::error::{SqlError, SqlResult};
use merlin_common::schema::{Catalog, ColumnDef, TableSchema};
use merlin_common::split::split_statements;
use merlin_common::types::{ColumnId, DataType};
use sqlparser::ast::{self, Statement};

use crate::parser::{parse_one, parse_partition_directive};

/// Load a DDL script into the catalog. Accepts CREATE TABLE statements
/// and `PARTITION TABLE ... ON COLUMN ...` declarations. CREATE INDEX
/// is skipped since indexes are not modeled; anything else is an error.
pub fn load_schema(catalog: &mut Catalog, ddl: &str) -> SqlResult<()> {
    for stmt_text in split_statements(ddl) {
        if let Some(directive) = parse_partition_directive(&stmt_text)? {
            catalog.set_partitioning(&directive.table, &directive.column)?;
            continue;
        }
        let stmt = parse_one(&stmt_text)?;
        match stmt {
            Statement::CreateTable(create) => {
                let schema = build_table_schema(catalog, &create)?;
                catalog.add_table(schema)?;
            }
            Statement::CreateIndex(_) => {}
            other => {
                return Err(SqlError::catalog(format!(
                    "unsupported statement in schema: {}",
                    other
                )));
            }
        }
    }
    Ok(())
}

fn build_table_schema(
    catalog: &mut Catalog,
    create: &ast::CreateTable,
) -> SqlResult<TableSchema> {
    let id = catalog.next_table_id();
    let mut schema = TableSchema::new(id, create.name.to_string());
    for (i, col) in create.columns.iter().enumerate() {
        let data_type = resolve_data_type(&col.data_type)?;
        let mut nullable = true;
        for option in &col.options {
            match &option.option {
                ast::ColumnOption::NotNull => nullable = false,
                ast::ColumnOption::Unique { is_primary, .. } if *is_primary => nullable = false,
                _ => {}
            }
        }
        schema.columns.push(ColumnDef {
            id: ColumnId(i as u32),
            name: col.name.value.clone(),
            data_type,
            nullable,
        });
    }
    Ok(schema)
}

fn resolve_data_type(dt: &ast::DataType) -> SqlResult<DataType> {
    match dt {
        ast::DataType::Boolean | ast::DataType::Bool => Ok(DataType::Boolean),
        ast::DataType::TinyInt(_)
        | ast::DataType::SmallInt(_)
        | ast::DataType::Int(_)
        | ast::DataType::Integer(_)
        | ast::DataType::Int2(_)
        | ast::DataType::Int4(_) => Ok(DataType::Integer),
        ast::DataType::BigInt(_) | ast::DataType::Int8(_) => Ok(DataType::BigInt),
        ast::DataType::Float(_)
        | ast::DataType::Float4
        | ast::DataType::Float8
        | ast::DataType::Real
        | ast::DataType::Double
        | ast::DataType::DoublePrecision
        | ast::DataType::Numeric(_)
        | ast::DataType::Decimal(_) => Ok(DataType::Float),
        ast::DataType::Varchar(_)
        | ast::DataType::CharVarying(_)
        | ast::DataType::Char(_)
        | ast::DataType::Character(_)
        | ast::DataType::Text
        | ast::DataType::String(_) => Ok(DataType::Varchar),
        ast::DataType::Timestamp(_, _) => Ok(DataType::Timestamp),
        other => Err(SqlError::catalog(format!(
            "unsupported column type: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_basic_schema() {
        let mut catalog = Catalog::new();
        load_schema(
            &mut catalog,
            "CREATE TABLE orders (id BIGINT NOT NULL, customer_id INTEGER, total FLOAT);\n\
             CREATE TABLE regions (id INTEGER, name VARCHAR(32));",
        )
        .unwrap();
        assert_eq!(catalog.table_count(), 2);
        let orders = catalog.find_table("orders").unwrap();
        assert_eq!(orders.num_columns(), 3);
        assert!(!orders.columns[0].nullable);
        assert!(orders.columns[1].nullable);
        assert_eq!(orders.columns[2].data_type, DataType::Float);
    }

    #[test]
    fn test_load_schema_with_partitioning() {
        let mut catalog = Catalog::new();
        load_schema(
            &mut catalog,
            "CREATE TABLE votes (phone BIGINT NOT NULL, state VARCHAR(2));\n\
             PARTITION TABLE votes ON COLUMN phone;",
        )
        .unwrap();
        let votes = catalog.find_table("votes").unwrap();
        assert!(votes.is_partitioned());
        assert_eq!(votes.partition_column, Some(0));
    }

    #[test]
    fn test_partition_before_create_fails() {
        let mut catalog = Catalog::new();
        let err = load_schema(
            &mut catalog,
            "PARTITION TABLE missing ON COLUMN a;\nCREATE TABLE missing (a INT);",
        )
        .unwrap_err();
        assert!(err.message().contains("unknown table"));
    }

    #[test]
    fn test_create_index_skipped() {
        let mut catalog = Catalog::new();
        load_schema(
            &mut catalog,
            "CREATE TABLE t (a INT);\nCREATE INDEX idx_a ON t (a);",
        )
        .unwrap();
        assert_eq!(catalog.table_count(), 1);
    }

    #[test]
    fn test_non_ddl_rejected() {
        let mut catalog = Catalog::new();
        let err = load_schema(&mut catalog, "CREATE TABLE t (a INT);\nSELECT 1;").unwrap_err();
        assert!(err.message().contains("unsupported statement"));
    }

    #[test]
    fn test_primary_key_implies_not_null() {
        let mut catalog = Catalog::new();
        load_schema(&mut catalog, "CREATE TABLE t (a INT PRIMARY KEY, b INT);").unwrap();
        let t = catalog.find_table("t").unwrap();
        assert!(!t.columns[0].nullable);
        assert!(t.columns[1].nullable);
    }
}
