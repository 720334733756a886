#[cfg(test)]
mod binder_tests {
    use crate::binder::Binder;
    use crate::ddl::load_schema;
    use crate::parser::parse_one;
    use crate::types::*;
    use merlin_common::error::SqlError;
    use merlin_common::schema::Catalog;

    /// Catalog with a replicated table, a partitioned table, and a
    /// second partitioned table for join tests.
    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        load_schema(
            &mut catalog,
            "CREATE TABLE regions (id INTEGER NOT NULL, name VARCHAR(32));\n\
             CREATE TABLE orders (id BIGINT NOT NULL, region_id INTEGER, total FLOAT);\n\
             PARTITION TABLE orders ON COLUMN id;\n\
             CREATE TABLE lines (order_id BIGINT NOT NULL, qty INTEGER);\n\
             PARTITION TABLE lines ON COLUMN order_id;",
        )
        .unwrap();
        catalog
    }

    fn bind_sql(sql: &str) -> Result<BoundStatement, SqlError> {
        let catalog = test_catalog();
        let mut binder = Binder::new(&catalog);
        let stmt = parse_one(sql)?;
        binder.bind(&stmt)
    }

    fn bind_select(sql: &str) -> BoundSelect {
        match bind_sql(sql).unwrap() {
            BoundStatement::Select(select) => select,
        }
    }

    // ---- basic shape ----

    #[test]
    fn test_bind_simple_select() {
        let select = bind_select("SELECT name FROM regions WHERE id = 3");
        assert_eq!(select.base.name, "regions");
        assert_eq!(select.projections.len(), 1);
        match &select.projections[0] {
            BoundProjection::Expr { expr, alias } => {
                assert_eq!(*expr, BoundExpr::ColumnRef(1));
                assert_eq!(alias.as_deref(), Some("name"));
            }
            other => panic!("Expected column projection, got {:?}", other),
        }
        assert!(select.filter.is_some());
        assert!(!select.distinct);
    }

    #[test]
    fn test_bind_wildcard() {
        let select = bind_select("SELECT * FROM orders");
        assert_eq!(select.projections.len(), 3);
        assert_eq!(select.projections[2].alias(), Some("total"));
    }

    #[test]
    fn test_bind_computed_column_is_anonymous() {
        let select = bind_select("SELECT total + 1 FROM orders");
        match &select.projections[0] {
            BoundProjection::Expr { alias, .. } => assert!(alias.is_none()),
            other => panic!("Expected expr projection, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_explicit_alias() {
        let select = bind_select("SELECT total + 1 AS t FROM orders");
        assert_eq!(select.projections[0].alias(), Some("t"));
    }

    // ---- joins ----

    #[test]
    fn test_bind_join_offsets() {
        let select =
            bind_select("SELECT o.total, l.qty FROM orders o JOIN lines l ON o.id = l.order_id");
        assert_eq!(select.joins.len(), 1);
        let join = &select.joins[0];
        assert_eq!(join.join_type, JoinType::Inner);
        assert_eq!(join.col_offset, 3);
        // o.total is combined ordinal 2, l.qty is 3 + 1 = 4
        match &select.projections[0] {
            BoundProjection::Expr { expr, .. } => assert_eq!(*expr, BoundExpr::ColumnRef(2)),
            other => panic!("Expected column, got {:?}", other),
        }
        match &select.projections[1] {
            BoundProjection::Expr { expr, .. } => assert_eq!(*expr, BoundExpr::ColumnRef(4)),
            other => panic!("Expected column, got {:?}", other),
        }
        // ON condition references both sides
        match join.condition.as_ref().unwrap() {
            BoundExpr::BinaryOp { left, op, right } => {
                assert_eq!(*op, BinOp::Eq);
                assert_eq!(**left, BoundExpr::ColumnRef(0));
                assert_eq!(**right, BoundExpr::ColumnRef(3));
            }
            other => panic!("Expected equality, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_left_join() {
        let select = bind_select(
            "SELECT r.name FROM regions r LEFT JOIN orders o ON r.id = o.region_id",
        );
        assert_eq!(select.joins[0].join_type, JoinType::Left);
    }

    #[test]
    fn test_right_join_rejected() {
        let err = bind_sql("SELECT 1 FROM regions r RIGHT JOIN orders o ON r.id = o.region_id")
            .unwrap_err();
        assert!(err.message().contains("RIGHT JOIN"));
    }

    // ---- parameters ----

    #[test]
    fn test_parameter_numbering_follows_clause_order() {
        let select = bind_select(
            "SELECT total + ? FROM orders o JOIN lines l ON o.id = ? \
             WHERE total > ? LIMIT ? OFFSET ?",
        );
        match &select.projections[0] {
            BoundProjection::Expr { expr, .. } => match expr {
                BoundExpr::BinaryOp { right, .. } => {
                    assert_eq!(**right, BoundExpr::Parameter(0))
                }
                other => panic!("Expected binary op, got {:?}", other),
            },
            other => panic!("Expected expr projection, got {:?}", other),
        }
        match select.joins[0].condition.as_ref().unwrap() {
            BoundExpr::BinaryOp { right, .. } => assert_eq!(**right, BoundExpr::Parameter(1)),
            other => panic!("Expected binary op, got {:?}", other),
        }
        match select.filter.as_ref().unwrap() {
            BoundExpr::BinaryOp { right, .. } => assert_eq!(**right, BoundExpr::Parameter(2)),
            other => panic!("Expected binary op, got {:?}", other),
        }
        assert_eq!(select.limit, Some(LimitValue::Parameter(3)));
        assert_eq!(select.offset, Some(LimitValue::Parameter(4)));
    }

    #[test]
    fn test_between_expands_to_range() {
        let select = bind_select("SELECT id FROM orders WHERE total BETWEEN 1 AND ?");
        match select.filter.as_ref().unwrap() {
            BoundExpr::BinaryOp { left, op, right } => {
                assert_eq!(*op, BinOp::And);
                match left.as_ref() {
                    BoundExpr::BinaryOp { op, .. } => assert_eq!(*op, BinOp::GtEq),
                    other => panic!("Expected lower bound, got {:?}", other),
                }
                match right.as_ref() {
                    BoundExpr::BinaryOp { op, right, .. } => {
                        assert_eq!(*op, BinOp::LtEq);
                        assert_eq!(**right, BoundExpr::Parameter(0));
                    }
                    other => panic!("Expected upper bound, got {:?}", other),
                }
            }
            other => panic!("Expected AND, got {:?}", other),
        }
    }

    // ---- aggregation ----

    #[test]
    fn test_bind_aggregate() {
        let select = bind_select("SELECT region_id, COUNT(*), SUM(total) FROM orders GROUP BY region_id");
        assert!(select.is_aggregating());
        assert_eq!(select.group_by, vec![1]);
        match &select.projections[1] {
            BoundProjection::Aggregate { func, arg, alias } => {
                assert_eq!(*func, AggFunc::Count);
                assert!(arg.is_none());
                assert!(alias.is_none());
            }
            other => panic!("Expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_ungrouped_column_rejected() {
        let err = bind_sql("SELECT total, COUNT(*) FROM orders GROUP BY region_id").unwrap_err();
        assert!(err.message().contains("GROUP BY"));
    }

    #[test]
    fn test_group_by_ordinal() {
        let select = bind_select("SELECT region_id, COUNT(*) FROM orders GROUP BY 1");
        assert_eq!(select.group_by, vec![1]);
    }

    #[test]
    fn test_sum_requires_argument() {
        let err = bind_sql("SELECT SUM(*) FROM orders").unwrap_err();
        assert!(err.message().contains("requires an argument"));
    }

    // ---- order by / limit ----

    #[test]
    fn test_order_by_plain_select_uses_scan_ordinals() {
        let select = bind_select("SELECT name FROM regions ORDER BY id DESC");
        assert_eq!(
            select.order_by,
            vec![BoundOrderBy {
                column: 0,
                asc: false
            }]
        );
    }

    #[test]
    fn test_order_by_aggregate_uses_output_positions() {
        let select = bind_select(
            "SELECT region_id, COUNT(*) AS n FROM orders GROUP BY region_id ORDER BY n",
        );
        assert_eq!(
            select.order_by,
            vec![BoundOrderBy {
                column: 1,
                asc: true
            }]
        );
    }

    #[test]
    fn test_order_by_ordinal() {
        let select = bind_select("SELECT name, id FROM regions ORDER BY 2");
        assert_eq!(select.order_by[0].column, 0);
    }

    #[test]
    fn test_limit_literal() {
        let select = bind_select("SELECT id FROM orders LIMIT 10 OFFSET 2");
        assert_eq!(select.limit, Some(LimitValue::Count(10)));
        assert_eq!(select.offset, Some(LimitValue::Count(2)));
    }

    // ---- rejections ----

    #[test]
    fn test_having_rejected() {
        let err = bind_sql("SELECT region_id FROM orders GROUP BY region_id HAVING COUNT(*) > 1")
            .unwrap_err();
        assert!(err.message().contains("HAVING"));
    }

    #[test]
    fn test_subquery_rejected() {
        let err = bind_sql("SELECT id FROM orders WHERE id IN (SELECT id FROM regions)")
            .unwrap_err();
        assert!(err.message().contains("IN"));
    }

    #[test]
    fn test_set_operation_rejected() {
        let err = bind_sql("SELECT id FROM orders UNION SELECT id FROM regions").unwrap_err();
        assert!(err.message().contains("set operations"));
    }

    #[test]
    fn test_comma_join_rejected() {
        let err = bind_sql("SELECT 1 FROM orders, regions").unwrap_err();
        assert!(err.message().contains("comma join"));
    }

    #[test]
    fn test_unknown_column() {
        let err = bind_sql("SELECT missing FROM orders").unwrap_err();
        assert!(err.message().contains("unknown column"));
    }

    #[test]
    fn test_ambiguous_column() {
        let err =
            bind_sql("SELECT id FROM orders o JOIN regions r ON o.region_id = r.id").unwrap_err();
        assert!(err.message().contains("ambiguous"));
    }

    #[test]
    fn test_unknown_table() {
        let err = bind_sql("SELECT 1 FROM nope").unwrap_err();
        assert!(err.message().contains("unknown table"));
    }

    #[test]
    fn test_non_select_rejected() {
        let err = bind_sql("INSERT INTO orders VALUES (1, 2, 3.0)").unwrap_err();
        assert!(err.message().contains("only SELECT"));
    }
}
