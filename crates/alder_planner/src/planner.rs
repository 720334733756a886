//! Single-pass translation from a bound SELECT to its final operator
//! tree. There is no separate rewrite stage: filters land on the scan
//! or join node that owns them, projections are inlined where the row
//! shape allows, and distributed fragments are cut while building.

use std::collections::BTreeSet;

use merlin_common::error::{SqlError, SqlResult};
use merlin_plan::{
    AggExpr, AggPhase, CompiledPlan, LimitClause, OutputColumn, PlanAttributes, PlanNode, SortKey,
};
use merlin_sql_frontend::analysis;
use merlin_sql_frontend::{
    BinOp, BoundExpr, BoundProjection, BoundSelect, BoundStatement, JoinType,
};

use crate::DIST_UNSUPPORTED_PREFIX;

fn dist_unsupported(what: &str) -> SqlError {
    SqlError::planning(format!("{}{}", DIST_UNSUPPORTED_PREFIX, what))
}

/// Where a WHERE conjunct ends up in the scan/join tree.
enum Placement {
    /// On the scan of table `t` (0 = base table), in local ordinals.
    Scan(usize),
    /// On join node `i`, in combined ordinals.
    Join(usize),
}

/// The legacy planner. Stateless; everything it needs about the
/// catalog travels inside the bound statement.
pub struct AlderPlanner;

impl AlderPlanner {
    pub fn compile(stmt: &BoundStatement) -> SqlResult<CompiledPlan> {
        match stmt {
            BoundStatement::Select(sel) => Self::compile_select(sel),
        }
    }

    fn compile_select(sel: &BoundSelect) -> SqlResult<CompiledPlan> {
        let partitioned = Self::partition_ordinals(sel);
        if partitioned.len() > 1 {
            return Err(dist_unsupported("join of two partitioned tables"));
        }
        let single_partition = match partitioned.first() {
            None => true,
            Some(&ordinal) => Self::pins_partition_column(sel.filter.as_ref(), ordinal),
        };
        let attributes = PlanAttributes {
            read_only: true,
            order_deterministic: Self::order_deterministic(sel),
        };
        if single_partition {
            return Ok(CompiledPlan::single_partition(
                Self::build_local(sel),
                attributes,
            ));
        }
        if sel.offset.is_some() {
            return Err(dist_unsupported("OFFSET in a multi-partition query"));
        }
        if sel.distinct {
            return Err(dist_unsupported("DISTINCT in a multi-partition query"));
        }
        let (root, subplan) = Self::build_distributed(sel);
        Ok(CompiledPlan::multi_partition(root, subplan, attributes))
    }

    /// Combined-row ordinals of the partition columns of every
    /// partitioned table the statement touches.
    fn partition_ordinals(sel: &BoundSelect) -> Vec<usize> {
        let mut out = Vec::new();
        if sel.base.is_partitioned() {
            if let Some(col) = sel.base.partition_column {
                out.push(col);
            }
        }
        for join in &sel.joins {
            if join.table.is_partitioned() {
                if let Some(col) = join.table.partition_column {
                    out.push(join.col_offset + col);
                }
            }
        }
        out
    }

    /// `col = value` with the column on the left is the only pinning
    /// shape this planner recognizes.
    fn pins_partition_column(filter: Option<&BoundExpr>, ordinal: usize) -> bool {
        let Some(filter) = filter else {
            return false;
        };
        analysis::split_conjuncts(filter).iter().any(|conjunct| {
            matches!(
                conjunct,
                BoundExpr::BinaryOp { left, op: BinOp::Eq, right }
                    if matches!(left.as_ref(), BoundExpr::ColumnRef(c) if *c == ordinal)
                        && matches!(
                            right.as_ref(),
                            BoundExpr::Literal(_) | BoundExpr::Parameter(_)
                        )
            )
        })
    }

    fn build_local(sel: &BoundSelect) -> PlanNode {
        let mut node = Self::build_scan_tree(sel);
        if sel.is_aggregating() {
            node = PlanNode::Aggregate {
                input: Box::new(node),
                phase: AggPhase::Single,
                group_by: sel.group_by.clone(),
                aggs: Self::agg_exprs(sel),
            };
            if sel.distinct {
                node = PlanNode::Distinct {
                    input: Box::new(node),
                };
            }
            if !sel.order_by.is_empty() {
                node = PlanNode::OrderBy {
                    input: Box::new(node),
                    keys: Self::sort_keys(sel),
                    limit: Self::limit_clause(sel),
                };
            } else if let Some(clause) = Self::limit_clause(sel) {
                node = PlanNode::Limit {
                    input: Box::new(node),
                    clause,
                };
            }
        } else {
            if sel.order_by.is_empty() {
                node = Self::attach_project(node, Self::output_columns(sel));
            } else {
                node = PlanNode::OrderBy {
                    input: Box::new(node),
                    keys: Self::sort_keys(sel),
                    limit: None,
                };
                node = PlanNode::Calc {
                    input: Box::new(node),
                    condition: None,
                    project: Some(Self::output_columns(sel)),
                };
            }
            if sel.distinct {
                node = PlanNode::Distinct {
                    input: Box::new(node),
                };
            }
            if let Some(clause) = Self::limit_clause(sel) {
                node = PlanNode::Limit {
                    input: Box::new(node),
                    clause,
                };
            }
        }
        node
    }

    /// Coordinator tree and per-partition fragment. OFFSET and
    /// DISTINCT were rejected before this point; the fragment keeps
    /// scans, local filters, projection, pre-sorting, and the partial
    /// half of any aggregation.
    fn build_distributed(sel: &BoundSelect) -> (PlanNode, PlanNode) {
        let scan = Self::build_scan_tree(sel);
        if sel.is_aggregating() {
            let aggs = Self::agg_exprs(sel);
            let subplan = PlanNode::Send {
                input: Box::new(PlanNode::Aggregate {
                    input: Box::new(scan),
                    phase: AggPhase::Partial,
                    group_by: sel.group_by.clone(),
                    aggs: aggs.clone(),
                }),
            };
            let mut root = PlanNode::Aggregate {
                input: Box::new(PlanNode::Receive),
                phase: AggPhase::Merge,
                group_by: sel.group_by.clone(),
                aggs,
            };
            if !sel.order_by.is_empty() {
                root = PlanNode::OrderBy {
                    input: Box::new(root),
                    keys: Self::sort_keys(sel),
                    limit: Self::limit_clause(sel),
                };
            } else if let Some(clause) = Self::limit_clause(sel) {
                root = PlanNode::Limit {
                    input: Box::new(root),
                    clause,
                };
            }
            return (root, subplan);
        }
        if sel.order_by.is_empty() {
            let fragment = Self::attach_project(scan, Self::output_columns(sel));
            let subplan = PlanNode::Send {
                input: Box::new(fragment),
            };
            let mut root = PlanNode::Receive;
            if let Some(clause) = Self::limit_clause(sel) {
                root = PlanNode::Limit {
                    input: Box::new(root),
                    clause,
                };
            }
            return (root, subplan);
        }
        let keys = Self::sort_keys(sel);
        let sorted = PlanNode::OrderBy {
            input: Box::new(scan),
            keys: keys.clone(),
            limit: None,
        };
        let fragment = PlanNode::Calc {
            input: Box::new(sorted),
            condition: None,
            project: Some(Self::output_columns(sel)),
        };
        let subplan = PlanNode::Send {
            input: Box::new(fragment),
        };
        let root = PlanNode::MergeReceive {
            keys,
            limit: Self::limit_clause(sel),
        };
        (root, subplan)
    }

    /// Scan/join tree with WHERE conjuncts placed on the lowest node
    /// that covers their column references. A conjunct confined to the
    /// null-supplying side of a LEFT join stays on the join node,
    /// unless a null-rejecting conjunct first turned that join INNER.
    fn build_scan_tree(sel: &BoundSelect) -> PlanNode {
        let conjuncts = match &sel.filter {
            Some(filter) => analysis::split_conjuncts(filter),
            None => Vec::new(),
        };
        let join_types = Self::effective_join_types(sel, &conjuncts);

        let mut scan_filters: Vec<Vec<BoundExpr>> = vec![Vec::new(); sel.joins.len() + 1];
        let mut join_filters: Vec<Vec<BoundExpr>> = vec![Vec::new(); sel.joins.len()];
        for conjunct in conjuncts {
            match Self::placement(sel, &join_types, &conjunct) {
                Placement::Scan(t) => {
                    let local = Self::scan_local(sel, t, &conjunct);
                    scan_filters[t].push(local);
                }
                Placement::Join(i) => join_filters[i].push(conjunct),
            }
        }

        let mut node = PlanNode::SeqScan {
            table: sel.base.name.clone(),
            filter: analysis::combine_conjuncts(std::mem::take(&mut scan_filters[0])),
            project: None,
        };
        for (i, join) in sel.joins.iter().enumerate() {
            let right = PlanNode::SeqScan {
                table: join.table.name.clone(),
                filter: analysis::combine_conjuncts(std::mem::take(&mut scan_filters[i + 1])),
                project: None,
            };
            node = PlanNode::Join {
                join_type: join_types[i],
                condition: join.condition.clone(),
                filter: analysis::combine_conjuncts(std::mem::take(&mut join_filters[i])),
                project: None,
                left: Box::new(node),
                right: Box::new(right),
            };
        }
        node
    }

    /// LEFT joins whose null-supplying side is filtered by a
    /// null-rejecting WHERE conjunct degrade to INNER.
    fn effective_join_types(sel: &BoundSelect, conjuncts: &[BoundExpr]) -> Vec<JoinType> {
        sel.joins
            .iter()
            .map(|join| {
                if join.join_type == JoinType::Left {
                    let lo = join.col_offset;
                    let hi = join.col_offset + join.table.num_columns();
                    if conjuncts
                        .iter()
                        .any(|c| Self::null_rejecting_on(c, lo, hi))
                    {
                        return JoinType::Inner;
                    }
                }
                join.join_type
            })
            .collect()
    }

    /// A comparison touching the column range, or IS NOT NULL over it,
    /// can never pass a null-extended row.
    fn null_rejecting_on(conjunct: &BoundExpr, lo: usize, hi: usize) -> bool {
        let references = |expr: &BoundExpr| {
            let mut cols = BTreeSet::new();
            analysis::collect_columns(expr, &mut cols);
            cols.iter().any(|c| (lo..hi).contains(c))
        };
        match conjunct {
            BoundExpr::BinaryOp { op, .. } if op.is_comparison() => references(conjunct),
            BoundExpr::IsNotNull(inner) => references(inner),
            _ => false,
        }
    }

    fn placement(sel: &BoundSelect, join_types: &[JoinType], conjunct: &BoundExpr) -> Placement {
        if sel.joins.is_empty() {
            return Placement::Scan(0);
        }
        let mut cols = BTreeSet::new();
        analysis::collect_columns(conjunct, &mut cols);
        if cols.is_empty() {
            return Placement::Join(sel.joins.len() - 1);
        }
        let tables: BTreeSet<usize> = cols.iter().map(|c| Self::table_of(sel, *c)).collect();
        if tables.len() == 1 {
            let t = tables.iter().next().copied().unwrap_or(0);
            if t == 0 {
                return Placement::Scan(0);
            }
            if join_types[t - 1] == JoinType::Inner {
                return Placement::Scan(t);
            }
            return Placement::Join(t - 1);
        }
        let highest = tables.iter().next_back().copied().unwrap_or(1);
        Placement::Join(highest.max(1) - 1)
    }

    fn table_of(sel: &BoundSelect, col: usize) -> usize {
        for (i, join) in sel.joins.iter().enumerate() {
            if col >= join.col_offset && col < join.col_offset + join.table.num_columns() {
                return i + 1;
            }
        }
        0
    }

    /// Rewrite a conjunct into table-local ordinals for a scan filter.
    fn scan_local(sel: &BoundSelect, table: usize, conjunct: &BoundExpr) -> BoundExpr {
        if table == 0 {
            return conjunct.clone();
        }
        let offset = sel.joins[table - 1].col_offset;
        analysis::remap_columns(conjunct, &|c| c - offset)
    }

    fn attach_project(node: PlanNode, cols: Vec<OutputColumn>) -> PlanNode {
        match node {
            PlanNode::SeqScan { table, filter, .. } => PlanNode::SeqScan {
                table,
                filter,
                project: Some(cols),
            },
            PlanNode::Join {
                join_type,
                condition,
                filter,
                left,
                right,
                ..
            } => PlanNode::Join {
                join_type,
                condition,
                filter,
                project: Some(cols),
                left,
                right,
            },
            other => PlanNode::Calc {
                input: Box::new(other),
                condition: None,
                project: Some(cols),
            },
        }
    }

    /// Output columns for a non-aggregating select. Aggregate entries
    /// are handled by [`Self::agg_exprs`] and never appear here.
    fn output_columns(sel: &BoundSelect) -> Vec<OutputColumn> {
        sel.projections
            .iter()
            .enumerate()
            .filter_map(|(pos, proj)| match proj {
                BoundProjection::Expr { expr, alias } => Some(OutputColumn {
                    expr: expr.clone(),
                    name: Self::column_label(alias.as_deref(), pos),
                }),
                BoundProjection::Aggregate { .. } => None,
            })
            .collect()
    }

    fn agg_exprs(sel: &BoundSelect) -> Vec<AggExpr> {
        sel.projections
            .iter()
            .enumerate()
            .filter_map(|(pos, proj)| match proj {
                BoundProjection::Aggregate { func, arg, alias } => Some(AggExpr {
                    func: *func,
                    arg: arg.clone(),
                    name: Self::column_label(alias.as_deref(), pos),
                }),
                BoundProjection::Expr { .. } => None,
            })
            .collect()
    }

    /// Anonymous columns are labeled `C1`, `C2`, ... by one-based
    /// select-list position.
    fn column_label(alias: Option<&str>, pos: usize) -> String {
        match alias {
            Some(name) => name.to_string(),
            None => format!("C{}", pos + 1),
        }
    }

    fn sort_keys(sel: &BoundSelect) -> Vec<SortKey> {
        sel.order_by
            .iter()
            .map(|ob| SortKey {
                column: ob.column,
                asc: ob.asc,
            })
            .collect()
    }

    fn limit_clause(sel: &BoundSelect) -> Option<LimitClause> {
        if sel.limit.is_none() && sel.offset.is_none() {
            return None;
        }
        Some(LimitClause {
            limit: sel.limit,
            offset: sel.offset,
        })
    }

    /// The output order is fully determined when a bare aggregate
    /// yields a single row, or when the sort keys cover every output
    /// column.
    fn order_deterministic(sel: &BoundSelect) -> bool {
        if sel.is_aggregating() && sel.group_by.is_empty() {
            return true;
        }
        if sel.order_by.is_empty() {
            return false;
        }
        let keys: BTreeSet<usize> = sel.order_by.iter().map(|ob| ob.column).collect();
        if sel.is_aggregating() {
            (0..sel.projections.len()).all(|pos| keys.contains(&pos))
        } else {
            sel.projections.iter().all(|proj| match proj {
                BoundProjection::Expr {
                    expr: BoundExpr::ColumnRef(c),
                    ..
                } => keys.contains(c),
                _ => false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_distributed_unsupported;
    use merlin_common::schema::Catalog;
    use merlin_plan::{render, render_compiled};
    use merlin_sql_frontend::{load_schema, parse_one, Binder};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        load_schema(
            &mut catalog,
            "create table t(a int, b int);\n\
             create table r(x int, y int);\n\
             create table p(id int, a int);\n\
             create table q(id int, v int);\n\
             partition table p on column id;\n\
             partition table q on column id;",
        )
        .unwrap();
        catalog
    }

    fn plan(sql: &str) -> CompiledPlan {
        try_plan(sql).unwrap()
    }

    fn try_plan(sql: &str) -> SqlResult<CompiledPlan> {
        let catalog = catalog();
        let stmt = parse_one(sql).unwrap();
        let mut binder = Binder::new(&catalog);
        let bound = binder.bind(&stmt).unwrap();
        AlderPlanner::compile(&bound)
    }

    // ---- single-partition shapes ----

    #[test]
    fn test_filter_sits_below_limit() {
        let compiled = plan("select a from t where a > ? limit 2 offset ?");
        assert!(compiled.subplan.is_none());
        assert_eq!(
            render(&compiled.root),
            "Limit(limit=[2], offset=[?1])\n  \
             SeqScan(table=[t], filter=[($0 > ?0)], project=[[$0 AS a]])"
        );
    }

    #[test]
    fn test_projection_above_sort() {
        let compiled = plan("select a from t order by b desc");
        assert_eq!(
            render(&compiled.root),
            "Calc(project=[[$0 AS a]])\n  \
             OrderBy(keys=[[$1 DESC]])\n    \
             SeqScan(table=[t])"
        );
    }

    #[test]
    fn test_anonymous_columns_are_one_based() {
        let compiled = plan("select a + 1, a from t");
        assert_eq!(
            render(&compiled.root),
            "SeqScan(table=[t], project=[[($0 + 1) AS C1, $0 AS a]])"
        );
    }

    #[test]
    fn test_distinct_above_scan() {
        let compiled = plan("select distinct a from t");
        assert_eq!(
            render(&compiled.root),
            "Distinct\n  SeqScan(table=[t], project=[[$0 AS a]])"
        );
    }

    #[test]
    fn test_grouped_aggregate() {
        let compiled = plan("select b, count(*) from t group by b");
        assert_eq!(
            render(&compiled.root),
            "Aggregate(phase=[SINGLE], group=[[$1]], aggs=[[COUNT(*) AS C2]])\n  \
             SeqScan(table=[t])"
        );
    }

    #[test]
    fn test_aggregate_order_by_inlines_limit() {
        let compiled = plan("select b, count(*) as n from t group by b order by n desc limit 3");
        assert_eq!(
            render(&compiled.root),
            "OrderBy(keys=[[$1 DESC]], limit=[3])\n  \
             Aggregate(phase=[SINGLE], group=[[$1]], aggs=[[COUNT(*) AS n]])\n    \
             SeqScan(table=[t])"
        );
    }

    // ---- joins ----

    #[test]
    fn test_join_pushes_single_table_conjuncts() {
        let compiled = plan(
            "select t.a from t join r on t.a = r.x where t.b > 1 and r.y = 2 and t.a < r.y",
        );
        assert_eq!(
            render(&compiled.root),
            "Join(type=[inner], condition=[($0 = $2)], filter=[($0 < $3)], \
             project=[[$0 AS a]])\n  \
             SeqScan(table=[t], filter=[($1 > 1)])\n  \
             SeqScan(table=[r], filter=[($1 = 2)])"
        );
    }

    #[test]
    fn test_left_join_simplified_by_null_rejecting_filter() {
        let compiled = plan("select t.a from t left join r on t.a = r.x where r.y > 0");
        assert_eq!(
            render(&compiled.root),
            "Join(type=[inner], condition=[($0 = $2)], project=[[$0 AS a]])\n  \
             SeqScan(table=[t])\n  \
             SeqScan(table=[r], filter=[($1 > 0)])"
        );
    }

    #[test]
    fn test_left_join_keeps_null_tolerant_filter_on_join() {
        let compiled = plan("select t.a from t left join r on t.a = r.x where r.y is null");
        assert_eq!(
            render(&compiled.root),
            "Join(type=[left], condition=[($0 = $2)], filter=[($3 IS NULL)], \
             project=[[$0 AS a]])\n  \
             SeqScan(table=[t])\n  \
             SeqScan(table=[r])"
        );
    }

    // ---- routing ----

    #[test]
    fn test_pinned_partition_column_routes_single_partition() {
        let compiled = plan("select a from p where id = 3");
        assert!(compiled.subplan.is_none());
    }

    #[test]
    fn test_reversed_equality_is_not_recognized_as_pinning() {
        let compiled = plan("select a from p where 3 = id");
        assert!(compiled.subplan.is_some());
    }

    #[test]
    fn test_unpinned_scan_builds_two_fragments() {
        let compiled = plan("select a from p");
        assert!(compiled.is_multi_partition());
        assert_eq!(
            render_compiled(&compiled),
            "Receive\n\
             Send\n  SeqScan(table=[p], project=[[$1 AS a]])"
        );
    }

    #[test]
    fn test_distributed_aggregate_splits_into_partial_and_merge() {
        let compiled = plan("select count(*) from p");
        assert_eq!(
            render_compiled(&compiled),
            "Aggregate(phase=[MERGE], aggs=[[COUNT(*) AS C1]])\n  Receive\n\
             Send\n  Aggregate(phase=[PARTIAL], aggs=[[COUNT(*) AS C1]])\n    \
             SeqScan(table=[p])"
        );
    }

    #[test]
    fn test_distributed_sort_merges_presorted_streams() {
        let compiled = plan("select a from p order by a limit 5");
        assert_eq!(
            render_compiled(&compiled),
            "MergeReceive(keys=[[$1 ASC]], limit=[5])\n\
             Send\n  Calc(project=[[$1 AS a]])\n    OrderBy(keys=[[$1 ASC]])\n      \
             SeqScan(table=[p])"
        );
    }

    // ---- distributed rejections ----

    #[test]
    fn test_join_of_two_partitioned_tables_rejected() {
        let err = try_plan("select p.a from p join q on p.id = q.id").unwrap_err();
        assert!(is_distributed_unsupported(&err), "got {:?}", err);
    }

    #[test]
    fn test_distributed_offset_rejected() {
        let err = try_plan("select a from p limit 5 offset 2").unwrap_err();
        assert!(is_distributed_unsupported(&err), "got {:?}", err);
    }

    #[test]
    fn test_distributed_distinct_rejected() {
        let err = try_plan("select distinct a from p").unwrap_err();
        assert!(is_distributed_unsupported(&err), "got {:?}", err);
    }

    #[test]
    fn test_pinned_statement_is_not_rejected_for_offset() {
        let compiled = plan("select a from p where id = 1 limit 5 offset 2");
        assert!(compiled.subplan.is_none());
    }

    // ---- attributes ----

    #[test]
    fn test_order_determinism_attribute() {
        assert!(plan("select a from t order by a").attributes.order_deterministic);
        assert!(!plan("select a, b from t order by a").attributes.order_deterministic);
        assert!(plan("select count(*) from t").attributes.order_deterministic);
        assert!(!plan("select a from t").attributes.order_deterministic);
    }

    #[test]
    fn test_plans_are_read_only() {
        assert!(plan("select a from t").attributes.read_only);
    }
}
