//! Physical conversion and operator inlining.
//!
//! Conversion maps the rewritten relational tree onto physical
//! operators node for node. Single-partition plans convert the whole
//! tree in place; multi-partition plans are cut at the fragment
//! boundary, with the scan side of the tree (plus any pre-sort or
//! partial aggregation) lowered into a `Send` fragment and the rest
//! rebuilt over `Receive`. The inlining pass then folds `Calc` nodes
//! into the scans and joins beneath them and `Limit` nodes into sorts
//! and merges, which is what gives the final operator shapes.

use std::collections::BTreeSet;

use merlin_plan::{
    AggExpr, AggPhase, CompiledPlan, LimitClause, OutputColumn, PlanAttributes, PlanNode, SortKey,
};
use merlin_sql_frontend::analysis;
use merlin_sql_frontend::{BoundExpr, BoundOrderBy, BoundProjection, BoundSelect};

use crate::logical_plan::{output_label, LogicalPlan};
use crate::routing::RoutingDecision;

/// Convert a rewritten relational tree into a compiled (pre-inline)
/// plan for the routed execution shape.
pub fn build(plan: &LogicalPlan, sel: &BoundSelect, routing: RoutingDecision) -> CompiledPlan {
    let attributes = PlanAttributes {
        read_only: true,
        order_deterministic: order_deterministic(sel),
    };
    if routing.is_single_partition() {
        return CompiledPlan::single_partition(to_physical(plan), attributes);
    }
    let (root, subplan) = decompose(plan);
    CompiledPlan::multi_partition(root, subplan, attributes)
}

/// Node-for-node lowering, no fragment boundary.
fn to_physical(plan: &LogicalPlan) -> PlanNode {
    match plan {
        LogicalPlan::Scan { table } => PlanNode::SeqScan {
            table: table.name.clone(),
            filter: None,
            project: None,
        },
        LogicalPlan::Filter { input, predicate } => PlanNode::Calc {
            input: Box::new(to_physical(input)),
            condition: Some(predicate.clone()),
            project: None,
        },
        LogicalPlan::Project { input, projections } => PlanNode::Calc {
            input: Box::new(to_physical(input)),
            condition: None,
            project: Some(output_columns(projections)),
        },
        LogicalPlan::Aggregate {
            input,
            group_by,
            projections,
        } => PlanNode::Aggregate {
            input: Box::new(to_physical(input)),
            phase: AggPhase::Single,
            group_by: group_by.clone(),
            aggs: agg_exprs(projections),
        },
        LogicalPlan::Sort { input, order_by } => PlanNode::OrderBy {
            input: Box::new(to_physical(input)),
            keys: sort_keys(order_by),
            limit: None,
        },
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => PlanNode::Limit {
            input: Box::new(to_physical(input)),
            clause: LimitClause {
                limit: *limit,
                offset: *offset,
            },
        },
        LogicalPlan::Distinct { input } => PlanNode::Distinct {
            input: Box::new(to_physical(input)),
        },
        LogicalPlan::Join {
            join_type,
            condition,
            filter,
            left,
            right,
        } => PlanNode::Join {
            join_type: *join_type,
            condition: condition.clone(),
            filter: filter.clone(),
            project: None,
            left: Box::new(to_physical(left)),
            right: Box::new(to_physical(right)),
        },
    }
}

/// Cut a multi-partition tree into a coordinator tree and a `Send`
/// fragment.
///
/// The walk descends the single-input stack above the scans. Limit,
/// Distinct, and any sort above an aggregate stay with the
/// coordinator; the projection, its pre-sort, and the partial half of
/// an aggregation go to the fragment. Each arm returns the pair
/// `(root, subplan)`.
fn decompose(plan: &LogicalPlan) -> (PlanNode, PlanNode) {
    match plan {
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => {
            let (root, subplan) = decompose(input);
            let root = PlanNode::Limit {
                input: Box::new(root),
                clause: LimitClause {
                    limit: *limit,
                    offset: *offset,
                },
            };
            (root, subplan)
        }
        LogicalPlan::Distinct { input } => {
            let (root, subplan) = decompose(input);
            let root = PlanNode::Distinct {
                input: Box::new(root),
            };
            (root, subplan)
        }
        // A sort at this depth orders aggregate output; the grouped
        // rows only exist after the coordinator-side merge.
        LogicalPlan::Sort { input, order_by } => {
            let (root, subplan) = decompose(input);
            let root = PlanNode::OrderBy {
                input: Box::new(root),
                keys: sort_keys(order_by),
                limit: None,
            };
            (root, subplan)
        }
        LogicalPlan::Project { input, projections } => match input.as_ref() {
            // Each partition pre-sorts its stream and the coordinator
            // merges them in key order.
            LogicalPlan::Sort {
                input: sorted,
                order_by,
            } => {
                let keys = sort_keys(order_by);
                let fragment = PlanNode::Calc {
                    input: Box::new(PlanNode::OrderBy {
                        input: Box::new(to_physical(sorted)),
                        keys: keys.clone(),
                        limit: None,
                    }),
                    condition: None,
                    project: Some(output_columns(projections)),
                };
                let root = PlanNode::MergeReceive { keys, limit: None };
                (
                    root,
                    PlanNode::Send {
                        input: Box::new(fragment),
                    },
                )
            }
            core => {
                let fragment = PlanNode::Calc {
                    input: Box::new(to_physical(core)),
                    condition: None,
                    project: Some(output_columns(projections)),
                };
                (
                    PlanNode::Receive,
                    PlanNode::Send {
                        input: Box::new(fragment),
                    },
                )
            }
        },
        LogicalPlan::Aggregate {
            input,
            group_by,
            projections,
        } => {
            let aggs = agg_exprs(projections);
            let subplan = PlanNode::Send {
                input: Box::new(PlanNode::Aggregate {
                    input: Box::new(to_physical(input)),
                    phase: AggPhase::Partial,
                    group_by: group_by.clone(),
                    aggs: aggs.clone(),
                }),
            };
            let root = PlanNode::Aggregate {
                input: Box::new(PlanNode::Receive),
                phase: AggPhase::Merge,
                group_by: group_by.clone(),
                aggs,
            };
            (root, subplan)
        }
        core => (
            PlanNode::Receive,
            PlanNode::Send {
                input: Box::new(to_physical(core)),
            },
        ),
    }
}

/// Fold Calc nodes into the scan or join beneath them, and Limit nodes
/// into the sort or merge beneath them. Applied bottom-up to both
/// halves of the plan.
pub fn inline(plan: CompiledPlan) -> CompiledPlan {
    CompiledPlan {
        root: inline_node(plan.root),
        subplan: plan.subplan.map(inline_node),
        attributes: plan.attributes,
    }
}

fn inline_node(node: PlanNode) -> PlanNode {
    match node {
        PlanNode::Calc {
            input,
            condition,
            project,
        } => match inline_node(*input) {
            PlanNode::SeqScan {
                table,
                filter,
                project: None,
            } => PlanNode::SeqScan {
                table,
                filter: merged_filter(filter, condition),
                project,
            },
            PlanNode::Join {
                join_type,
                condition: join_condition,
                filter,
                project: None,
                left,
                right,
            } => PlanNode::Join {
                join_type,
                condition: join_condition,
                filter: merged_filter(filter, condition),
                project,
                left,
                right,
            },
            other => PlanNode::Calc {
                input: Box::new(other),
                condition,
                project,
            },
        },
        PlanNode::Limit { input, clause } => match inline_node(*input) {
            PlanNode::OrderBy {
                input,
                keys,
                limit: None,
            } => PlanNode::OrderBy {
                input,
                keys,
                limit: Some(clause),
            },
            PlanNode::MergeReceive { keys, limit: None } => PlanNode::MergeReceive {
                keys,
                limit: Some(clause),
            },
            other => PlanNode::Limit {
                input: Box::new(other),
                clause,
            },
        },
        PlanNode::OrderBy { input, keys, limit } => PlanNode::OrderBy {
            input: Box::new(inline_node(*input)),
            keys,
            limit,
        },
        PlanNode::Aggregate {
            input,
            phase,
            group_by,
            aggs,
        } => PlanNode::Aggregate {
            input: Box::new(inline_node(*input)),
            phase,
            group_by,
            aggs,
        },
        PlanNode::Join {
            join_type,
            condition,
            filter,
            project,
            left,
            right,
        } => PlanNode::Join {
            join_type,
            condition,
            filter,
            project,
            left: Box::new(inline_node(*left)),
            right: Box::new(inline_node(*right)),
        },
        PlanNode::Distinct { input } => PlanNode::Distinct {
            input: Box::new(inline_node(*input)),
        },
        PlanNode::Send { input } => PlanNode::Send {
            input: Box::new(inline_node(*input)),
        },
        leaf @ (PlanNode::SeqScan { .. } | PlanNode::Receive | PlanNode::MergeReceive { .. }) => {
            leaf
        }
    }
}

/// AND together an existing filter and an inlined condition, existing
/// conjuncts first.
fn merged_filter(existing: Option<BoundExpr>, added: Option<BoundExpr>) -> Option<BoundExpr> {
    let mut conjuncts = Vec::new();
    if let Some(filter) = existing {
        conjuncts.extend(analysis::split_conjuncts(&filter));
    }
    if let Some(condition) = added {
        conjuncts.extend(analysis::split_conjuncts(&condition));
    }
    analysis::combine_conjuncts(conjuncts)
}

fn output_columns(projections: &[BoundProjection]) -> Vec<OutputColumn> {
    projections
        .iter()
        .enumerate()
        .filter_map(|(pos, proj)| match proj {
            BoundProjection::Expr { expr, alias } => Some(OutputColumn {
                expr: expr.clone(),
                name: output_label(alias.as_deref(), pos),
            }),
            BoundProjection::Aggregate { .. } => None,
        })
        .collect()
}

fn agg_exprs(projections: &[BoundProjection]) -> Vec<AggExpr> {
    projections
        .iter()
        .enumerate()
        .filter_map(|(pos, proj)| match proj {
            BoundProjection::Aggregate { func, arg, alias } => Some(AggExpr {
                func: *func,
                arg: arg.clone(),
                name: output_label(alias.as_deref(), pos),
            }),
            BoundProjection::Expr { .. } => None,
        })
        .collect()
}

fn sort_keys(order_by: &[BoundOrderBy]) -> Vec<SortKey> {
    order_by
        .iter()
        .map(|ob| SortKey {
            column: ob.column,
            asc: ob.asc,
        })
        .collect()
}

/// The output order is fully determined when a bare aggregate yields
/// one row, or when the sort keys cover every output column. Computed
/// from the bound statement so both execution shapes agree.
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
