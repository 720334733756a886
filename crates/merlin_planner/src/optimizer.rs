//! Rewrite rules for [`LogicalPlan`].
//!
//! Each rule is a function `LogicalPlan -> LogicalPlan` applied
//! top-down with exhaustive arms, so adding a node kind forces every
//! rule to say what happens to it. The pipeline runs the rules in
//! fixed phases:
//!
//! 1. **Predicate pushdown** - dissolve `Filter` nodes into the join
//!    tree, sinking conjuncts toward the scans they cover.
//! 2. **Outer join simplification** - degrade LEFT joins to INNER when
//!    an enclosing filter rejects null-extended rows, then re-run
//!    pushdown for the conjuncts the LEFT join had blocked.
//! 3. **Join commutation** - swap the inputs of a lone filtered inner
//!    join (only in the commuting conversion variant).

use std::collections::BTreeSet;

use merlin_sql_frontend::analysis;
use merlin_sql_frontend::{BoundExpr, BoundOrderBy, BoundProjection, JoinType};

use crate::logical_plan::LogicalPlan;

/// Controls which rewrite rules run. Everything defaults on; the
/// harness narrows this when isolating a single rewrite.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub predicate_pushdown: bool,
    pub outer_join_simplify: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            predicate_pushdown: true,
            outer_join_simplify: true,
        }
    }
}

// ── Rule 1: Predicate Pushdown ───────────────────────────────────────

/// Sink WHERE conjuncts toward the scans.
///
/// A `Filter` directly above a join dissolves into it: conjuncts
/// confined to the left input recurse further down, conjuncts confined
/// to the right input move onto it in table-local ordinals when the
/// join is inner, and everything else (spanning conjuncts, column-free
/// conjuncts, and right-side conjuncts under a LEFT join) stays on the
/// join node's filter.
pub fn rule_predicate_pushdown(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { input, predicate } => {
            match rule_predicate_pushdown(*input) {
                LogicalPlan::Join {
                    join_type,
                    condition,
                    filter,
                    left,
                    right,
                } => push_into_join(join_type, condition, filter, left, right, &predicate),
                other => LogicalPlan::Filter {
                    input: Box::new(other),
                    predicate,
                },
            }
        }
        LogicalPlan::Scan { table } => LogicalPlan::Scan { table },
        LogicalPlan::Project { input, projections } => LogicalPlan::Project {
            input: Box::new(rule_predicate_pushdown(*input)),
            projections,
        },
        LogicalPlan::Aggregate {
            input,
            group_by,
            projections,
        } => LogicalPlan::Aggregate {
            input: Box::new(rule_predicate_pushdown(*input)),
            group_by,
            projections,
        },
        LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
            input: Box::new(rule_predicate_pushdown(*input)),
            order_by,
        },
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => LogicalPlan::Limit {
            input: Box::new(rule_predicate_pushdown(*input)),
            limit,
            offset,
        },
        LogicalPlan::Distinct { input } => LogicalPlan::Distinct {
            input: Box::new(rule_predicate_pushdown(*input)),
        },
        LogicalPlan::Join {
            join_type,
            condition,
            filter,
            left,
            right,
        } => LogicalPlan::Join {
            join_type,
            condition,
            filter,
            left: Box::new(rule_predicate_pushdown(*left)),
            right: Box::new(rule_predicate_pushdown(*right)),
        },
    }
}

/// Classify each conjunct of `predicate` against one join and rebuild
/// the node. Conjuncts the join already owned keep their place ahead
/// of new arrivals.
fn push_into_join(
    join_type: JoinType,
    condition: Option<BoundExpr>,
    filter: Option<BoundExpr>,
    left: Box<LogicalPlan>,
    right: Box<LogicalPlan>,
    predicate: &BoundExpr,
) -> LogicalPlan {
    let left_width = left.output_width();
    let mut to_left = Vec::new();
    let mut to_right = Vec::new();
    let mut on_join = match filter {
        Some(filter) => analysis::split_conjuncts(&filter),
        None => Vec::new(),
    };
    for conjunct in analysis::split_conjuncts(predicate) {
        let mut cols = BTreeSet::new();
        analysis::collect_columns(&conjunct, &mut cols);
        if cols.is_empty() {
            on_join.push(conjunct);
        } else if cols.iter().all(|&c| c < left_width) {
            to_left.push(conjunct);
        } else if cols.iter().all(|&c| c >= left_width) && join_type == JoinType::Inner {
            to_right.push(analysis::remap_columns(&conjunct, &|c| c - left_width));
        } else {
            on_join.push(conjunct);
        }
    }

    let left = match analysis::combine_conjuncts(to_left) {
        Some(predicate) => Box::new(rule_predicate_pushdown(LogicalPlan::Filter {
            input: left,
            predicate,
        })),
        None => left,
    };
    // The right input is a scan; its filter needs no further sinking.
    let right = match analysis::combine_conjuncts(to_right) {
        Some(predicate) => Box::new(LogicalPlan::Filter {
            input: right,
            predicate,
        }),
        None => right,
    };
    LogicalPlan::Join {
        join_type,
        condition,
        filter: analysis::combine_conjuncts(on_join),
        left,
        right,
    }
}

// ── Rule 2: Outer Join Simplification ────────────────────────────────

/// Degrade LEFT joins to INNER where an enclosing filter could never
/// accept a null-extended row from the right side.
///
/// A flipped join lifts its own filter back out as a `Filter` node, so
/// a follow-up pushdown pass can re-place the conjuncts the LEFT join
/// had been blocking.
pub fn rule_simplify_outer_joins(plan: LogicalPlan) -> LogicalPlan {
    simplify(plan, &[])
}

/// `scope` carries the conjuncts of every enclosing `Filter` and join
/// filter. Down the left spine those stay expressed in the current
/// node's ordinal space, so each join's right side is exactly the
/// ordinal range its own table spans.
fn simplify(plan: LogicalPlan, scope: &[BoundExpr]) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { input, predicate } => {
            let mut scope = scope.to_vec();
            scope.extend(analysis::split_conjuncts(&predicate));
            LogicalPlan::Filter {
                input: Box::new(simplify(*input, &scope)),
                predicate,
            }
        }
        LogicalPlan::Join {
            join_type,
            condition,
            filter,
            left,
            right,
        } => {
            let mut scope = scope.to_vec();
            if let Some(filter) = &filter {
                scope.extend(analysis::split_conjuncts(filter));
            }
            let left_width = left.output_width();
            let width = left_width + right.output_width();
            let left = Box::new(simplify(*left, &scope));
            // Ordinals in scope mean nothing in the right table's
            // local space, so the right side starts fresh.
            let right = Box::new(simplify(*right, &[]));
            let flips = join_type == JoinType::Left
                && scope
                    .iter()
                    .any(|c| null_rejecting_on(c, left_width, width));
            if flips {
                let inner = LogicalPlan::Join {
                    join_type: JoinType::Inner,
                    condition,
                    filter: None,
                    left,
                    right,
                };
                return match filter {
                    Some(predicate) => LogicalPlan::Filter {
                        input: Box::new(inner),
                        predicate,
                    },
                    None => inner,
                };
            }
            LogicalPlan::Join {
                join_type,
                condition,
                filter,
                left,
                right,
            }
        }
        LogicalPlan::Scan { table } => LogicalPlan::Scan { table },
        // Projection and aggregation change the row shape; conjuncts
        // from above are meaningless below them.
        LogicalPlan::Project { input, projections } => LogicalPlan::Project {
            input: Box::new(simplify(*input, &[])),
            projections,
        },
        LogicalPlan::Aggregate {
            input,
            group_by,
            projections,
        } => LogicalPlan::Aggregate {
            input: Box::new(simplify(*input, &[])),
            group_by,
            projections,
        },
        LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
            input: Box::new(simplify(*input, scope)),
            order_by,
        },
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => LogicalPlan::Limit {
            input: Box::new(simplify(*input, scope)),
            limit,
            offset,
        },
        LogicalPlan::Distinct { input } => LogicalPlan::Distinct {
            input: Box::new(simplify(*input, scope)),
        },
    }
}

/// Whether a conjunct can never hold once the columns in `lo..hi` are
/// null-extended: any comparison reaching into the range, or an
/// IS NOT NULL over it.
fn null_rejecting_on(conjunct: &BoundExpr, lo: usize, hi: usize) -> bool {
    let touches_range = |expr: &BoundExpr| {
        let mut cols = BTreeSet::new();
        analysis::collect_columns(expr, &mut cols);
        cols.range(lo..hi).next().is_some()
    };
    match conjunct {
        BoundExpr::BinaryOp { op, .. } if op.is_comparison() => touches_range(conjunct),
        BoundExpr::IsNotNull(inner) => touches_range(inner),
        _ => false,
    }
}

// ── Rule 3: Join Commutation ─────────────────────────────────────────

/// Swap the inputs of the statement's single inner join when only the
/// right side carries a scan filter, so the filtered input drives the
/// join. Fires on exactly one shape: one inner join between two scan
/// leaves, right side filtered, left side bare. Every expression above
/// the join is rewritten through the column remap; the swapped
/// children already speak table-local ordinals and stay untouched.
pub fn rule_commute_join(plan: LogicalPlan) -> LogicalPlan {
    match commutable_widths(&plan) {
        Some((left_width, right_width)) => {
            let remap = move |c: usize| {
                if c < left_width {
                    c + right_width
                } else {
                    c - left_width
                }
            };
            rewrite_commuted(plan, &remap)
        }
        None => plan,
    }
}

/// Left and right widths of the join to swap, when the tree qualifies.
fn commutable_widths(plan: &LogicalPlan) -> Option<(usize, usize)> {
    match plan {
        LogicalPlan::Join {
            join_type,
            left,
            right,
            ..
        } => {
            if *join_type != JoinType::Inner {
                return None;
            }
            let left_filtered = scan_leaf(left)?;
            let right_filtered = scan_leaf(right)?;
            if !left_filtered && right_filtered {
                Some((left.output_width(), right.output_width()))
            } else {
                None
            }
        }
        LogicalPlan::Filter { input, .. }
        | LogicalPlan::Project { input, .. }
        | LogicalPlan::Aggregate { input, .. }
        | LogicalPlan::Sort { input, .. }
        | LogicalPlan::Limit { input, .. }
        | LogicalPlan::Distinct { input } => commutable_widths(input),
        LogicalPlan::Scan { .. } => None,
    }
}

/// `Some(filtered)` when the subtree is a scan leaf.
fn scan_leaf(plan: &LogicalPlan) -> Option<bool> {
    match plan {
        LogicalPlan::Scan { .. } => Some(false),
        LogicalPlan::Filter { input, .. } => match input.as_ref() {
            LogicalPlan::Scan { .. } => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// Nodes above the projection or aggregation carry output-position
/// ordinals (or none at all) and pass through unchanged; the reshaping
/// node itself and everything below it goes through the remap.
fn rewrite_commuted(plan: LogicalPlan, remap: &impl Fn(usize) -> usize) -> LogicalPlan {
    match plan {
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => LogicalPlan::Limit {
            input: Box::new(rewrite_commuted(*input, remap)),
            limit,
            offset,
        },
        LogicalPlan::Distinct { input } => LogicalPlan::Distinct {
            input: Box::new(rewrite_commuted(*input, remap)),
        },
        // A sort this far out orders aggregate output positions.
        LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
            input: Box::new(rewrite_commuted(*input, remap)),
            order_by,
        },
        LogicalPlan::Project { input, projections } => LogicalPlan::Project {
            input: Box::new(rewrite_scan_space(*input, remap)),
            projections: remap_projections(projections, remap),
        },
        LogicalPlan::Aggregate {
            input,
            group_by,
            projections,
        } => LogicalPlan::Aggregate {
            input: Box::new(rewrite_scan_space(*input, remap)),
            group_by: group_by.into_iter().map(remap).collect(),
            projections: remap_projections(projections, remap),
        },
        other => rewrite_scan_space(other, remap),
    }
}

/// Rewrite the combined-row segment. The walk stops at the join: its
/// condition and filter are remapped and its children swap.
fn rewrite_scan_space(plan: LogicalPlan, remap: &impl Fn(usize) -> usize) -> LogicalPlan {
    match plan {
        LogicalPlan::Join {
            join_type,
            condition,
            filter,
            left,
            right,
        } => LogicalPlan::Join {
            join_type,
            condition: condition.map(|c| analysis::remap_columns(&c, remap)),
            filter: filter.map(|f| analysis::remap_columns(&f, remap)),
            left: right,
            right: left,
        },
        LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
            input: Box::new(rewrite_scan_space(*input, remap)),
            predicate: analysis::remap_columns(&predicate, remap),
        },
        LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
            input: Box::new(rewrite_scan_space(*input, remap)),
            order_by: order_by
                .into_iter()
                .map(|ob| BoundOrderBy {
                    column: remap(ob.column),
                    asc: ob.asc,
                })
                .collect(),
        },
        other => other,
    }
}

fn remap_projections(
    projections: Vec<BoundProjection>,
    remap: &impl Fn(usize) -> usize,
) -> Vec<BoundProjection> {
    projections
        .into_iter()
        .map(|proj| match proj {
            BoundProjection::Expr { expr, alias } => BoundProjection::Expr {
                expr: analysis::remap_columns(&expr, remap),
                alias,
            },
            BoundProjection::Aggregate { func, arg, alias } => BoundProjection::Aggregate {
                func,
                arg: arg.map(|a| analysis::remap_columns(&a, remap)),
                alias,
            },
        })
        .collect()
}
