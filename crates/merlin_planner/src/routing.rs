//! Partition routing inference.
//!
//! A statement runs on one partition when every partitioned table it
//! touches is pinned to a single partition: directly by an equality
//! conjunct between the partition column and a literal or parameter
//! (written with the column on either side), or transitively through a
//! co-partitioned equi-join, where pinning one side pins both. Every
//! other statement over partitioned tables becomes a two-fragment
//! distributed plan, except the shapes rejected here outright.

use std::collections::BTreeSet;

use merlin_common::error::{SqlError, SqlResult};
use merlin_sql_frontend::analysis;
use merlin_sql_frontend::{BinOp, BoundExpr, BoundSelect, BoundStatement};

use crate::MP_UNSUPPORTED_PREFIX;

fn mp_unsupported(what: &str) -> SqlError {
    SqlError::planning(format!("{}{}", MP_UNSUPPORTED_PREFIX, what))
}

/// Where the compiled plan will execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    SinglePartition,
    MultiPartition,
}

impl RoutingDecision {
    pub fn is_single_partition(&self) -> bool {
        matches!(self, RoutingDecision::SinglePartition)
    }
}

pub fn infer(stmt: &BoundStatement) -> SqlResult<RoutingDecision> {
    match stmt {
        BoundStatement::Select(sel) => infer_select(sel),
    }
}

fn infer_select(sel: &BoundSelect) -> SqlResult<RoutingDecision> {
    let partitioned = partition_ordinals(sel);
    match partitioned.as_slice() {
        [] => return Ok(RoutingDecision::SinglePartition),
        [_] => {}
        [a, b] => {
            if !co_partitioned(sel, *a, *b) {
                return Err(mp_unsupported(
                    "partitioned tables joined off their partition columns",
                ));
            }
        }
        _ => return Err(mp_unsupported("more than two partitioned tables")),
    }
    // Co-partitioned sides share their key, so pinning either one
    // pins the statement.
    let pinned = pins(sel);
    if partitioned.iter().any(|ordinal| pinned.contains(ordinal)) {
        Ok(RoutingDecision::SinglePartition)
    } else {
        Ok(RoutingDecision::MultiPartition)
    }
}

/// Combined-row ordinals of the partition column of every partitioned
/// table the statement touches, in FROM order.
fn partition_ordinals(sel: &BoundSelect) -> Vec<usize> {
    let mut out = Vec::new();
    if let Some(col) = sel.base.partition_column {
        out.push(col);
    }
    for join in &sel.joins {
        if let Some(col) = join.table.partition_column {
            out.push(join.col_offset + col);
        }
    }
    out
}

/// Ordinals pinned by a `col = value` WHERE conjunct, either operand
/// order.
fn pins(sel: &BoundSelect) -> BTreeSet<usize> {
    let Some(filter) = &sel.filter else {
        return BTreeSet::new();
    };
    let mut out = BTreeSet::new();
    for conjunct in analysis::split_conjuncts(filter) {
        if let BoundExpr::BinaryOp {
            left,
            op: BinOp::Eq,
            right,
        } = &conjunct
        {
            if let Some(ordinal) = pin_pair(left, right).or_else(|| pin_pair(right, left)) {
                out.insert(ordinal);
            }
        }
    }
    out
}

/// `column = literal-or-parameter`, column first.
fn pin_pair(col: &BoundExpr, value: &BoundExpr) -> Option<usize> {
    match (col, value) {
        (BoundExpr::ColumnRef(ordinal), BoundExpr::Literal(_) | BoundExpr::Parameter(_)) => {
            Some(*ordinal)
        }
        _ => None,
    }
}

/// Whether some ON-clause conjunct equates the two partition columns.
fn co_partitioned(sel: &BoundSelect, a: usize, b: usize) -> bool {
    sel.joins
        .iter()
        .filter_map(|join| join.condition.as_ref())
        .flat_map(analysis::split_conjuncts)
        .any(|conjunct| match conjunct {
            BoundExpr::BinaryOp {
                left,
                op: BinOp::Eq,
                right,
            } => matches!(
                (left.as_ref(), right.as_ref()),
                (BoundExpr::ColumnRef(x), BoundExpr::ColumnRef(y))
                    if (*x == a && *y == b) || (*x == b && *y == a)
            ),
            _ => false,
        })
}
