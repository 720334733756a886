//! Expression utilities shared by the planners.

use std::collections::BTreeSet;

use crate::types::{BinOp, BoundExpr};

/// Flatten an AND tree into its conjuncts, left to right.
pub fn split_conjuncts(expr: &BoundExpr) -> Vec<BoundExpr> {
    let mut out = Vec::new();
    collect_conjuncts(expr, &mut out);
    out
}

fn collect_conjuncts(expr: &BoundExpr, out: &mut Vec<BoundExpr>) {
    match expr {
        BoundExpr::BinaryOp { left, op: BinOp::And, right } => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other.clone()),
    }
}

/// Rebuild a left-associated AND chain from conjuncts. Returns `None`
/// for an empty list.
pub fn combine_conjuncts(parts: Vec<BoundExpr>) -> Option<BoundExpr> {
    let mut iter = parts.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, next| BoundExpr::BinaryOp {
        left: Box::new(acc),
        op: BinOp::And,
        right: Box::new(next),
    }))
}

/// Collect every column ordinal referenced by an expression.
pub fn collect_columns(expr: &BoundExpr, out: &mut BTreeSet<usize>) {
    match expr {
        BoundExpr::ColumnRef(idx) => {
            out.insert(*idx);
        }
        BoundExpr::Literal(_) | BoundExpr::Parameter(_) => {}
        BoundExpr::BinaryOp { left, right, .. } => {
            collect_columns(left, out);
            collect_columns(right, out);
        }
        BoundExpr::Not(inner) | BoundExpr::IsNull(inner) | BoundExpr::IsNotNull(inner) => {
            collect_columns(inner, out);
        }
    }
}

/// Rewrite every column reference through `f`.
pub fn remap_columns(expr: &BoundExpr, f: &impl Fn(usize) -> usize) -> BoundExpr {
    match expr {
        BoundExpr::ColumnRef(idx) => BoundExpr::ColumnRef(f(*idx)),
        BoundExpr::Literal(lit) => BoundExpr::Literal(lit.clone()),
        BoundExpr::Parameter(idx) => BoundExpr::Parameter(*idx),
        BoundExpr::BinaryOp { left, op, right } => BoundExpr::BinaryOp {
            left: Box::new(remap_columns(left, f)),
            op: *op,
            right: Box::new(remap_columns(right, f)),
        },
        BoundExpr::Not(inner) => BoundExpr::Not(Box::new(remap_columns(inner, f))),
        BoundExpr::IsNull(inner) => BoundExpr::IsNull(Box::new(remap_columns(inner, f))),
        BoundExpr::IsNotNull(inner) => BoundExpr::IsNotNull(Box::new(remap_columns(inner, f))),
    }
}
