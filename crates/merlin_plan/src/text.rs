//! Deterministic text rendering of plan trees. Two plans are
//! considered equivalent exactly when their rendered text matches, so
//! every attribute that matters is part of this format.

use merlin_sql_frontend::{BoundExpr, LimitValue};

use crate::compiled::CompiledPlan;
use crate::ids::IdAllocator;
use crate::node::{AggExpr, LimitClause, OutputColumn, PlanNode, SortKey};

/// Render a plan tree, one node per line, children indented two
/// spaces below their parent.
pub fn render(root: &PlanNode) -> String {
    let mut out = String::new();
    let mut ids = None;
    write_node(root, 0, &mut ids, &mut out);
    out
}

/// Render with `#id` stamps on every node name, ids drawn from the
/// caller's allocator in depth-first order.
pub fn render_numbered(root: &PlanNode, ids: &mut IdAllocator) -> String {
    let mut out = String::new();
    let mut ids = Some(ids);
    write_node(root, 0, &mut ids, &mut out);
    out
}

/// Render a compiled plan: the coordinator tree, then the sub-plan
/// fragment when present.
pub fn render_compiled(plan: &CompiledPlan) -> String {
    match &plan.subplan {
        None => render(&plan.root),
        Some(subplan) => format!("{}\n{}", render(&plan.root), render(subplan)),
    }
}

fn write_node(
    node: &PlanNode,
    depth: usize,
    ids: &mut Option<&mut IdAllocator>,
    out: &mut String,
) {
    if !out.is_empty() {
        out.push('\n');
    }
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(node.type_name());
    if let Some(alloc) = ids.as_deref_mut() {
        out.push('#');
        out.push_str(&alloc.next_id().to_string());
    }
    let attrs = node_attrs(node);
    if !attrs.is_empty() {
        out.push('(');
        out.push_str(&attrs.join(", "));
        out.push(')');
    }
    for child in node.children() {
        write_node(child, depth + 1, ids, out);
    }
}

fn node_attrs(node: &PlanNode) -> Vec<String> {
    let mut attrs = Vec::new();
    match node {
        PlanNode::SeqScan {
            table,
            filter,
            project,
        } => {
            attrs.push(format!("table=[{}]", table));
            if let Some(cond) = filter {
                attrs.push(format!("filter=[{}]", expr_text(cond)));
            }
            if let Some(cols) = project {
                attrs.push(format!("project=[[{}]]", columns_text(cols)));
            }
        }
        PlanNode::Calc {
            condition, project, ..
        } => {
            if let Some(cond) = condition {
                attrs.push(format!("condition=[{}]", expr_text(cond)));
            }
            if let Some(cols) = project {
                attrs.push(format!("project=[[{}]]", columns_text(cols)));
            }
        }
        PlanNode::Limit { clause, .. } => {
            push_limit_attrs(clause, &mut attrs);
        }
        PlanNode::OrderBy { keys, limit, .. } => {
            attrs.push(format!("keys=[[{}]]", keys_text(keys)));
            if let Some(clause) = limit {
                push_limit_attrs(clause, &mut attrs);
            }
        }
        PlanNode::Aggregate {
            phase,
            group_by,
            aggs,
            ..
        } => {
            attrs.push(format!("phase=[{}]", phase.name()));
            if !group_by.is_empty() {
                let cols: Vec<String> = group_by.iter().map(|c| format!("${}", c)).collect();
                attrs.push(format!("group=[[{}]]", cols.join(", ")));
            }
            if !aggs.is_empty() {
                attrs.push(format!("aggs=[[{}]]", aggs_text(aggs)));
            }
        }
        PlanNode::Join {
            join_type,
            condition,
            filter,
            project,
            ..
        } => {
            attrs.push(format!("type=[{}]", join_type.name()));
            if let Some(cond) = condition {
                attrs.push(format!("condition=[{}]", expr_text(cond)));
            }
            if let Some(cond) = filter {
                attrs.push(format!("filter=[{}]", expr_text(cond)));
            }
            if let Some(cols) = project {
                attrs.push(format!("project=[[{}]]", columns_text(cols)));
            }
        }
        PlanNode::Distinct { .. } | PlanNode::Send { .. } | PlanNode::Receive => {}
        PlanNode::MergeReceive { keys, limit } => {
            if !keys.is_empty() {
                attrs.push(format!("keys=[[{}]]", keys_text(keys)));
            }
            if let Some(clause) = limit {
                push_limit_attrs(clause, &mut attrs);
            }
        }
    }
    attrs
}

fn push_limit_attrs(clause: &LimitClause, attrs: &mut Vec<String>) {
    if let Some(limit) = &clause.limit {
        attrs.push(format!("limit=[{}]", limit_value_text(limit)));
    }
    if let Some(offset) = &clause.offset {
        attrs.push(format!("offset=[{}]", limit_value_text(offset)));
    }
}

fn limit_value_text(value: &LimitValue) -> String {
    match value {
        LimitValue::Count(n) => n.to_string(),
        LimitValue::Parameter(p) => format!("?{}", p),
    }
}

fn keys_text(keys: &[SortKey]) -> String {
    keys.iter()
        .map(|k| format!("${} {}", k.column, if k.asc { "ASC" } else { "DESC" }))
        .collect::<Vec<_>>()
        .join(", ")
}

fn columns_text(cols: &[OutputColumn]) -> String {
    cols.iter()
        .map(|c| format!("{} AS {}", expr_text(&c.expr), c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn aggs_text(aggs: &[AggExpr]) -> String {
    aggs.iter()
        .map(|a| {
            let call = match &a.arg {
                None => format!("{}(*)", a.func.name()),
                Some(arg) => format!("{}({})", a.func.name(), expr_text(arg)),
            };
            format!("{} AS {}", call, a.name)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compact expression digest: `$N` column ordinals, `?N` parameters,
/// parenthesized binary operations.
pub fn expr_text(expr: &BoundExpr) -> String {
    match expr {
        BoundExpr::ColumnRef(idx) => format!("${}", idx),
        BoundExpr::Parameter(idx) => format!("?{}", idx),
        BoundExpr::Literal(lit) => lit.to_string(),
        BoundExpr::BinaryOp { left, op, right } => {
            format!("({} {} {})", expr_text(left), op.symbol(), expr_text(right))
        }
        BoundExpr::Not(inner) => format!("NOT({})", expr_text(inner)),
        BoundExpr::IsNull(inner) => format!("({} IS NULL)", expr_text(inner)),
        BoundExpr::IsNotNull(inner) => format!("({} IS NOT NULL)", expr_text(inner)),
    }
}
