//! JSON encoding of compiled plans. Node ids come from the caller's
//! allocator, so for a freshly reset allocator the encoding is stable
//! and can be compared byte for byte.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compiled::CompiledPlan;
use crate::ids::IdAllocator;
use crate::node::PlanNode;
use crate::text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPlanNode {
    pub id: u32,
    pub node_type: String,
    pub children: Vec<u32>,
    pub attributes: BTreeMap<String, String>,
}

/// One plan tree, nodes listed in depth-first order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPlan {
    pub plan_nodes: Vec<JsonPlanNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonCompiledPlan {
    pub plan: JsonPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subplan: Option<JsonPlan>,
    pub read_only: bool,
    pub order_deterministic: bool,
}

impl JsonPlan {
    pub fn to_string_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl JsonCompiledPlan {
    pub fn to_string_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn plan_to_json(root: &PlanNode, ids: &mut IdAllocator) -> JsonPlan {
    let mut nodes = Vec::new();
    encode_node(root, ids, &mut nodes);
    JsonPlan { plan_nodes: nodes }
}

pub fn compiled_to_json(plan: &CompiledPlan, ids: &mut IdAllocator) -> JsonCompiledPlan {
    JsonCompiledPlan {
        plan: plan_to_json(&plan.root, ids),
        subplan: plan.subplan.as_ref().map(|s| plan_to_json(s, ids)),
        read_only: plan.attributes.read_only,
        order_deterministic: plan.attributes.order_deterministic,
    }
}

fn encode_node(node: &PlanNode, ids: &mut IdAllocator, out: &mut Vec<JsonPlanNode>) -> u32 {
    let id = ids.next_id();
    let slot = out.len();
    out.push(JsonPlanNode {
        id,
        node_type: node.json_type().to_string(),
        children: Vec::new(),
        attributes: node_attributes(node),
    });
    let mut children = Vec::new();
    for child in node.children() {
        children.push(encode_node(child, ids, out));
    }
    out[slot].children = children;
    id
}

fn node_attributes(node: &PlanNode) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    match node {
        PlanNode::SeqScan {
            table,
            filter,
            project,
        } => {
            attrs.insert("table".to_string(), table.clone());
            if let Some(cond) = filter {
                attrs.insert("filter".to_string(), text::expr_text(cond));
            }
            if let Some(cols) = project {
                attrs.insert("project".to_string(), columns_attr(cols));
            }
        }
        PlanNode::Calc {
            condition, project, ..
        } => {
            if let Some(cond) = condition {
                attrs.insert("condition".to_string(), text::expr_text(cond));
            }
            if let Some(cols) = project {
                attrs.insert("project".to_string(), columns_attr(cols));
            }
        }
        PlanNode::Limit { clause, .. } => {
            insert_limit_attrs(clause, &mut attrs);
        }
        PlanNode::OrderBy { keys, limit, .. } => {
            attrs.insert("keys".to_string(), keys_attr(keys));
            if let Some(clause) = limit {
                insert_limit_attrs(clause, &mut attrs);
            }
        }
        PlanNode::Aggregate {
            phase,
            group_by,
            aggs,
            ..
        } => {
            attrs.insert("phase".to_string(), phase.name().to_string());
            if !group_by.is_empty() {
                let cols: Vec<String> = group_by.iter().map(|c| format!("${}", c)).collect();
                attrs.insert("group".to_string(), cols.join(", "));
            }
            if !aggs.is_empty() {
                let parts: Vec<String> = aggs
                    .iter()
                    .map(|a| {
                        let call = match &a.arg {
                            None => format!("{}(*)", a.func.name()),
                            Some(arg) => format!("{}({})", a.func.name(), text::expr_text(arg)),
                        };
                        format!("{} AS {}", call, a.name)
                    })
                    .collect();
                attrs.insert("aggs".to_string(), parts.join(", "));
            }
        }
        PlanNode::Join {
            join_type,
            condition,
            filter,
            project,
            ..
        } => {
            attrs.insert("type".to_string(), join_type.name().to_string());
            if let Some(cond) = condition {
                attrs.insert("condition".to_string(), text::expr_text(cond));
            }
            if let Some(cond) = filter {
                attrs.insert("filter".to_string(), text::expr_text(cond));
            }
            if let Some(cols) = project {
                attrs.insert("project".to_string(), columns_attr(cols));
            }
        }
        PlanNode::Distinct { .. } | PlanNode::Send { .. } | PlanNode::Receive => {}
        PlanNode::MergeReceive { keys, limit } => {
            if !keys.is_empty() {
                attrs.insert("keys".to_string(), keys_attr(keys));
            }
            if let Some(clause) = limit {
                insert_limit_attrs(clause, &mut attrs);
            }
        }
    }
    attrs
}

fn insert_limit_attrs(clause: &crate::node::LimitClause, attrs: &mut BTreeMap<String, String>) {
    if let Some(limit) = &clause.limit {
        attrs.insert("limit".to_string(), limit_attr(limit));
    }
    if let Some(offset) = &clause.offset {
        attrs.insert("offset".to_string(), limit_attr(offset));
    }
}

fn limit_attr(value: &merlin_sql_frontend::LimitValue) -> String {
    match value {
        merlin_sql_frontend::LimitValue::Count(n) => n.to_string(),
        merlin_sql_frontend::LimitValue::Parameter(p) => format!("?{}", p),
    }
}

fn keys_attr(keys: &[crate::node::SortKey]) -> String {
    keys.iter()
        .map(|k| format!("${} {}", k.column, if k.asc { "ASC" } else { "DESC" }))
        .collect::<Vec<_>>()
        .join(", ")
}

fn columns_attr(cols: &[crate::node::OutputColumn]) -> String {
    cols.iter()
        .map(|c| format!("{} AS {}", text::expr_text(&c.expr), c.name))
        .collect::<Vec<_>>()
        .join(", ")
}
