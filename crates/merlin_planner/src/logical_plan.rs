//! Relational decomposition of a bound statement.
//!
//! [`LogicalPlan`] is the tree the rule phases rewrite before physical
//! conversion. A non-aggregating SELECT decomposes bottom-up as
//! `Scan -> [Join] -> [Filter] -> [Sort] -> Project -> [Distinct] ->
//! [Limit]`; when the select list aggregates, an `Aggregate` node
//! re-shapes the row instead and ordering moves above it:
//! `Scan -> [Join] -> [Filter] -> Aggregate -> [Distinct] -> [Sort] ->
//! [Limit]`.
//!
//! Ordinal spaces follow the input row of each node: scan-combined
//! ordinals below the projection or aggregate, select-list positions
//! above. Filters pushed onto a join's right-hand scan are rewritten
//! into that table's local ordinals.

use merlin_common::schema::TableSchema;
use merlin_plan::text::expr_text;
use merlin_sql_frontend::{
    AggFunc, BoundExpr, BoundOrderBy, BoundProjection, BoundSelect, BoundStatement, JoinType,
    LimitValue,
};

/// A node in the pre-physical relational tree.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Leaf table scan.
    Scan { table: TableSchema },
    /// Row filter; the predicate is in the input's ordinal space.
    Filter {
        input: Box<LogicalPlan>,
        predicate: BoundExpr,
    },
    /// Select-list evaluation for non-aggregating statements.
    Project {
        input: Box<LogicalPlan>,
        projections: Vec<BoundProjection>,
    },
    /// Grouped or bare aggregation. Carries the whole select list so
    /// later stages can name its outputs.
    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<usize>,
        projections: Vec<BoundProjection>,
    },
    Sort {
        input: Box<LogicalPlan>,
        order_by: Vec<BoundOrderBy>,
    },
    Limit {
        input: Box<LogicalPlan>,
        limit: Option<LimitValue>,
        offset: Option<LimitValue>,
    },
    Distinct { input: Box<LogicalPlan> },
    Join {
        join_type: JoinType,
        /// ON-clause condition, in combined-row ordinals.
        condition: Option<BoundExpr>,
        /// WHERE conjuncts owned by this join.
        filter: Option<BoundExpr>,
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },
}

impl LogicalPlan {
    pub fn from_bound(stmt: &BoundStatement) -> LogicalPlan {
        match stmt {
            BoundStatement::Select(sel) => Self::from_bound_select(sel),
        }
    }

    fn from_bound_select(sel: &BoundSelect) -> LogicalPlan {
        // 1. Scan/join tree, left-deep in FROM order.
        let mut plan = LogicalPlan::Scan {
            table: sel.base.clone(),
        };
        for join in &sel.joins {
            plan = LogicalPlan::Join {
                join_type: join.join_type,
                condition: join.condition.clone(),
                filter: None,
                left: Box::new(plan),
                right: Box::new(LogicalPlan::Scan {
                    table: join.table.clone(),
                }),
            };
        }

        // 2. The whole WHERE clause as one filter; the rule phases
        //    split and re-place its conjuncts.
        if let Some(predicate) = &sel.filter {
            plan = LogicalPlan::Filter {
                input: Box::new(plan),
                predicate: predicate.clone(),
            };
        }

        if sel.is_aggregating() {
            // 3a. Aggregation re-shapes the row to the select list, so
            //     dedup and ordering sit above it on output positions.
            plan = LogicalPlan::Aggregate {
                input: Box::new(plan),
                group_by: sel.group_by.clone(),
                projections: sel.projections.clone(),
            };
            if sel.distinct {
                plan = LogicalPlan::Distinct {
                    input: Box::new(plan),
                };
            }
            if !sel.order_by.is_empty() {
                plan = LogicalPlan::Sort {
                    input: Box::new(plan),
                    order_by: sel.order_by.clone(),
                };
            }
        } else {
            // 3b. Sort keys are scan ordinals, so the sort sits below
            //     the projection.
            if !sel.order_by.is_empty() {
                plan = LogicalPlan::Sort {
                    input: Box::new(plan),
                    order_by: sel.order_by.clone(),
                };
            }
            plan = LogicalPlan::Project {
                input: Box::new(plan),
                projections: sel.projections.clone(),
            };
            if sel.distinct {
                plan = LogicalPlan::Distinct {
                    input: Box::new(plan),
                };
            }
        }

        // 4. LIMIT/OFFSET caps the final stream.
        if sel.limit.is_some() || sel.offset.is_some() {
            plan = LogicalPlan::Limit {
                input: Box::new(plan),
                limit: sel.limit,
                offset: sel.offset,
            };
        }
        plan
    }

    /// Number of columns in this node's output row.
    pub fn output_width(&self) -> usize {
        match self {
            LogicalPlan::Scan { table } => table.num_columns(),
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Distinct { input } => input.output_width(),
            LogicalPlan::Project { projections, .. }
            | LogicalPlan::Aggregate { projections, .. } => projections.len(),
            LogicalPlan::Join { left, right, .. } => {
                left.output_width() + right.output_width()
            }
        }
    }

    /// Canonical tree text: one node per line, children indented two
    /// spaces, attributes in the same vocabulary the physical
    /// renderer uses.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write(0, &mut out);
        out
    }

    fn write(&self, depth: usize, out: &mut String) {
        if depth > 0 {
            out.push('\n');
        }
        out.push_str(&"  ".repeat(depth));
        out.push_str(self.type_name());
        let attrs = self.attrs();
        if !attrs.is_empty() {
            out.push('(');
            out.push_str(&attrs.join(", "));
            out.push(')');
        }
        for child in self.children() {
            child.write(depth + 1, out);
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            LogicalPlan::Scan { .. } => "Scan",
            LogicalPlan::Filter { .. } => "Filter",
            LogicalPlan::Project { .. } => "Project",
            LogicalPlan::Aggregate { .. } => "Aggregate",
            LogicalPlan::Sort { .. } => "Sort",
            LogicalPlan::Limit { .. } => "Limit",
            LogicalPlan::Distinct { .. } => "Distinct",
            LogicalPlan::Join { .. } => "Join",
        }
    }

    fn attrs(&self) -> Vec<String> {
        let mut attrs = Vec::new();
        match self {
            LogicalPlan::Scan { table } => {
                attrs.push(format!("table=[{}]", table.name));
            }
            LogicalPlan::Filter { predicate, .. } => {
                attrs.push(format!("condition=[{}]", expr_text(predicate)));
            }
            LogicalPlan::Project { projections, .. } => {
                attrs.push(format!("project=[[{}]]", projections_text(projections)));
            }
            LogicalPlan::Aggregate {
                group_by,
                projections,
                ..
            } => {
                if !group_by.is_empty() {
                    let cols: Vec<String> =
                        group_by.iter().map(|c| format!("${}", c)).collect();
                    attrs.push(format!("group=[[{}]]", cols.join(", ")));
                }
                let aggs = aggregates_text(projections);
                if !aggs.is_empty() {
                    attrs.push(format!("aggs=[[{}]]", aggs));
                }
            }
            LogicalPlan::Sort { order_by, .. } => {
                attrs.push(format!("keys=[[{}]]", keys_text(order_by)));
            }
            LogicalPlan::Limit { limit, offset, .. } => {
                if let Some(limit) = limit {
                    attrs.push(format!("limit=[{}]", limit_text(limit)));
                }
                if let Some(offset) = offset {
                    attrs.push(format!("offset=[{}]", limit_text(offset)));
                }
            }
            LogicalPlan::Distinct { .. } => {}
            LogicalPlan::Join {
                join_type,
                condition,
                filter,
                ..
            } => {
                attrs.push(format!("type=[{}]", join_type.name()));
                if let Some(cond) = condition {
                    attrs.push(format!("condition=[{}]", expr_text(cond)));
                }
                if let Some(cond) = filter {
                    attrs.push(format!("filter=[{}]", expr_text(cond)));
                }
            }
        }
        attrs
    }

    fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Scan { .. } => Vec::new(),
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Distinct { input } => vec![input],
            LogicalPlan::Join { left, right, .. } => vec![left, right],
        }
    }
}

/// Anonymous output columns are labeled `EXPR$0`, `EXPR$1`, ... by
/// zero-based select-list position.
pub(crate) fn output_label(alias: Option<&str>, pos: usize) -> String {
    match alias {
        Some(name) => name.to_string(),
        None => format!("EXPR${}", pos),
    }
}

pub(crate) fn agg_call_text(func: AggFunc, arg: Option<&BoundExpr>) -> String {
    match arg {
        None => format!("{}(*)", func.name()),
        Some(arg) => format!("{}({})", func.name(), expr_text(arg)),
    }
}

/// Full select list, one `expr AS label` entry per position.
pub(crate) fn projections_text(projections: &[BoundProjection]) -> String {
    projections
        .iter()
        .enumerate()
        .map(|(pos, proj)| match proj {
            BoundProjection::Expr { expr, alias } => format!(
                "{} AS {}",
                expr_text(expr),
                output_label(alias.as_deref(), pos)
            ),
            BoundProjection::Aggregate { func, arg, alias } => format!(
                "{} AS {}",
                agg_call_text(*func, arg.as_ref()),
                output_label(alias.as_deref(), pos)
            ),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Aggregate entries only, keeping their select-list positions for
/// labeling.
fn aggregates_text(projections: &[BoundProjection]) -> String {
    projections
        .iter()
        .enumerate()
        .filter_map(|(pos, proj)| match proj {
            BoundProjection::Aggregate { func, arg, alias } => Some(format!(
                "{} AS {}",
                agg_call_text(*func, arg.as_ref()),
                output_label(alias.as_deref(), pos)
            )),
            BoundProjection::Expr { .. } => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn keys_text(order_by: &[BoundOrderBy]) -> String {
    order_by
        .iter()
        .map(|ob| format!("${} {}", ob.column, if ob.asc { "ASC" } else { "DESC" }))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn limit_text(value: &LimitValue) -> String {
    match value {
        LimitValue::Count(n) => n.to_string(),
        LimitValue::Parameter(p) => format!("?{}", p),
    }
}
