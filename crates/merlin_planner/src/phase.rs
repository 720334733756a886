//! The staged planning pipeline.
//!
//! Planning is a linear chain of phases folded over a
//! [`PipelineState`]. Each phase consumes the artifacts of earlier
//! ones and deposits its own; [`PipelineState::canonical_text`] is the
//! deterministic digest of whatever artifact a phase produced, which
//! is what gets compared against expectations.

use merlin_plan::text::expr_text;
use merlin_plan::{render_compiled, CompiledPlan};
use merlin_sql_frontend::{BoundSelect, BoundStatement};

use crate::logical_plan::{keys_text, limit_text, projections_text, LogicalPlan};
use crate::routing::RoutingDecision;

/// One stage of the planning pipeline, in execution order. The two
/// physical conversion variants are alternatives for the same slot
/// and share an ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerPhase {
    /// Raw SQL text to AST.
    Parse,
    /// Name resolution against the catalog.
    Validate,
    /// AST to relational tree.
    Convert,
    /// Predicate pushdown over the relational tree.
    LogicalRules,
    /// Partition routing inference; rejects unsupported shapes.
    MpFallbackCheck,
    /// LEFT-to-INNER degradation plus the follow-up pushdown.
    OuterJoinSimplify,
    /// Relational tree to physical operators and fragments.
    PhysicalConversion,
    /// Same, with the join commutation rewrite applied first.
    PhysicalConversionWithJoinCommute,
    /// Merge Calc and Limit nodes into their inputs.
    Inline,
}

impl PlannerPhase {
    /// The full pipeline, with the physical conversion slot picked by
    /// `join_commute`.
    pub fn chain(join_commute: bool) -> [PlannerPhase; 8] {
        [
            PlannerPhase::Parse,
            PlannerPhase::Validate,
            PlannerPhase::Convert,
            PlannerPhase::LogicalRules,
            PlannerPhase::MpFallbackCheck,
            PlannerPhase::OuterJoinSimplify,
            if join_commute {
                PlannerPhase::PhysicalConversionWithJoinCommute
            } else {
                PlannerPhase::PhysicalConversion
            },
            PlannerPhase::Inline,
        ]
    }

    /// Position in the chain. The conversion variants occupy the same
    /// slot.
    pub fn ordinal(&self) -> usize {
        match self {
            PlannerPhase::Parse => 0,
            PlannerPhase::Validate => 1,
            PlannerPhase::Convert => 2,
            PlannerPhase::LogicalRules => 3,
            PlannerPhase::MpFallbackCheck => 4,
            PlannerPhase::OuterJoinSimplify => 5,
            PlannerPhase::PhysicalConversion
            | PlannerPhase::PhysicalConversionWithJoinCommute => 6,
            PlannerPhase::Inline => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlannerPhase::Parse => "PARSE",
            PlannerPhase::Validate => "VALIDATE",
            PlannerPhase::Convert => "CONVERT",
            PlannerPhase::LogicalRules => "LOGICAL_RULES",
            PlannerPhase::MpFallbackCheck => "MP_FALLBACK_CHECK",
            PlannerPhase::OuterJoinSimplify => "OUTER_JOIN_SIMPLIFY",
            PlannerPhase::PhysicalConversion => "PHYSICAL_CONVERSION",
            PlannerPhase::PhysicalConversionWithJoinCommute => {
                "PHYSICAL_CONVERSION_WITH_JOIN_COMMUTE"
            }
            PlannerPhase::Inline => "INLINE",
        }
    }
}

/// Artifacts accumulated while folding the phase chain over one
/// statement. Every field is filled by exactly one phase; the routing
/// decision is consumed by physical conversion.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub statement: Option<sqlparser::ast::Statement>,
    pub bound: Option<BoundStatement>,
    pub logical: Option<LogicalPlan>,
    pub routing: Option<RoutingDecision>,
    pub compiled: Option<CompiledPlan>,
}

impl PipelineState {
    /// Drop every artifact, returning to the pre-parse state.
    pub fn clear(&mut self) {
        *self = PipelineState::default();
    }

    /// Deterministic digest of the artifact `phase` produced, or
    /// `None` when that phase has not run.
    pub fn canonical_text(&self, phase: PlannerPhase) -> Option<String> {
        match phase {
            PlannerPhase::Parse => self.statement.as_ref().map(|s| s.to_string()),
            PlannerPhase::Validate => self.bound.as_ref().map(describe_bound),
            PlannerPhase::Convert
            | PlannerPhase::LogicalRules
            | PlannerPhase::MpFallbackCheck
            | PlannerPhase::OuterJoinSimplify => self.logical.as_ref().map(LogicalPlan::render),
            PlannerPhase::PhysicalConversion
            | PlannerPhase::PhysicalConversionWithJoinCommute
            | PlannerPhase::Inline => self.compiled.as_ref().map(render_compiled),
        }
    }
}

fn describe_bound(stmt: &BoundStatement) -> String {
    match stmt {
        BoundStatement::Select(sel) => describe_select(sel),
    }
}

/// One-line digest of a bound select: clauses in declaration order,
/// empty ones omitted.
fn describe_select(sel: &BoundSelect) -> String {
    let mut parts = Vec::new();
    let mut tables = vec![sel.base.name.as_str()];
    tables.extend(sel.joins.iter().map(|j| j.table.name.as_str()));
    parts.push(format!("from=[{}]", tables.join(", ")));
    if sel.distinct {
        parts.push("distinct".to_string());
    }
    parts.push(format!("project=[[{}]]", projections_text(&sel.projections)));
    if let Some(filter) = &sel.filter {
        parts.push(format!("filter=[{}]", expr_text(filter)));
    }
    if !sel.group_by.is_empty() {
        let cols: Vec<String> = sel.group_by.iter().map(|c| format!("${}", c)).collect();
        parts.push(format!("group=[[{}]]", cols.join(", ")));
    }
    if !sel.order_by.is_empty() {
        parts.push(format!("order=[[{}]]", keys_text(&sel.order_by)));
    }
    if let Some(limit) = &sel.limit {
        parts.push(format!("limit=[{}]", limit_text(limit)));
    }
    if let Some(offset) = &sel.offset {
        parts.push(format!("offset=[{}]", limit_text(offset)));
    }
    format!("Select({})", parts.join(", "))
}
