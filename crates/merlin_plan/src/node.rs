use merlin_sql_frontend::{AggFunc, BoundExpr, JoinType, LimitValue};

/// A named output column of a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub expr: BoundExpr,
    pub name: String,
}

/// Row-count clause carried by scans, limits, and sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitClause {
    pub limit: Option<LimitValue>,
    pub offset: Option<LimitValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub asc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggExpr {
    pub func: AggFunc,
    pub arg: Option<BoundExpr>,
    pub name: String,
}

/// Aggregation placement in a distributed plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggPhase {
    /// The whole aggregation runs in one place.
    Single,
    /// Per-partition pre-aggregation inside a sub-plan fragment.
    Partial,
    /// Coordinator-side merge of partial results.
    Merge,
}

impl AggPhase {
    pub fn name(&self) -> &'static str {
        match self {
            AggPhase::Single => "SINGLE",
            AggPhase::Partial => "PARTIAL",
            AggPhase::Merge => "MERGE",
        }
    }
}

/// Physical plan node. Expressions reference the input row with `$N`
/// ordinals; scans index their table's columns directly.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    SeqScan {
        table: String,
        filter: Option<BoundExpr>,
        project: Option<Vec<OutputColumn>>,
    },
    /// Filter and/or projection over the input.
    Calc {
        input: Box<PlanNode>,
        condition: Option<BoundExpr>,
        project: Option<Vec<OutputColumn>>,
    },
    Limit {
        input: Box<PlanNode>,
        clause: LimitClause,
    },
    OrderBy {
        input: Box<PlanNode>,
        keys: Vec<SortKey>,
        limit: Option<LimitClause>,
    },
    Aggregate {
        input: Box<PlanNode>,
        phase: AggPhase,
        group_by: Vec<usize>,
        aggs: Vec<AggExpr>,
    },
    Join {
        join_type: JoinType,
        /// The join condition from the ON clause.
        condition: Option<BoundExpr>,
        /// Residual WHERE conjuncts that straddle both inputs.
        filter: Option<BoundExpr>,
        project: Option<Vec<OutputColumn>>,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    Distinct {
        input: Box<PlanNode>,
    },
    /// Sub-plan side of a fragment boundary.
    Send {
        input: Box<PlanNode>,
    },
    /// Coordinator side of a fragment boundary.
    Receive,
    /// Coordinator-side merge of pre-sorted partition streams.
    MergeReceive {
        keys: Vec<SortKey>,
        limit: Option<LimitClause>,
    },
}

impl PlanNode {
    pub fn type_name(&self) -> &'static str {
        match self {
            PlanNode::SeqScan { .. } => "SeqScan",
            PlanNode::Calc { .. } => "Calc",
            PlanNode::Limit { .. } => "Limit",
            PlanNode::OrderBy { .. } => "OrderBy",
            PlanNode::Aggregate { .. } => "Aggregate",
            PlanNode::Join { .. } => "Join",
            PlanNode::Distinct { .. } => "Distinct",
            PlanNode::Send { .. } => "Send",
            PlanNode::Receive => "Receive",
            PlanNode::MergeReceive { .. } => "MergeReceive",
        }
    }

    /// Wire-format node type used in the JSON encoding.
    pub fn json_type(&self) -> &'static str {
        match self {
            PlanNode::SeqScan { .. } => "SEQSCAN",
            PlanNode::Calc { .. } => "CALC",
            PlanNode::Limit { .. } => "LIMIT",
            PlanNode::OrderBy { .. } => "ORDERBY",
            PlanNode::Aggregate { .. } => "AGGREGATE",
            PlanNode::Join { .. } => "JOIN",
            PlanNode::Distinct { .. } => "DISTINCT",
            PlanNode::Send { .. } => "SEND",
            PlanNode::Receive => "RECEIVE",
            PlanNode::MergeReceive { .. } => "MERGERECEIVE",
        }
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::SeqScan { .. } | PlanNode::Receive | PlanNode::MergeReceive { .. } => {
                Vec::new()
            }
            PlanNode::Calc { input, .. }
            | PlanNode::Limit { input, .. }
            | PlanNode::OrderBy { input, .. }
            | PlanNode::Aggregate { input, .. }
            | PlanNode::Distinct { input }
            | PlanNode::Send { input } => vec![input],
            PlanNode::Join { left, right, .. } => vec![left, right],
        }
    }

    /// Name of the scan target, for scan nodes.
    pub fn scan_table(&self) -> Option<&str> {
        match self {
            PlanNode::SeqScan { table, .. } => Some(table.as_str()),
            _ => None,
        }
    }
}
