use crate::node::PlanNode;

/// Plan-level attributes compared alongside the tree shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanAttributes {
    pub read_only: bool,
    /// Whether the output row order is fully determined by the plan.
    pub order_deterministic: bool,
}

/// A finished plan: the coordinator tree, plus a per-partition
/// sub-plan fragment when the statement is multi-partition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    pub root: PlanNode,
    pub subplan: Option<PlanNode>,
    pub attributes: PlanAttributes,
}

impl CompiledPlan {
    pub fn single_partition(root: PlanNode, attributes: PlanAttributes) -> Self {
        CompiledPlan {
            root,
            subplan: None,
            attributes,
        }
    }

    pub fn multi_partition(root: PlanNode, subplan: PlanNode, attributes: PlanAttributes) -> Self {
        CompiledPlan {
            root,
            subplan: Some(subplan),
            attributes,
        }
    }

    pub fn is_multi_partition(&self) -> bool {
        self.subplan.is_some()
    }
}
