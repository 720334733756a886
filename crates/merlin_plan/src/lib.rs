//! Physical plan vocabulary shared by both planners: the node tree,
//! node id allocation, deterministic text rendering, and the JSON
//! encoding used for exact plan expectations.

pub mod compiled;
pub mod ids;
pub mod json;
pub mod node;
pub mod text;

pub use compiled::{CompiledPlan, PlanAttributes};
pub use ids::IdAllocator;
pub use json::{compiled_to_json, plan_to_json, JsonCompiledPlan, JsonPlan, JsonPlanNode};
pub use node::{AggExpr, AggPhase, LimitClause, OutputColumn, PlanNode, SortKey};
pub use text::{render, render_compiled, render_numbered};
