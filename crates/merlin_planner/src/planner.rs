//! The planning session: a catalog reference plus optimizer
//! configuration, folding the phase chain over a [`PipelineState`].

use merlin_common::error::{SqlError, SqlResult};
use merlin_common::schema::Catalog;
use merlin_plan::CompiledPlan;
use merlin_sql_frontend::{parse_one, Binder, BoundStatement};
use tracing::debug;

use crate::logical_plan::LogicalPlan;
use crate::optimizer::{
    rule_commute_join, rule_predicate_pushdown, rule_simplify_outer_joins, OptimizerConfig,
};
use crate::phase::{PipelineState, PlannerPhase};
use crate::{physical, routing};

/// Stateless planning facade. A session borrows the catalog and
/// carries configuration only; every statement runs in a fresh
/// [`PipelineState`], so nothing leaks between statements.
pub struct MerlinSession<'a> {
    catalog: &'a Catalog,
    config: OptimizerConfig,
}

impl<'a> MerlinSession<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        MerlinSession {
            catalog,
            config: OptimizerConfig::default(),
        }
    }

    pub fn with_config(catalog: &'a Catalog, config: OptimizerConfig) -> Self {
        MerlinSession { catalog, config }
    }

    /// Run the standard chain end to end and return the final plan.
    pub fn compile(&self, sql: &str) -> SqlResult<CompiledPlan> {
        let mut state = PipelineState::default();
        for phase in PlannerPhase::chain(false) {
            self.apply_phase(sql, &mut state, phase)?;
        }
        take_required(&mut state.compiled, "compiled plan")
    }

    /// Apply one phase to the accumulated state. Callers drive the
    /// chain in order; a phase finding its inputs missing reports the
    /// misuse as a planning error rather than panicking.
    pub fn apply_phase(
        &self,
        sql: &str,
        state: &mut PipelineState,
        phase: PlannerPhase,
    ) -> SqlResult<()> {
        debug!(phase = phase.name(), "applying planner phase");
        match phase {
            PlannerPhase::Parse => {
                state.statement = Some(parse_one(sql)?);
            }
            PlannerPhase::Validate => {
                let statement = required(&state.statement, "statement")?;
                let mut binder = Binder::new(self.catalog);
                state.bound = Some(binder.bind(statement)?);
            }
            PlannerPhase::Convert => {
                let bound = required(&state.bound, "bound statement")?;
                state.logical = Some(LogicalPlan::from_bound(bound));
            }
            PlannerPhase::LogicalRules => {
                let logical = take_required(&mut state.logical, "relational tree")?;
                state.logical = Some(if self.config.predicate_pushdown {
                    rule_predicate_pushdown(logical)
                } else {
                    logical
                });
            }
            PlannerPhase::MpFallbackCheck => {
                let bound = required(&state.bound, "bound statement")?;
                state.routing = Some(routing::infer(bound)?);
            }
            PlannerPhase::OuterJoinSimplify => {
                let logical = take_required(&mut state.logical, "relational tree")?;
                state.logical = Some(if self.config.outer_join_simplify {
                    let plan = rule_simplify_outer_joins(logical);
                    // Re-place the conjuncts the LEFT joins had blocked.
                    if self.config.predicate_pushdown {
                        rule_predicate_pushdown(plan)
                    } else {
                        plan
                    }
                } else {
                    logical
                });
            }
            PlannerPhase::PhysicalConversion => self.convert_physical(state, false)?,
            PlannerPhase::PhysicalConversionWithJoinCommute => {
                self.convert_physical(state, true)?;
            }
            PlannerPhase::Inline => {
                let compiled = take_required(&mut state.compiled, "physical plan")?;
                state.compiled = Some(physical::inline(compiled));
            }
        }
        Ok(())
    }

    fn convert_physical(&self, state: &mut PipelineState, commute: bool) -> SqlResult<()> {
        let routing = *required(&state.routing, "routing decision")?;
        let logical = take_required(&mut state.logical, "relational tree")?;
        let logical = if commute {
            rule_commute_join(logical)
        } else {
            logical
        };
        let bound = required(&state.bound, "bound statement")?;
        let built = match bound {
            BoundStatement::Select(sel) => physical::build(&logical, sel, routing),
        };
        state.compiled = Some(built);
        state.logical = Some(logical);
        Ok(())
    }
}

fn out_of_order(what: &str) -> SqlError {
    SqlError::planning(format!(
        "{} not available, phases applied out of order",
        what
    ))
}

fn required<'s, T>(slot: &'s Option<T>, what: &str) -> SqlResult<&'s T> {
    slot.as_ref().ok_or_else(|| out_of_order(what))
}

fn take_required<T>(slot: &mut Option<T>, what: &str) -> SqlResult<T> {
    slot.take().ok_or_else(|| out_of_order(what))
}
