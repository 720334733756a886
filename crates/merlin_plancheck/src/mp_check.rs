//! Routing consistency between the planners.
//!
//! Plan shape aside, both planners must agree on whether a statement
//! runs single-partition or multi-partition; a disagreement means one
//! of them will either scatter a query that could stay local or, far
//! worse, run a query on one partition that needed data from all of
//! them. This checker compares only that decision.

use merlin_common::schema::Catalog;
use merlin_plan::CompiledPlan;

use crate::batch::{StatementChecker, StatementOutcome};
use crate::compiler::DualPlanCompiler;
use crate::report::MismatchReport;

/// How the two routing decisions relate for one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingAgreement {
    BothSinglePartition,
    BothMultiPartition,
    Disagree,
}

impl RoutingAgreement {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingAgreement::BothSinglePartition => "BOTH_SP",
            RoutingAgreement::BothMultiPartition => "BOTH_MP",
            RoutingAgreement::Disagree => "DISAGREE",
        }
    }
}

/// Classify how two compiled plans route.
pub fn classify_routing(alder: &CompiledPlan, merlin: &CompiledPlan) -> RoutingAgreement {
    match (alder.is_multi_partition(), merlin.is_multi_partition()) {
        (false, false) => RoutingAgreement::BothSinglePartition,
        (true, true) => RoutingAgreement::BothMultiPartition,
        _ => RoutingAgreement::Disagree,
    }
}

/// Checks only the routing decision, not plan content.
///
/// Alder's distributed-unsupported rejection counts as its
/// multi-partition verdict rather than a compile failure, so a
/// statement alder refuses and merlin scatters is agreement, while a
/// statement alder refuses and merlin keeps on one partition is the
/// silent downgrade this checker exists to catch.
pub struct MpConsistencyChecker<'a> {
    compiler: DualPlanCompiler<'a>,
}

impl<'a> MpConsistencyChecker<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        MpConsistencyChecker {
            compiler: DualPlanCompiler::new(catalog),
        }
    }
}

impl StatementChecker for MpConsistencyChecker<'_> {
    fn check_statement(&self, sql: &str) -> StatementOutcome {
        let sides = match self.compiler.compile_sides(sql) {
            Ok(sides) => sides,
            Err(_) => return StatementOutcome::Skipped,
        };
        if let Some(report) = sides.downgrade_report() {
            return StatementOutcome::Mismatch(report);
        }
        match (&sides.alder, &sides.merlin) {
            (Ok(alder), Ok(merlin)) => match classify_routing(alder, merlin) {
                RoutingAgreement::Disagree => {
                    let mut report = MismatchReport::new(&sides.statement);
                    report.append_detail(format!(
                        "routing disagreement: alder planned {}, merlin planned {}",
                        partition_label(alder),
                        partition_label(merlin)
                    ));
                    StatementOutcome::Mismatch(report)
                }
                _ => StatementOutcome::Agreed,
            },
            (Err(err), Ok(merlin))
                if alder_planner::is_distributed_unsupported(err)
                    && merlin.is_multi_partition() =>
            {
                StatementOutcome::Agreed
            }
            _ => StatementOutcome::Skipped,
        }
    }
}

fn partition_label(plan: &CompiledPlan) -> &'static str {
    if plan.is_multi_partition() {
        "multi-partition"
    } else {
        "single-partition"
    }
}
