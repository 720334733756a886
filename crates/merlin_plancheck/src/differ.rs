//! Plan comparison.
//!
//! Equality is textual: both trees render through the shared
//! deterministic format, the rule-based side is normalized to the
//! legacy column-name convention, and the strings must match exactly.
//! A mismatch report always carries both full renderings, never a
//! partial diff, so a failure is debuggable from the report alone.

use merlin_plan::{render, PlanNode};

use crate::compiler::CompiledPlanPair;
use crate::error::CheckError;
use crate::normalize::normalize_columns;
use crate::report::MismatchReport;

/// Compare both plans for one statement. `None` means they agree.
pub fn diff(pair: &CompiledPlanPair) -> Option<MismatchReport> {
    let mut report = MismatchReport::new(&pair.statement);

    // A one-part/two-part split is a routing divergence in its own
    // right, reported before any content comparison. Fragment content
    // is only compared when both sides have a fragment.
    if pair.alder.is_multi_partition() != pair.merlin.is_multi_partition() {
        report.append(&CheckError::TwoPartMismatch {
            alder: part_shape(pair.alder.is_multi_partition()),
            merlin: part_shape(pair.merlin.is_multi_partition()),
        });
    }

    compare_trees(&pair.alder.root, &pair.merlin.root, &mut report);
    if let (Some(alder), Some(merlin)) = (&pair.alder.subplan, &pair.merlin.subplan) {
        compare_trees(alder, merlin, &mut report);
    }

    // Attributes are checked independently of the tree outcome; a
    // shape mismatch does not excuse an attribute mismatch.
    if pair.alder.attributes != pair.merlin.attributes {
        report.append(&CheckError::AttributeMismatch {
            alder: pair.alder.attributes,
            merlin: pair.merlin.attributes,
        });
    }

    if report.is_empty() {
        None
    } else {
        Some(report)
    }
}

fn compare_trees(alder: &PlanNode, merlin: &PlanNode, report: &mut MismatchReport) {
    let expected = render(alder);
    let actual = normalize_columns(&render(merlin));
    if expected == actual {
        return;
    }
    report.append(&CheckError::TreeMismatch { expected, actual });
    report.append_detail(format!(
        "scans: [{}] vs [{}]",
        scan_summary(alder),
        scan_summary(merlin)
    ));
    report.append_detail(format!(
        "join nodes: {} vs {}",
        join_count(alder),
        join_count(merlin)
    ));
}

fn part_shape(multi_partition: bool) -> &'static str {
    if multi_partition {
        "two-part"
    } else {
        "one-part"
    }
}

/// Scan targets in tree order, each with its scan kind.
fn scan_summary(node: &PlanNode) -> String {
    let mut scans = Vec::new();
    collect_scans(node, &mut scans);
    scans.join(", ")
}

fn collect_scans(node: &PlanNode, out: &mut Vec<String>) {
    if let Some(table) = node.scan_table() {
        out.push(format!("{} ({})", table, node.type_name()));
    }
    for child in node.children() {
        collect_scans(child, out);
    }
}

fn join_count(node: &PlanNode) -> usize {
    let own = matches!(node, PlanNode::Join { .. }) as usize;
    node.children()
        .into_iter()
        .map(join_count)
        .sum::<usize>()
        + own
}
