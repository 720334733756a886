//! Batch execution over statement files.
//!
//! One statement per line; a trailing terminator is tolerated. Blank
//! lines are ignored and ineligible or uncompilable statements are
//! skipped silently, so a batch mixing DDL with queries runs clean end
//! to end. Divergence reports print as they are found; a run with no
//! output means every compared statement agreed.

use std::io::{self, BufRead, Write};

use merlin_common::schema::Catalog;
use tracing::{debug, info};

use crate::compiler::DualPlanCompiler;
use crate::differ;
use crate::report::MismatchReport;

/// What checking one statement produced.
#[derive(Debug)]
pub enum StatementOutcome {
    /// Both sides agreed; nothing to say.
    Agreed,
    /// Filtered out or refused by a planner; dropped silently.
    Skipped,
    /// A reportable divergence.
    Mismatch(MismatchReport),
}

/// One statement through one comparison strategy.
pub trait StatementChecker {
    fn check_statement(&self, sql: &str) -> StatementOutcome;
}

/// Full-plan comparison: trees, fragments, and attributes.
pub struct PlanChecker<'a> {
    compiler: DualPlanCompiler<'a>,
}

impl<'a> PlanChecker<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        PlanChecker {
            compiler: DualPlanCompiler::new(catalog),
        }
    }
}

impl StatementChecker for PlanChecker<'_> {
    fn check_statement(&self, sql: &str) -> StatementOutcome {
        let sides = match self.compiler.compile_sides(sql) {
            Ok(sides) => sides,
            Err(_) => return StatementOutcome::Skipped,
        };
        if let Some(report) = sides.downgrade_report() {
            return StatementOutcome::Mismatch(report);
        }
        match sides.into_pair() {
            Ok(pair) => match differ::diff(&pair) {
                Some(report) => StatementOutcome::Mismatch(report),
                None => StatementOutcome::Agreed,
            },
            Err(_) => StatementOutcome::Skipped,
        }
    }
}

/// Statement counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub seen: usize,
    pub compared: usize,
    pub mismatched: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn found_divergence(&self) -> bool {
        self.mismatched > 0
    }
}

/// Drives a checker over input, printing reports as they are found.
pub struct BatchDriver<C> {
    checker: C,
}

impl<C: StatementChecker> BatchDriver<C> {
    pub fn new(checker: C) -> Self {
        BatchDriver { checker }
    }

    /// Check a single statement.
    pub fn run_statement(&self, sql: &str, out: &mut dyn Write) -> io::Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        self.record(&mut summary, sql, out)?;
        Ok(summary)
    }

    /// Check one statement per line, recovering after every statement.
    pub fn run_lines<R: BufRead>(
        &self,
        input: R,
        out: &mut dyn Write,
    ) -> io::Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        for line in input.lines() {
            let line = line?;
            let statement = line.trim();
            if statement.is_empty() {
                continue;
            }
            self.record(&mut summary, statement, out)?;
        }
        info!(
            seen = summary.seen,
            compared = summary.compared,
            mismatched = summary.mismatched,
            skipped = summary.skipped,
            "batch finished"
        );
        Ok(summary)
    }

    fn record(
        &self,
        summary: &mut BatchSummary,
        statement: &str,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        debug!(statement, "checking statement");
        summary.seen += 1;
        match self.checker.check_statement(statement) {
            StatementOutcome::Agreed => summary.compared += 1,
            StatementOutcome::Skipped => summary.skipped += 1,
            StatementOutcome::Mismatch(report) => {
                summary.compared += 1;
                summary.mismatched += 1;
                report.write_to(out)?;
            }
        }
        Ok(())
    }
}
