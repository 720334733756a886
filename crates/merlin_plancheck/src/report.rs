//! Mismatch reports.
//!
//! A report is the only thing a divergence produces: the statement
//! text plus one diagnostic block per finding. Reports are append-only
//! while a comparison runs and print-only afterwards. They go to the
//! diagnostic stream directly, not through the log layer, so that a
//! quiet log configuration can never swallow a divergence.

use std::io::{self, Write};

use crate::error::CheckError;

/// All findings for one diverging statement.
#[derive(Debug, Default)]
pub struct MismatchReport {
    statement: String,
    lines: Vec<String>,
}

impl MismatchReport {
    pub fn new(statement: impl Into<String>) -> Self {
        MismatchReport {
            statement: statement.into(),
            lines: Vec::new(),
        }
    }

    /// Record a finding. The order of calls is the order printed.
    pub fn append(&mut self, finding: &CheckError) {
        self.lines.push(finding.to_string());
    }

    /// Record a free-form context line under the previous finding.
    pub fn append_detail(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Print the statement followed by every finding.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.statement)?;
        for line in &self.lines {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_prints_statement_then_findings() {
        let mut report = MismatchReport::new("select a from t");
        report.append(&CheckError::FilterRejection);
        report.append_detail("joins: 0 vs 1");
        let mut out = Vec::new();
        report.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "select a from t\nstatement is outside the comparison allow-list\njoins: 0 vs 1\n"
        );
    }

    #[test]
    fn test_empty_report_has_no_findings() {
        let report = MismatchReport::new("select 1");
        assert!(report.is_empty());
        assert_eq!(report.lines().len(), 0);
    }
}
