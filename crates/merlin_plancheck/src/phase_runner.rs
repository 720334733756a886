//! Phase-by-phase assertions against the rule-based planner.
//!
//! The runner drives one statement through the planner's phase chain
//! and checks expectations at a single declared target phase. Every
//! entry point rebuilds the whole chain from the raw statement, so a
//! check at a late phase always exercises the earlier ones too.
//!
//! A phase's output can be pinned to a set of acceptable strings
//! rather than exactly one; rule rewrites sometimes have more than
//! one correct answer (join orders most of all), and any member of
//! the set counts as a pass. When none match, the failure carries the
//! last candidate tried so the report shows a concrete diff.

use merlin_common::error::{ErrorKind, SqlError};
use merlin_common::schema::Catalog;
use merlin_plan::{compiled_to_json, render_numbered, CompiledPlan, IdAllocator};
use merlin_planner::{MerlinSession, PipelineState, PlannerPhase};

use crate::error::CheckError;
use crate::normalize::strip_node_ids;

/// The declared way a phase is allowed to fail.
#[derive(Debug, Clone)]
enum ErrorExpectation {
    /// Substring containment over the full rendered error.
    Message(String),
    /// Error kind plus message prefix.
    Kind { kind: ErrorKind, prefix: String },
}

impl ErrorExpectation {
    fn check(&self, err: &SqlError) -> Result<(), CheckError> {
        let matched = match self {
            ErrorExpectation::Message(substring) => err.to_string().contains(substring.as_str()),
            ErrorExpectation::Kind { kind, prefix } => {
                err.kind() == *kind && err.message().starts_with(prefix.as_str())
            }
        };
        if matched {
            Ok(())
        } else {
            Err(CheckError::ExpectedExceptionMismatch(format!(
                "expected {}, got \"{}\"",
                self.describe(),
                err
            )))
        }
    }

    fn describe(&self) -> String {
        match self {
            ErrorExpectation::Message(substring) => {
                format!("an error containing {:?}", substring)
            }
            ErrorExpectation::Kind { kind, prefix } => {
                format!("a {:?} error starting with {:?}", kind, prefix)
            }
        }
    }
}

/// Builder-style test driver for the planner phase chain.
pub struct PhaseRunner<'a> {
    session: MerlinSession<'a>,
    ids: IdAllocator,
    state: PipelineState,
    sql: String,
    target: Option<PlannerPhase>,
    commute: bool,
    expected_texts: Vec<String>,
    expected_json: Vec<String>,
    expected_error: Option<ErrorExpectation>,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        PhaseRunner {
            session: MerlinSession::new(catalog),
            ids: IdAllocator::new(),
            state: PipelineState::default(),
            sql: String::new(),
            target: None,
            commute: false,
            expected_texts: Vec::new(),
            expected_json: Vec::new(),
            expected_error: None,
        }
    }

    /// The statement to drive through the chain.
    pub fn sql(&mut self, sql: impl Into<String>) -> &mut Self {
        self.sql = sql.into();
        self
    }

    /// The phase whose output is checked, or, for [`Self::fail`], the
    /// phase expected to reject the statement.
    pub fn phase(&mut self, phase: PlannerPhase) -> &mut Self {
        self.target = Some(phase);
        self
    }

    /// Run the chain variant that tries commuting joins.
    pub fn join_commute(&mut self) -> &mut Self {
        self.commute = true;
        self
    }

    /// Add an acceptable canonical plan text for the target phase.
    /// Call repeatedly to accept any of several renderings.
    pub fn expect_plan(&mut self, text: impl Into<String>) -> &mut Self {
        self.expected_texts.push(text.into());
        self
    }

    /// Add an acceptable intermediate transform text. Same comparison
    /// as [`Self::expect_plan`]; the name marks pre-physical phases.
    pub fn expect_transform(&mut self, text: impl Into<String>) -> &mut Self {
        self.expect_plan(text)
    }

    /// Add an acceptable compact JSON encoding for the target phase.
    /// Node ids in the encoding restart at 1 for every statement.
    pub fn expect_json(&mut self, json: impl Into<String>) -> &mut Self {
        self.expected_json.push(json.into());
        self
    }

    /// Declare the failure as any error whose rendering contains the
    /// substring.
    pub fn expect_error_containing(&mut self, substring: impl Into<String>) -> &mut Self {
        self.expected_error = Some(ErrorExpectation::Message(substring.into()));
        self
    }

    /// Declare the failure by error kind and message prefix.
    pub fn expect_error(&mut self, kind: ErrorKind, prefix: impl Into<String>) -> &mut Self {
        self.expected_error = Some(ErrorExpectation::Kind {
            kind,
            prefix: prefix.into(),
        });
        self
    }

    /// Run the full chain, checking expectations at the target phase.
    ///
    /// With a declared error the chain must raise it somewhere; with
    /// none, any raise is an unexpected failure.
    pub fn pass(&mut self) -> Result<(), CheckError> {
        self.state.clear();
        self.ids.reset();
        for phase in PlannerPhase::chain(self.wants_commute()) {
            if let Err(err) = self.session.apply_phase(&self.sql, &mut self.state, phase) {
                return match &self.expected_error {
                    Some(expectation) => expectation.check(&err),
                    None => Err(CheckError::UnexpectedException {
                        phase: phase.name(),
                        source: err,
                    }),
                };
            }
            if self.at_target(phase) {
                self.check_expectations(phase)?;
            }
        }
        match &self.expected_error {
            Some(expectation) => Err(CheckError::ExpectedExceptionMismatch(format!(
                "expected {} but every phase passed",
                expectation.describe()
            ))),
            None => Ok(()),
        }
    }

    /// Run the chain up to the target phase, which must reject the
    /// statement. Earlier phases must still succeed.
    pub fn fail(&mut self) -> Result<(), CheckError> {
        let target = match self.target {
            Some(target) => target,
            None => {
                return Err(CheckError::ExpectedExceptionMismatch(
                    "no failing phase declared".to_string(),
                ))
            }
        };
        self.state.clear();
        self.ids.reset();
        for phase in PlannerPhase::chain(self.wants_commute()) {
            let result = self.session.apply_phase(&self.sql, &mut self.state, phase);
            if phase.ordinal() < target.ordinal() {
                result.map_err(|source| CheckError::UnexpectedException {
                    phase: phase.name(),
                    source,
                })?;
                continue;
            }
            return match result {
                Ok(()) => Err(CheckError::ExpectedExceptionMismatch(format!(
                    "phase {} was expected to fail but passed",
                    phase.name()
                ))),
                Err(err) => match &self.expected_error {
                    Some(expectation) => expectation.check(&err),
                    None => Ok(()),
                },
            };
        }
        // Target ordinals all lie inside the chain, so the loop
        // returns before getting here.
        Err(CheckError::ExpectedExceptionMismatch(
            "declared failing phase never ran".to_string(),
        ))
    }

    /// Forget the current statement: pipeline artifacts, expectations,
    /// and the node id allocator. The planner session stays.
    pub fn reset(&mut self) {
        self.state.clear();
        self.ids.reset();
        self.sql.clear();
        self.target = None;
        self.commute = false;
        self.expected_texts.clear();
        self.expected_json.clear();
        self.expected_error = None;
    }

    fn wants_commute(&self) -> bool {
        self.commute
            || matches!(
                self.target,
                Some(PlannerPhase::PhysicalConversionWithJoinCommute)
            )
    }

    fn at_target(&self, phase: PlannerPhase) -> bool {
        self.target
            .map(|target| target.ordinal() == phase.ordinal())
            .unwrap_or(false)
    }

    fn check_expectations(&mut self, phase: PlannerPhase) -> Result<(), CheckError> {
        if !self.expected_texts.is_empty() {
            let actual = self.transform_text(phase)?;
            any_of(&self.expected_texts, &actual)?;
        }
        if !self.expected_json.is_empty() {
            let actual = self.json_text(phase)?;
            any_of(&self.expected_json, &actual)?;
        }
        Ok(())
    }

    /// The comparable text of the target phase's artifact. The inlined
    /// plan renders with node id stamps drawn from a freshly reset
    /// allocator, and the stamps are erased again before comparison;
    /// expectation strings never mention ids.
    fn transform_text(&mut self, phase: PlannerPhase) -> Result<String, CheckError> {
        match phase {
            PlannerPhase::Inline => {
                let compiled = match &self.state.compiled {
                    Some(compiled) => compiled,
                    None => return Err(missing_artifact(phase)),
                };
                self.ids.reset();
                Ok(strip_node_ids(&numbered_text(compiled, &mut self.ids)))
            }
            _ => self
                .state
                .canonical_text(phase)
                .ok_or_else(|| missing_artifact(phase)),
        }
    }

    fn json_text(&mut self, phase: PlannerPhase) -> Result<String, CheckError> {
        let compiled = match &self.state.compiled {
            Some(compiled) => compiled,
            None => return Err(missing_artifact(phase)),
        };
        self.ids.reset();
        Ok(compiled_to_json(compiled, &mut self.ids).to_string_compact())
    }
}

/// First acceptable string that matches the actual output wins; when
/// none do, the failure reports the last candidate tried.
fn any_of(expected: &[String], actual: &str) -> Result<(), CheckError> {
    let mut last_failure = None;
    for candidate in expected {
        if candidate.as_str() == actual {
            return Ok(());
        }
        last_failure = Some(CheckError::TreeMismatch {
            expected: candidate.clone(),
            actual: actual.to_string(),
        });
    }
    match last_failure {
        None => Ok(()),
        Some(failure) => Err(failure),
    }
}

fn numbered_text(plan: &CompiledPlan, ids: &mut IdAllocator) -> String {
    match &plan.subplan {
        None => render_numbered(&plan.root, ids),
        Some(subplan) => format!(
            "{}\n{}",
            render_numbered(&plan.root, ids),
            render_numbered(subplan, ids)
        ),
    }
}

fn missing_artifact(phase: PlannerPhase) -> CheckError {
    CheckError::ExpectedExceptionMismatch(format!(
        "no artifact to compare at phase {}",
        phase.name()
    ))
}
