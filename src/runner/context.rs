//! The execution context a test body drives during one run-through.
//!
//! Bodies never see the runner. They receive a `&mut Context` and call
//! explicit methods on it: [`Context::section`] to open a section,
//! [`Context::require`] / [`Context::check`] / [`Context::evaluate`] for
//! assertions, and [`Context::warn`] / [`Context::info`] for log entries.
//! Fatal outcomes come back as `Err(Abort)` so bodies can propagate them with
//! `?` and unwind the current path without panicking.

use log::trace;

use crate::report::{AssertKind, AssertionRecord, Location, Outcome, Record};
use crate::runner::tracker::{RunSummary, SectionTracker};

/// Signal that the current path must stop executing.
///
/// The record explaining why has already been written to the context by the
/// time an `Abort` is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abort {
    /// A `REQUIRE` failed or `FAIL` was called.
    Failed,
    /// An unexpected error stopped the body.
    Errored,
}

/// One assertion as handed to [`Context::evaluate`].
#[derive(Debug, Clone)]
pub struct Assertion {
    pub kind: AssertKind,
    /// Value of the asserted expression, before `*_FALSE` negation.
    pub value: bool,
    pub original: String,
    pub expanded: Option<String>,
    pub location: Location,
}

impl Assertion {
    pub fn new(kind: AssertKind, value: bool, original: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            value,
            original: original.into(),
            expanded: None,
            location,
        }
    }

    /// Sets the operand-expanded form, e.g. `43 == 42`.
    pub fn with_expansion(mut self, expanded: impl Into<String>) -> Self {
        self.expanded = Some(expanded.into());
        self
    }

    pub fn passed(&self) -> bool {
        self.value != self.kind.is_negated()
    }
}

#[derive(Debug)]
struct PendingInfo {
    message: String,
    /// Whether the `Info` record has been written for this message yet.
    emitted: bool,
}

/// Scope for `INFO` messages: the case body or one section.
#[derive(Debug, Default)]
struct InfoScope {
    pending: Option<PendingInfo>,
}

#[derive(Debug)]
pub struct Context {
    tracker: SectionTracker,
    records: Vec<Record>,
    scopes: Vec<InfoScope>,
}

impl Context {
    pub(crate) fn new(case_name: &str) -> Self {
        Self {
            tracker: SectionTracker::new(case_name),
            records: Vec::new(),
            scopes: Vec::new(),
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.tracker.is_complete()
    }

    pub(crate) fn runs(&self) -> usize {
        self.tracker.runs()
    }

    /// Resets per-path state before the body is called again.
    pub(crate) fn begin_path(&mut self) {
        self.tracker.start_run();
        self.records.clear();
        self.scopes.clear();
        self.scopes.push(InfoScope::default());
    }

    /// Closes the run-through and hands back what it executed and recorded.
    /// `finished` is false when the body aborted or panicked.
    pub(crate) fn finish_path(&mut self, finished: bool) -> (RunSummary, Vec<Record>) {
        self.scopes.clear();
        let summary = self.tracker.end_run(finished);
        (summary, std::mem::take(&mut self.records))
    }

    // ========================================================================
    // SECTIONS
    // ========================================================================

    /// Runs `body` as the section `name` if the tracker selects it for this
    /// run-through. Skipped sections return `Ok(())` without calling `body`.
    pub fn section<F>(&mut self, name: &str, body: F) -> Result<(), Abort>
    where
        F: FnOnce(&mut Context) -> Result<(), Abort>,
    {
        let Some(id) = self.tracker.try_enter(name) else {
            return Ok(());
        };
        self.scopes.push(InfoScope::default());
        let result = body(self);
        self.scopes.pop();
        self.tracker.leave(id, result.is_ok());
        result
    }

    // ========================================================================
    // ASSERTIONS
    // ========================================================================

    /// Records an assertion. A failed `REQUIRE*` returns `Err(Abort::Failed)`;
    /// a failed `CHECK*` returns `Ok(Outcome::Fail)` and the path continues.
    pub fn evaluate(&mut self, assertion: Assertion) -> Result<Outcome, Abort> {
        let passed = assertion.passed();
        let info = self.attach_infos();
        let expanded = match assertion.expanded {
            Some(text) if assertion.kind.is_negated() && text.contains(' ') => {
                format!("!({})", text)
            }
            Some(text) if assertion.kind.is_negated() => format!("!{}", text),
            Some(text) => text,
            None if assertion.kind.is_negated() => format!("!{}", assertion.value),
            None => assertion.value.to_string(),
        };
        trace!(
            "{}({}) at {} -> {}",
            assertion.kind,
            assertion.original,
            assertion.location,
            passed
        );
        let fatal = assertion.kind.is_fatal();
        self.records.push(Record::Assertion(AssertionRecord {
            kind: assertion.kind,
            passed,
            original: assertion.original,
            expanded,
            location: assertion.location,
            info,
        }));

        match (passed, fatal) {
            (true, _) => Ok(Outcome::Pass),
            (false, false) => Ok(Outcome::Fail),
            (false, true) => Err(Abort::Failed),
        }
    }

    /// `REQUIRE(expr)`: aborts the path when `passed` is false.
    pub fn require(&mut self, passed: bool, expr: &str, location: Location) -> Result<(), Abort> {
        self.evaluate(Assertion::new(AssertKind::Require, passed, expr, location))
            .map(|_| ())
    }

    /// `CHECK(expr)`: records the outcome and returns it.
    pub fn check(&mut self, passed: bool, expr: &str, location: Location) -> bool {
        matches!(
            self.evaluate(Assertion::new(AssertKind::Check, passed, expr, location)),
            Ok(Outcome::Pass)
        )
    }

    /// `FAIL(message)`. Callers return the result: `return Err(ctx.fail(..))`.
    pub fn fail(&mut self, message: impl Into<String>, location: Location) -> Abort {
        self.records.push(Record::Failure {
            message: message.into(),
            location,
        });
        Abort::Failed
    }

    /// `FAIL_CHECK(message)`: a forced failure that lets the path continue.
    pub fn fail_check(&mut self, message: impl Into<String>, location: Location) {
        self.records.push(Record::Failure {
            message: message.into(),
            location,
        });
    }

    pub fn succeed(&mut self, message: impl Into<String>, location: Location) {
        self.records.push(Record::Success {
            message: message.into(),
            location,
        });
    }

    /// Records an unexpected error and returns the abort signal for it.
    pub fn error(&mut self, message: impl Into<String>, location: Option<Location>) -> Abort {
        self.records.push(Record::Error {
            message: message.into(),
            location,
        });
        Abort::Errored
    }

    // ========================================================================
    // LOGGING
    // ========================================================================

    /// Warnings are always reported.
    pub fn warn(&mut self, message: impl Into<String>, location: Location) {
        self.records.push(Record::Warning {
            message: message.into(),
            location: Some(location),
        });
    }

    /// Sets the pending info message of the innermost scope, replacing any
    /// earlier one. It is reported only if an assertion follows it before the
    /// scope closes.
    pub fn info(&mut self, message: impl Into<String>) {
        if self.scopes.is_empty() {
            self.scopes.push(InfoScope::default());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.pending = Some(PendingInfo {
                message: message.into(),
                emitted: false,
            });
        }
    }

    /// Collects the info messages visible from the current scope, outermost
    /// first, writing an `Info` record for each one seen for the first time.
    fn attach_infos(&mut self) -> Vec<String> {
        let mut attached = Vec::new();
        for scope in &mut self.scopes {
            let Some(pending) = scope.pending.as_mut() else {
                continue;
            };
            if !pending.emitted {
                pending.emitted = true;
                self.records.push(Record::Info {
                    message: pending.message.clone(),
                });
            }
            attached.push(pending.message.clone());
        }
        attached
    }
}
