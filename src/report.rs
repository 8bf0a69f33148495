//! Run report data model.
//!
//! A [`RunReport`] holds one [`CaseReport`] per executed test case, and each
//! case holds one [`PathResult`] per leaf-section execution. Records inside a
//! path keep the order in which the body produced them.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::tags::TagSet;

// ============================================================================
// LOCATIONS
// ============================================================================

/// Source location attached to assertions and log entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Captures the current Rust source location as a [`Location`].
#[macro_export]
macro_rules! location {
    () => {
        $crate::report::Location::new(file!(), line!())
    };
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Assertion macro kinds. `Require*` failures abort the current path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertKind {
    Require,
    RequireFalse,
    Check,
    CheckFalse,
}

impl AssertKind {
    pub fn is_fatal(&self) -> bool {
        matches!(self, AssertKind::Require | AssertKind::RequireFalse)
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, AssertKind::RequireFalse | AssertKind::CheckFalse)
    }

    pub fn macro_name(&self) -> &'static str {
        match self {
            AssertKind::Require => "REQUIRE",
            AssertKind::RequireFalse => "REQUIRE_FALSE",
            AssertKind::Check => "CHECK",
            AssertKind::CheckFalse => "CHECK_FALSE",
        }
    }
}

impl fmt::Display for AssertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.macro_name())
    }
}

/// The outcome taxonomy of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Pass,
    Fail,
    FailForced,
    Error,
}

/// Overall status of a path, a case, or a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Status {
    Pass,
    Fail,
    Error,
}

impl Status {
    pub fn is_pass(&self) -> bool {
        *self == Status::Pass
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Error => "ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionRecord {
    pub kind: AssertKind,
    pub passed: bool,
    /// The asserted expression as written.
    pub original: String,
    /// The expression with operands replaced by their values.
    pub expanded: String,
    pub location: Location,
    /// Info messages in scope when the assertion was evaluated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub info: Vec<String>,
}

impl AssertionRecord {
    pub fn outcome(&self) -> Outcome {
        if self.passed {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }
}

/// One entry in a path's ordered record list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Assertion(AssertionRecord),
    /// Explicit `FAIL`/`FAIL_CHECK` with its message.
    Failure {
        message: String,
        location: Location,
    },
    Success {
        message: String,
        location: Location,
    },
    Warning {
        message: String,
        location: Option<Location>,
    },
    Info {
        message: String,
    },
    /// Unexpected panic or interpreter error; aborts the path.
    Error {
        message: String,
        location: Option<Location>,
    },
}

impl Record {
    /// The assertion outcome this record contributes, if it is one.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Record::Assertion(a) => Some(a.outcome()),
            Record::Failure { .. } => Some(Outcome::FailForced),
            Record::Success { .. } => Some(Outcome::Pass),
            Record::Error { .. } => Some(Outcome::Error),
            Record::Warning { .. } | Record::Info { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome(),
            Some(Outcome::Fail | Outcome::FailForced | Outcome::Error)
        )
    }
}

// ============================================================================
// PATH / CASE / RUN
// ============================================================================

/// Result of one execution of a case body along a single root-to-leaf path.
#[derive(Debug, Clone, Serialize)]
pub struct PathResult {
    /// Section names from the outermost to the leaf; empty without sections.
    pub sections: Vec<String>,
    pub status: Status,
    pub records: Vec<Record>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl PathResult {
    pub fn new(sections: Vec<String>, records: Vec<Record>, duration: Duration) -> Self {
        let status = status_of(&records);
        Self {
            sections,
            status,
            records,
            duration,
        }
    }

    /// Folds a run-through that re-walked this path's sections without
    /// reaching a leaf into this result. The records both runs share as a
    /// common prefix are kept once.
    pub fn absorb(&mut self, rewalk: PathResult) {
        let shared = self
            .records
            .iter()
            .zip(&rewalk.records)
            .take_while(|(ours, theirs)| ours == theirs)
            .count();
        self.records.extend(rewalk.records.into_iter().skip(shared));
        self.status = status_of(&self.records);
        self.duration += rewalk.duration;
    }

    pub fn leaf(&self) -> Option<&str> {
        self.sections.last().map(String::as_str)
    }

    pub fn assertions(&self) -> impl Iterator<Item = &AssertionRecord> {
        self.records.iter().filter_map(|r| match r {
            Record::Assertion(a) => Some(a),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.is_failure())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| match r {
            Record::Warning { message, .. } => Some(message.as_str()),
            _ => None,
        })
    }

    pub fn infos(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| match r {
            Record::Info { message } => Some(message.as_str()),
            _ => None,
        })
    }

    /// `Case / outer / leaf` style display name.
    pub fn display_name(&self, case_name: &str) -> String {
        std::iter::once(case_name)
            .chain(self.sections.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

fn status_of(records: &[Record]) -> Status {
    let mut status = Status::Pass;
    for record in records {
        let this = match record.outcome() {
            Some(Outcome::Error) => Status::Error,
            Some(Outcome::Fail | Outcome::FailForced) => Status::Fail,
            _ => Status::Pass,
        };
        status = status.max(this);
    }
    status
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub tags: TagSet,
    pub location: Location,
    pub paths: Vec<PathResult>,
}

impl CaseReport {
    /// Error dominates Fail, which dominates Pass.
    pub fn status(&self) -> Status {
        self.paths
            .iter()
            .map(|p| p.status)
            .max()
            .unwrap_or(Status::Pass)
    }

    pub fn duration(&self) -> Duration {
        self.paths.iter().map(|p| p.duration).sum()
    }

    pub fn path(&self, sections: &[&str]) -> Option<&PathResult> {
        self.paths.iter().find(|p| p.sections == sections)
    }
}

/// Aggregated counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub cases_passed: usize,
    pub cases_failed: usize,
    pub paths: usize,
    pub assertions_passed: usize,
    pub assertions_failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub cases: Vec<CaseReport>,
    /// Set when the host cancelled the run before every case executed.
    pub cancelled: bool,
}

impl RunReport {
    pub fn status(&self) -> Status {
        self.cases
            .iter()
            .map(CaseReport::status)
            .max()
            .unwrap_or(Status::Pass)
    }

    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for case in &self.cases {
            if case.status().is_pass() {
                totals.cases_passed += 1;
            } else {
                totals.cases_failed += 1;
            }
            for path in &case.paths {
                totals.paths += 1;
                for record in &path.records {
                    match record.outcome() {
                        Some(Outcome::Pass) => totals.assertions_passed += 1,
                        Some(_) => totals.assertions_failed += 1,
                        None => {}
                    }
                }
            }
        }
        totals
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
