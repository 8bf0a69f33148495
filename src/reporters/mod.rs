//! Run report renderers.
//!
//! Every reporter writes a finished [`RunReport`] to a [`WriteColor`] sink.
//! Only the console reporter uses color; the structured reporters write
//! plain bytes through the same sink.

pub mod console;
pub mod json;
pub mod xml;

use std::io;

use termcolor::WriteColor;

use crate::config::ReporterKind;
use crate::diagnostics::CatchError;
use crate::err_msg;
use crate::report::{PathResult, Record, RunReport};

pub use console::ConsoleReporter;
pub use json::JsonReporter;
pub use xml::XmlReporter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    /// Name written into structured reports, usually the fixture root.
    pub name: String,
    pub durations: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            durations: false,
        }
    }
}

pub trait Reporter {
    fn report(&self, report: &RunReport, out: &mut dyn WriteColor) -> Result<(), CatchError>;
}

pub fn reporter_for(kind: ReporterKind, options: ReportOptions) -> Box<dyn Reporter> {
    match kind {
        ReporterKind::Console => Box::new(ConsoleReporter::new(options)),
        ReporterKind::Json => Box::new(JsonReporter),
        ReporterKind::Xml => Box::new(XmlReporter::new(options)),
    }
}

pub(crate) fn io_error(error: io::Error) -> CatchError {
    err_msg!(Io, "failed to write report").with_cause(error)
}

/// Numbered failure summary of one path.
///
/// Returns the message lines (`#1 - CHECK(x == 42) with expansion: (43 == 42)`)
/// and the matching location lines (`at #1 - Foo / equals() in t.cpp:line 9`).
pub fn failure_summary(display_name: &str, path: &PathResult) -> (Vec<String>, Vec<String>) {
    let mut messages = Vec::new();
    let mut locations = Vec::new();

    for (index, record) in path.failures().enumerate() {
        let n = index + 1;
        let (message, location) = match record {
            Record::Assertion(a) => (
                format!(
                    "#{} - {}({}) with expansion: ({})",
                    n,
                    a.kind,
                    a.original.trim(),
                    a.expanded.trim()
                ),
                Some(&a.location),
            ),
            Record::Failure { message, location } => {
                (format!("#{} - FAIL({})", n, message.trim()), Some(location))
            }
            Record::Error { message, location } => {
                (format!("#{} - ERROR({})", n, message.trim()), location.as_ref())
            }
            _ => continue,
        };
        messages.push(message);
        if let Some(location) = location {
            locations.push(format!(
                "at #{} - {}() in {}:line {}",
                n, display_name, location.file, location.line
            ));
        }
    }

    (messages, locations)
}
