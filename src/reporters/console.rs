//! Human readable console output.

use termcolor::{Color, ColorSpec, WriteColor};

use super::{failure_summary, io_error, ReportOptions, Reporter};
use crate::diagnostics::CatchError;
use crate::report::{CaseReport, PathResult, Record, RunReport, Status};

const RULE: &str =
    "===============================================================================";

pub struct ConsoleReporter {
    options: ReportOptions,
}

impl ConsoleReporter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    fn write_case(&self, case: &CaseReport, out: &mut dyn WriteColor) -> std::io::Result<()> {
        for path in &case.paths {
            self.write_path(case, path, out)?;
        }
        Ok(())
    }

    fn write_path(
        &self,
        case: &CaseReport,
        path: &PathResult,
        out: &mut dyn WriteColor,
    ) -> std::io::Result<()> {
        let name = path.display_name(&case.name);

        out.set_color(ColorSpec::new().set_fg(Some(status_color(path.status))).set_bold(true))?;
        write!(out, "{:<5}", path.status.label())?;
        out.reset()?;
        write!(out, " {}", name)?;
        if self.options.durations {
            write!(out, " ({:.3}s)", path.duration.as_secs_f64())?;
        }
        writeln!(out)?;

        let (messages, locations) = failure_summary(&name, path);
        for line in messages.iter().chain(locations.iter()) {
            writeln!(out, "    {}", line)?;
        }

        for record in &path.records {
            match record {
                Record::Warning { message, .. } => {
                    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
                    writeln!(out, "    WARN: {}", message.trim())?;
                    out.reset()?;
                }
                Record::Info { message } => {
                    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
                    writeln!(out, "    INFO: {}", message.trim())?;
                    out.reset()?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn write_totals(&self, report: &RunReport, out: &mut dyn WriteColor) -> std::io::Result<()> {
        let totals = report.totals();
        writeln!(out, "{}", RULE)?;
        if report.cancelled {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
            writeln!(out, "run cancelled before every test case executed")?;
            out.reset()?;
        }

        let color = status_color(report.status());
        out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        writeln!(
            out,
            "test cases: {} | {} passed | {} failed",
            totals.cases_passed + totals.cases_failed,
            totals.cases_passed,
            totals.cases_failed
        )?;
        writeln!(
            out,
            "assertions: {} | {} passed | {} failed",
            totals.assertions_passed + totals.assertions_failed,
            totals.assertions_passed,
            totals.assertions_failed
        )?;
        out.reset()?;
        if self.options.durations {
            let total: f64 = report.cases.iter().map(|c| c.duration().as_secs_f64()).sum();
            writeln!(out, "total time: {:.3}s", total)?;
        }
        Ok(())
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, report: &RunReport, out: &mut dyn WriteColor) -> Result<(), CatchError> {
        for case in &report.cases {
            self.write_case(case, out).map_err(io_error)?;
        }
        self.write_totals(report, out).map_err(io_error)?;
        out.flush().map_err(io_error)
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Pass => Color::Green,
        Status::Fail => Color::Red,
        Status::Error => Color::Magenta,
    }
}
