use termcolor::WriteColor;

use super::{io_error, Reporter};
use crate::diagnostics::CatchError;
use crate::err_msg;
use crate::report::RunReport;

/// Writes the run report as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, report: &RunReport, out: &mut dyn WriteColor) -> Result<(), CatchError> {
        serde_json::to_writer_pretty(&mut *out, report)
            .map_err(|e| err_msg!(Internal, "failed to serialize run report").with_cause(e))?;
        writeln!(out).map_err(io_error)?;
        out.flush().map_err(io_error)
    }
}
