//! The `catchrun` command line.
//!
//! Exit codes: 0 when every selected case passes (or nothing had to run),
//! 1 when any case fails or errors, 2 on usage, settings, or fixture errors.

pub mod args;

use std::ffi::OsString;
use std::io::Write;

use clap::Parser;
use log::{debug, info};
use termcolor::StandardStream;

use crate::cli::args::{apply_overrides, CatchArgs, Command, Selection};
use crate::config::Settings;
use crate::diagnostics::CatchError;
use crate::discovery::build_registry;
use crate::err_msg;
use crate::filter::TestFilter;
use crate::listing::{write_listing, write_tag_listing};
use crate::registry::{count_tags, Registry};
use crate::reporters::{reporter_for, ReportOptions};
use crate::runner::Runner;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Parses the process arguments and runs the selected command.
pub fn run() -> i32 {
    run_from(std::env::args_os())
}

pub fn run_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match CatchArgs::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return e.exit_code();
        }
    };
    crate::logging::init(args.verbose);

    match dispatch(args.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            EXIT_USAGE
        }
    }
}

fn dispatch(command: Command) -> Result<i32, CatchError> {
    match command {
        Command::List(selection) => {
            let (_, registry, filter) = load(&selection)?;
            let mut stdout = std::io::stdout().lock();
            write_listing(&mut stdout, registry.discover(&filter)).map_err(write_error)?;
            Ok(EXIT_SUCCESS)
        }
        Command::Tags(selection) => {
            let (_, registry, filter) = load(&selection)?;
            let counts = count_tags(registry.discover(&filter));
            let mut stdout = std::io::stdout().lock();
            write_tag_listing(&mut stdout, &counts).map_err(write_error)?;
            Ok(EXIT_SUCCESS)
        }
        Command::Run {
            selection,
            reporter,
            color,
            durations,
        } => {
            let (mut settings, registry, filter) = load(&selection)?;
            apply_overrides(&mut settings, reporter, color, durations);
            debug!("effective settings: {:?}", settings);

            let report = Runner::new().run_all(&registry, &filter);
            info!(
                "ran {} test cases with filter '{}'",
                report.cases.len(),
                filter
            );

            let options = ReportOptions {
                name: report_name(&selection),
                durations: settings.durations,
            };
            let mut stdout = StandardStream::stdout(settings.color.choice());
            reporter_for(settings.reporter, options).report(&report, &mut stdout)?;
            stdout.flush().map_err(write_error)?;

            Ok(if report.status().is_pass() {
                EXIT_SUCCESS
            } else {
                EXIT_FAILURE
            })
        }
    }
}

fn load(selection: &Selection) -> Result<(Settings, Registry, TestFilter), CatchError> {
    let settings = Settings::load(&selection.settings_start())?;
    let filter = TestFilter::from_args(selection.filters.as_slice())?;
    let registry = build_registry(selection.paths.as_slice(), &settings)?;
    Ok((settings, registry, filter))
}

fn report_name(selection: &Selection) -> String {
    selection
        .paths
        .first()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

fn write_error(error: std::io::Error) -> CatchError {
    err_msg!(Io, "failed to write to stdout").with_cause(error)
}
