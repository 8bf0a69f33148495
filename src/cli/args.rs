//! Command-line arguments and subcommands for `catchrun`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{ColorMode, ReporterKind, Settings};

#[derive(Debug, Parser)]
#[command(
    name = "catchrun",
    version,
    about = "Discover, list, and run Catch-style test cases with sections."
)]
pub struct CatchArgs {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` overrides it.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List matching test cases in the Catch listing layout.
    List(Selection),
    /// List the tags of matching test cases with their counts.
    Tags(Selection),
    /// Run matching test cases and report every leaf section path.
    Run {
        #[command(flatten)]
        selection: Selection,

        #[arg(short, long, value_enum)]
        reporter: Option<ReporterKind>,

        #[arg(long, value_enum)]
        color: Option<ColorMode>,

        /// Report durations per path and in the totals.
        #[arg(short, long)]
        durations: bool,
    },
}

/// Which fixtures to load and which of their cases to select.
#[derive(Debug, Args)]
pub struct Selection {
    /// Fixture files or directories to search.
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Test spec: `[tag]`, `name`, `prefix*`, `~[tag]`; commas separate
    /// alternatives. Repeat the flag to add alternatives.
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,

    /// Directory where the settings file search ends. Defaults to the first
    /// path (or its parent when it is a file).
    #[arg(long)]
    pub settings_dir: Option<PathBuf>,
}

impl Selection {
    pub fn settings_start(&self) -> PathBuf {
        if let Some(dir) = &self.settings_dir {
            return dir.clone();
        }
        match self.paths.first() {
            Some(path) if path.is_file() => path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Some(path) => path.clone(),
            None => PathBuf::from("."),
        }
    }
}

/// Flag overrides applied on top of the loaded settings.
pub fn apply_overrides(
    settings: &mut Settings,
    reporter: Option<ReporterKind>,
    color: Option<ColorMode>,
    durations: bool,
) {
    if let Some(reporter) = reporter {
        settings.reporter = reporter;
    }
    if let Some(color) = color {
        settings.color = color;
    }
    if durations {
        settings.durations = true;
    }
}
