//! Runner settings.
//!
//! Settings come from `catchrun.yaml` files. Every directory from the
//! filesystem root down to the start directory is searched, and each file
//! found is merged over the ones before it, so the file closest to the start
//! directory wins. Scalar keys override; `source_include` and
//! `source_exclude` lists accumulate. Command-line flags are applied last.
//!
//! ```yaml
//! source_filter: '.*\.(cpp|cc)$'
//! source_exclude: ['third_party']
//! reporter: xml
//! durations: true
//! color: never
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use termcolor::ColorChoice;

use crate::diagnostics::CatchError;
use crate::err_msg;

pub const SETTINGS_FILE: &str = "catchrun.yaml";
pub const DEFAULT_SOURCE_FILTER: &str = r".*\.(cpp|cc|cxx)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    #[default]
    Console,
    Json,
    Xml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolves `auto` against whether stdout is a terminal.
    pub fn choice(&self) -> ColorChoice {
        match self {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
            ColorMode::Auto => ColorChoice::Never,
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Regex a fixture path must match to be loaded.
    pub source_filter: String,
    /// Extra patterns; when non-empty a path must match one of them.
    pub source_include: Vec<String>,
    /// Paths matching any of these are skipped.
    pub source_exclude: Vec<String>,
    pub reporter: ReporterKind,
    pub durations: bool,
    pub color: ColorMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_filter: DEFAULT_SOURCE_FILTER.to_string(),
            source_include: Vec::new(),
            source_exclude: Vec::new(),
            reporter: ReporterKind::default(),
            durations: false,
            color: ColorMode::default(),
        }
    }
}

/// One settings file as written; absent keys leave earlier values alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub source_filter: Option<String>,
    pub source_include: Vec<String>,
    pub source_exclude: Vec<String>,
    pub reporter: Option<ReporterKind>,
    pub durations: Option<bool>,
    pub color: Option<ColorMode>,
}

impl SettingsFile {
    pub fn parse(text: &str, origin: &Path) -> Result<Self, CatchError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| {
            err_msg!(Config, "invalid settings file '{}'", origin.display()).with_cause(e)
        })
    }
}

impl Settings {
    /// Loads and merges every settings file from the root down to `start`.
    pub fn load(start: &Path) -> Result<Self, CatchError> {
        let mut settings = Settings::default();
        for path in settings_files_above(start) {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to read settings from '{}': {}", path.display(), e);
                    continue;
                }
            };
            info!("reading settings from {}", path.display());
            settings.merge(SettingsFile::parse(&text, &path)?);
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn merge(&mut self, file: SettingsFile) {
        if let Some(filter) = file.source_filter {
            self.source_filter = filter;
        }
        self.source_include.extend(file.source_include);
        self.source_exclude.extend(file.source_exclude);
        if let Some(reporter) = file.reporter {
            self.reporter = reporter;
        }
        if let Some(durations) = file.durations {
            self.durations = durations;
        }
        if let Some(color) = file.color {
            self.color = color;
        }
    }

    /// Checks that every pattern compiles.
    pub fn validate(&self) -> Result<(), CatchError> {
        self.source_matcher().map(|_| ())
    }

    pub fn source_matcher(&self) -> Result<SourceMatcher, CatchError> {
        Ok(SourceMatcher {
            filter: compile(&self.source_filter, "source_filter")?,
            include: self
                .source_include
                .iter()
                .map(|p| compile(p, "source_include"))
                .collect::<Result<_, _>>()?,
            exclude: self
                .source_exclude
                .iter()
                .map(|p| compile(p, "source_exclude"))
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Compiled source path patterns.
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    filter: Regex,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl SourceMatcher {
    /// Whether `name` should be treated as a fixture source.
    pub fn includes(&self, name: &str) -> bool {
        self.filter.is_match(name)
            && (self.include.is_empty() || self.include.iter().any(|r| r.is_match(name)))
            && !self.exclude.iter().any(|r| r.is_match(name))
    }
}

fn compile(pattern: &str, key: &str) -> Result<Regex, CatchError> {
    Regex::new(pattern).map_err(|e| {
        err_msg!(Config, "invalid regex for '{}': {}", key, pattern)
            .with_cause(e)
            .with_help("patterns use Rust regex syntax")
    })
}

/// Settings files from the filesystem root down to `start`, root first.
fn settings_files_above(start: &Path) -> Vec<PathBuf> {
    let start = start
        .canonicalize()
        .unwrap_or_else(|_| start.to_path_buf());
    let mut dirs: Vec<&Path> = start.ancestors().collect();
    dirs.reverse();
    dirs.into_iter()
        .map(|dir| dir.join(SETTINGS_FILE))
        .filter(|path| path.is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(settings: &Settings) -> SourceMatcher {
        settings.source_matcher().unwrap()
    }

    #[test]
    fn default_filter_accepts_cpp_sources() {
        let m = matcher(&Settings::default());
        assert!(m.includes("Tests.cpp"));
        assert!(m.includes("dir/more.cc"));
        assert!(!m.includes("Tests.h"));
    }

    #[test]
    fn include_and_exclude_lists_combine() {
        let settings = Settings {
            source_filter: ".*".into(),
            source_include: vec![r".*\.exe".into()],
            source_exclude: vec!["bl(aa|uu)".into()],
            ..Settings::default()
        };
        let m = matcher(&settings);
        assert!(m.includes("Test.exe"));
        assert!(!m.includes("Hippopotamus"));
        assert!(!m.includes("blaa.exe"));
        assert!(!m.includes("bluu.exe"));
        assert!(m.includes("blii.exe"));
    }

    #[test]
    fn closer_files_override_scalars_and_extend_lists() {
        let mut settings = Settings::default();
        let outer = SettingsFile::parse(
            "reporter: json\nsource_exclude: [vendor]\n",
            Path::new("outer"),
        )
        .unwrap();
        let inner = SettingsFile::parse(
            "reporter: xml\ndurations: true\nsource_exclude: [build]\n",
            Path::new("inner"),
        )
        .unwrap();
        settings.merge(outer);
        settings.merge(inner);
        assert_eq!(settings.reporter, ReporterKind::Xml);
        assert!(settings.durations);
        assert_eq!(settings.source_exclude, vec!["vendor", "build"]);
        assert_eq!(settings.source_filter, DEFAULT_SOURCE_FILTER);
    }

    #[test]
    fn unknown_keys_and_bad_patterns_are_config_errors() {
        let err = SettingsFile::parse("test_exe_filter: x\n", Path::new("s.yaml")).unwrap_err();
        assert_eq!(err.error_type(), crate::diagnostics::ErrorType::Config);

        let settings = Settings {
            source_filter: "(".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_merges_files_down_to_the_start_directory() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("project");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join(SETTINGS_FILE), "reporter: json\ncolor: never\n").unwrap();
        fs::write(nested.join(SETTINGS_FILE), "reporter: xml\n").unwrap();

        let settings = Settings::load(&nested).unwrap();
        assert_eq!(settings.reporter, ReporterKind::Xml);
        assert_eq!(settings.color, ColorMode::Never);
    }
}
