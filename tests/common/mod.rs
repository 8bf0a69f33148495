//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use catchrun::config::Settings;
use catchrun::discovery::build_registry;
use catchrun::report::CaseReport;
use catchrun::{Registry, RunReport, Runner, TestFilter};

pub const REFERENCE_CASES: [&str; 7] = [
    "No tags",
    "With tags",
    "Has failure",
    "Has forced failure",
    "Warn",
    "Info",
    "Foo",
];

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("ReferenceCatchProject")
}

pub fn reference_registry() -> Registry {
    build_registry(&[fixture_dir()], &Settings::default()).expect("reference fixture loads")
}

pub fn run_reference(filter: &str) -> RunReport {
    let filter = TestFilter::parse(filter).expect("valid filter");
    Runner::new().run_all(&reference_registry(), &filter)
}

pub fn case<'r>(report: &'r RunReport, name: &str) -> &'r CaseReport {
    report
        .case(name)
        .unwrap_or_else(|| panic!("case '{}' missing from report", name))
}
