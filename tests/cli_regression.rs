// CLI behavior: listing layout, report formats, exit codes, and miette
// rendering of fixture errors.

mod common;

use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

use catchrun::listing::parse_listing;
use catchrun::TagSet;
use common::fixture_dir;

fn catchrun() -> Command {
    let mut cmd = Command::cargo_bin("catchrun").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn list_prints_the_catch_listing() {
    let output = catchrun().arg("list").arg(fixture_dir()).output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.starts_with("All available test cases:\n  No tags\n"));
    assert!(text.ends_with("7 test cases\n"));

    let listed = parse_listing(&text).unwrap();
    let lines: Vec<(&str, u32)> = listed.iter().map(|c| (c.name.as_str(), c.line)).collect();
    assert_eq!(
        &lines[..3],
        &[("No tags", 6), ("With tags", 16), ("Has failure", 24)]
    );
    assert_eq!(listed[1].tags, TagSet::parse("[tag][neat]"));
    assert!(listed[0].file.ends_with("Tests.cpp"));
}

#[test]
fn tags_counts_each_tag() {
    catchrun()
        .arg("tags")
        .arg(fixture_dir())
        .assert()
        .success()
        .stdout(contains("   3  [tag]").and(contains("   1  [neat]")));
}

#[test]
fn passing_selection_exits_zero() {
    catchrun()
        .args(["run", "--color", "never", "-f", "With tags,No tags"])
        .arg(fixture_dir())
        .assert()
        .code(0)
        .stdout(
            contains("PASS  With tags / Success")
                .and(contains("test cases: 2 | 2 passed | 0 failed")),
        );
}

#[test]
fn failures_exit_one_with_a_summary() {
    catchrun()
        .args(["run", "--color", "never", "-f", "Foo"])
        .arg(fixture_dir())
        .assert()
        .code(1)
        .stdout(
            contains("FAIL  Foo / equals / bar")
                .and(contains("#1 - CHECK(x == 42) with expansion: (43 == 42)"))
                .and(contains("#2 - REQUIRE(x == 42) with expansion: (44 == 42)"))
                .and(contains("at #1 - Foo / equals / bar() in")),
        );
}

#[test]
fn xml_reporter_writes_catch_layout() {
    catchrun()
        .args(["run", "-r", "xml", "--durations", "-f", "[tag]"])
        .arg(fixture_dir())
        .assert()
        .code(1)
        .stdout(
            contains("<Catch name=\"ReferenceCatchProject\">")
                .and(contains("<Section name=\"Second fails\">"))
                .and(contains("durationInSeconds="))
                .and(contains("This message should be in the failure report.")),
        );
}

#[test]
fn json_reporter_is_valid_json() {
    let output = catchrun()
        .args(["run", "-r", "json", "-f", "Warn"])
        .arg(fixture_dir())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["cases"][0]["name"], "Warn");
}

#[test]
fn settings_file_picks_the_reporter() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture_dir().join("Tests.cpp"), dir.path().join("Tests.cpp")).unwrap();
    fs::write(dir.path().join("catchrun.yaml"), "reporter: json\n").unwrap();

    catchrun()
        .args(["run", "-f", "No tags"])
        .arg(dir.path())
        .assert()
        .code(0)
        .stdout(contains("\"cases\""));
}

#[test]
fn cli_reports_miette_diagnostics_on_bad_fixtures() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("broken.cpp"),
        "TEST_CASE( \"broken\" ) { REQUIRE( x == ; }",
    )
    .unwrap();

    catchrun()
        .arg("run")
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(contains("catchrun::parse").or(contains("help:")));
}

#[test]
fn malformed_filter_is_a_usage_error() {
    catchrun()
        .args(["list", "-f", "[unterminated"])
        .arg(fixture_dir())
        .assert()
        .code(2)
        .stderr(contains("unterminated tag"));
}
