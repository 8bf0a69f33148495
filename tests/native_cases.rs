//! Cases registered from Rust closures rather than fixture sources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use catchrun::listing::{parse_listing, write_listing};
use catchrun::report::Record;
use catchrun::{location, Context, RegistryBuilder, Runner, Status, TagSet, TestFilter};

#[test]
fn case_without_sections_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let registry = RegistryBuilder::new()
        .case("flat", "", location!(), move |ctx: &mut Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.check(1 + 1 == 2, "1 + 1 == 2", location!());
            Ok(())
        })
        .build()
        .unwrap();

    let paths = Runner::new().run(registry.get("flat").unwrap());
    assert_eq!(paths.len(), 1);
    assert!(paths[0].sections.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn every_leaf_of_a_nested_tree_runs_exactly_once() {
    let registry = RegistryBuilder::new()
        .case("tree", "[tree]", location!(), |ctx: &mut Context| {
            ctx.section("a", |ctx| {
                ctx.section("a1", |_| Ok(()))?;
                ctx.section("a2", |ctx| {
                    ctx.section("a2x", |_| Ok(()))?;
                    ctx.section("a2y", |_| Ok(()))
                })
            })?;
            ctx.section("b", |_| Ok(()))?;
            ctx.section("c", |ctx| ctx.section("c1", |_| Ok(())))
        })
        .build()
        .unwrap();

    let paths = Runner::new().run(registry.get("tree").unwrap());
    let mut leaves: Vec<String> = paths.iter().map(|p| p.sections.join("/")).collect();
    leaves.sort();
    assert_eq!(leaves, vec!["a/a1", "a/a2/a2x", "a/a2/a2y", "b", "c/c1"]);
}

#[test]
fn local_state_is_rebuilt_for_each_path() {
    let registry = RegistryBuilder::new()
        .case("state", "", location!(), |ctx: &mut Context| {
            let mut x = 42;
            ctx.require(x == 42, "x == 42", location!())?;
            ctx.section("first", |ctx| {
                x += 1;
                ctx.require(x == 43, "x == 43", location!())
            })?;
            ctx.section("second", |ctx| {
                x += 10;
                ctx.require(x == 52, "x == 52", location!())
            })
        })
        .build()
        .unwrap();

    let paths = Runner::new().run(registry.get("state").unwrap());
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.status == Status::Pass));
}

#[test]
fn require_stops_the_path_and_check_does_not() {
    let registry = RegistryBuilder::new()
        .case("checks", "", location!(), |ctx: &mut Context| {
            ctx.check(false, "false", location!());
            ctx.warn("after check", location!());
            ctx.require(false, "false", location!())?;
            ctx.warn("after require", location!());
            Ok(())
        })
        .build()
        .unwrap();

    let paths = Runner::new().run(registry.get("checks").unwrap());
    let warnings: Vec<_> = paths[0].warnings().collect();
    assert_eq!(warnings, vec!["after check"]);
    assert_eq!(paths[0].assertions().count(), 2);
}

#[test]
fn info_in_a_closed_section_does_not_leak() {
    let registry = RegistryBuilder::new()
        .case("scoped info", "", location!(), |ctx: &mut Context| {
            ctx.info("outer");
            ctx.section("inner", |ctx| {
                ctx.info("inner only");
                ctx.check(true, "true", location!());
                Ok(())
            })?;
            ctx.check(false, "false", location!());
            Ok(())
        })
        .build()
        .unwrap();

    let paths = Runner::new().run(registry.get("scoped info").unwrap());
    let assertions: Vec<_> = paths[0].assertions().collect();
    assert_eq!(assertions[0].info, vec!["outer", "inner only"]);
    assert_eq!(assertions[1].info, vec!["outer"]);
    let infos = paths[0]
        .records
        .iter()
        .filter(|r| matches!(r, Record::Info { .. }))
        .count();
    assert_eq!(infos, 2);
}

#[test]
fn listing_round_trips_registered_cases() {
    let long_file = format!("{}/Tests.cpp", "deeply/nested/directory".repeat(5));
    let registry = RegistryBuilder::new()
        .case(
            "With tags",
            "[tag][neat]",
            catchrun::Location::new("Tests.cpp", 16),
            |_: &mut Context| Ok(()),
        )
        .case(
            "Far away",
            "",
            catchrun::Location::new(long_file.clone(), 7),
            |_: &mut Context| Ok(()),
        )
        .build()
        .unwrap();

    let mut out = Vec::new();
    write_listing(&mut out, registry.iter()).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().all(|l| l.len() < 80));

    let listed = parse_listing(&text).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "With tags");
    assert_eq!(listed[0].line, 16);
    assert_eq!(listed[0].tags, TagSet::parse("[neat][tag]"));
    assert_eq!(listed[1].file, long_file);
    assert_eq!(listed[1].line, 7);
}

#[test]
fn filters_select_by_name_patterns() {
    let registry = RegistryBuilder::new()
        .case("parse int", "[parser]", location!(), |_: &mut Context| Ok(()))
        .case("parse bool", "[parser]", location!(), |_: &mut Context| Ok(()))
        .case("eval int", "[eval]", location!(), |_: &mut Context| Ok(()))
        .build()
        .unwrap();

    let names = |spec: &str| -> Vec<String> {
        registry
            .discover(&TestFilter::parse(spec).unwrap())
            .into_iter()
            .map(|c| c.name().to_string())
            .collect()
    };
    assert_eq!(names("parse*"), vec!["parse int", "parse bool"]);
    assert_eq!(names("*int"), vec!["parse int", "eval int"]);
    assert_eq!(names("[parser]~*bool"), vec!["parse int"]);
    assert_eq!(names("eval int,parse bool"), vec!["parse bool", "eval int"]);
}
