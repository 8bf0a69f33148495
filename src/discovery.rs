//! Fixture source discovery and loading.
//!
//! Walks the given roots for files accepted by the settings' source
//! patterns, parses each into `TEST_CASE` declarations, and registers every
//! declaration as a [`TestCase`] whose body runs through the interpreter.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::diagnostics::{to_error_source, CatchError};
use crate::err_msg;
use crate::registry::{Registry, RegistryBuilder, TestCase};
use crate::runtime::ScriptBody;
use crate::syntax;

/// Every fixture source below `roots`, sorted for a deterministic order.
/// A root that is itself a file is returned if it matches.
pub fn discover_sources<P: AsRef<Path>>(
    roots: &[P],
    settings: &Settings,
) -> Result<Vec<PathBuf>, CatchError> {
    let matcher = settings.source_matcher()?;
    let mut files = Vec::new();

    for root in roots {
        let root = root.as_ref();
        if !root.exists() {
            return Err(err_msg!(Io, "path '{}' does not exist", root.display()));
        }
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| {
                err_msg!(Io, "failed to walk '{}'", root.display()).with_cause(e)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = path.to_string_lossy();
            if !matcher.includes(&name) {
                debug!("skipping {}", name);
                continue;
            }
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Parses one fixture file into runnable test cases, in source order.
pub fn load_fixture(path: &Path) -> Result<Vec<TestCase>, CatchError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path)
        .map_err(|e| err_msg!(Io, "cannot read '{}'", display).with_cause(e))?;
    load_fixture_source(&display, text)
}

/// Same as [`load_fixture`] for in-memory text reported under `name`.
pub fn load_fixture_source(name: &str, text: impl Into<String>) -> Result<Vec<TestCase>, CatchError> {
    let source = to_error_source(name, text);
    let fixture = syntax::parse(&source)?;
    debug!("{}: {} test cases", name, fixture.cases.len());
    Ok(fixture
        .cases
        .into_iter()
        .map(|decl| ScriptBody::new(decl, source.clone(), name).into_test_case())
        .collect())
}

/// Discovers, parses, and registers every fixture below `roots`.
pub fn build_registry<P: AsRef<Path>>(roots: &[P], settings: &Settings) -> Result<Registry, CatchError> {
    let sources = discover_sources(roots, settings)?;
    let mut builder = RegistryBuilder::new();
    for path in &sources {
        for case in load_fixture(path)? {
            builder.register(case)?;
        }
    }
    info!(
        "discovered {} test cases in {} sources",
        builder.len(),
        sources.len()
    );
    builder.build()
}
