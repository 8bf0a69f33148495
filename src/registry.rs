//! Test case registry.
//!
//! Cases are collected with a [`RegistryBuilder`] and frozen into an immutable
//! [`Registry`] before anything runs. A frozen registry can be published once
//! per process with [`install`] and read back from anywhere with [`global`].
//!
//! ```rust
//! use catchrun::{location, Context, RegistryBuilder, TestFilter};
//!
//! let registry = RegistryBuilder::new()
//!     .case("adds", "[math]", location!(), |ctx: &mut Context| {
//!         ctx.require(1 + 1 == 2, "1 + 1 == 2", location!())
//!     })
//!     .build()
//!     .unwrap();
//! assert_eq!(registry.discover(&TestFilter::parse("[math]").unwrap()).len(), 1);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use once_cell::sync::OnceCell;

use crate::diagnostics::CatchError;
use crate::err_msg;
use crate::filter::TestFilter;
use crate::report::Location;
use crate::runner::{Abort, Context};
use crate::tags::TagSet;

// ============================================================================
// TEST BODIES
// ============================================================================

/// Something that can execute one run-through of a test case body.
pub trait TestBody: Send + Sync {
    fn run(&self, ctx: &mut Context) -> Result<(), Abort>;
}

impl<F> TestBody for F
where
    F: Fn(&mut Context) -> Result<(), Abort> + Send + Sync,
{
    fn run(&self, ctx: &mut Context) -> Result<(), Abort> {
        self(ctx)
    }
}

/// A registered test case. Immutable once built.
#[derive(Clone)]
pub struct TestCase {
    name: String,
    tags: TagSet,
    location: Location,
    body: Arc<dyn TestBody>,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        tags: TagSet,
        location: Location,
        body: Arc<dyn TestBody>,
    ) -> Self {
        Self {
            name: name.into(),
            tags,
            location,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn body(&self) -> &dyn TestBody {
        self.body.as_ref()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    cases: Vec<TestCase>,
    names: HashSet<String>,
    /// First duplicate seen through the chaining API, reported by `build`.
    duplicate: Option<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chaining form of [`register`](Self::register) for closure bodies.
    /// Duplicate names surface as an error from [`build`](Self::build).
    pub fn case<F>(mut self, name: &str, tags: &str, location: Location, body: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Abort> + Send + Sync + 'static,
    {
        let case = TestCase::new(name, TagSet::parse(tags), location, Arc::new(body));
        if self.register(case).is_err() && self.duplicate.is_none() {
            self.duplicate = Some(name.to_string());
        }
        self
    }

    /// Adds a case, rejecting a name that is already registered.
    pub fn register(&mut self, case: TestCase) -> Result<&mut Self, CatchError> {
        if !self.names.insert(case.name.clone()) {
            return Err(err_msg!(
                Validation,
                "test case '{}' is already registered",
                case.name
            )
            .with_help(format!("first registration is kept; duplicate at {}", case.location)));
        }
        debug!("registered test case '{}' {}", case.name, case.tags);
        self.cases.push(case);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Freezes the collected cases in registration order.
    pub fn build(self) -> Result<Registry, CatchError> {
        if let Some(name) = self.duplicate {
            return Err(err_msg!(
                Validation,
                "test case '{}' is already registered",
                name
            ));
        }
        Ok(Registry { cases: self.cases })
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Default)]
pub struct Registry {
    cases: Vec<TestCase>,
}

impl Registry {
    /// Cases matching `filter`, in registration order.
    pub fn discover(&self, filter: &TestFilter) -> Vec<&TestCase> {
        self.cases.iter().filter(|c| filter.matches(c)).collect()
    }

    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Every tag in use, with the number of cases carrying it.
    pub fn tag_counts(&self) -> BTreeMap<String, usize> {
        count_tags(&self.cases)
    }
}

/// Number of cases carrying each tag among `cases`.
pub fn count_tags<'a, I>(cases: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a TestCase>,
{
    let mut counts = BTreeMap::new();
    for case in cases {
        for tag in case.tags.iter() {
            *counts.entry(tag.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

// ============================================================================
// PROCESS-WIDE REGISTRY
// ============================================================================

static GLOBAL: OnceCell<Registry> = OnceCell::new();

/// Publishes `registry` as the process-wide registry. Succeeds only once.
pub fn install(registry: Registry) -> Result<&'static Registry, CatchError> {
    let count = registry.len();
    GLOBAL
        .set(registry)
        .map_err(|_| err_msg!(Internal, "the global test registry is already installed"))?;
    info!("installed global registry with {} test cases", count);
    GLOBAL
        .get()
        .ok_or_else(|| err_msg!(Internal, "the global test registry vanished after install"))
}

/// The installed process-wide registry, if any.
pub fn global() -> Option<&'static Registry> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location;

    fn noop(_: &mut Context) -> Result<(), Abort> {
        Ok(())
    }

    #[test]
    fn discovery_keeps_registration_order() {
        let registry = RegistryBuilder::new()
            .case("b", "[x]", location!(), noop)
            .case("a", "", location!(), noop)
            .case("c", "[x]", location!(), noop)
            .build()
            .unwrap();
        let names: Vec<_> = registry
            .discover(&TestFilter::all())
            .into_iter()
            .map(TestCase::name)
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        let tagged: Vec<_> = registry
            .discover(&TestFilter::parse("[x]").unwrap())
            .into_iter()
            .map(TestCase::name)
            .collect();
        assert_eq!(tagged, vec!["b", "c"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = RegistryBuilder::new()
            .case("same", "", location!(), noop)
            .case("same", "", location!(), noop)
            .build()
            .unwrap_err();
        assert!(err.message().contains("'same'"));

        let mut builder = RegistryBuilder::new();
        let case = TestCase::new("x", TagSet::new(), location!(), Arc::new(noop));
        builder.register(case.clone()).unwrap();
        assert!(builder.register(case).is_err());
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn tag_counts_cover_every_case() {
        let registry = RegistryBuilder::new()
            .case("one", "[tag][neat]", location!(), noop)
            .case("two", "[tag]", location!(), noop)
            .build()
            .unwrap();
        let counts = registry.tag_counts();
        assert_eq!(counts.get("tag"), Some(&2));
        assert_eq!(counts.get("neat"), Some(&1));
    }
}
