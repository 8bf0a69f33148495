//! catchrun: a section-aware test case registry and runner.
//!
//! Test cases are registered with a name, a tag set, and a body. The body
//! opens nested sections through its [`Context`]; the [`Runner`] calls it
//! once per leaf section path so that each leaf runs exactly once with
//! fresh local state. Cases come either from Rust closures registered on a
//! [`RegistryBuilder`] or from Catch-style fixture sources loaded by
//! [`discovery`].
//!
//! ```
//! use catchrun::{location, Context, RegistryBuilder, Runner, TestFilter};
//!
//! let registry = RegistryBuilder::new()
//!     .case("vectors", "[vector]", location!(), |ctx: &mut Context| {
//!         let mut v = vec![1, 2, 3];
//!         ctx.section("push", |ctx| {
//!             v.push(4);
//!             ctx.require(v.len() == 4, "v.len() == 4", location!())
//!         })?;
//!         ctx.section("pop", |ctx| {
//!             v.pop();
//!             ctx.require(v.len() == 2, "v.len() == 2", location!())
//!         })
//!     })
//!     .build()
//!     .unwrap();
//!
//! let report = Runner::new().run_all(&registry, &TestFilter::all());
//! assert_eq!(report.cases[0].paths.len(), 2);
//! assert!(report.status().is_pass());
//! ```

pub use crate::diagnostics::{CatchError, ErrorContext, ErrorType};
pub use crate::filter::TestFilter;
pub use crate::registry::{Registry, RegistryBuilder, TestBody, TestCase};
pub use crate::report::{Location, PathResult, Record, RunReport, Status};
pub use crate::runner::{Abort, CancelHandle, Context, Runner};
pub use crate::tags::TagSet;

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod filter;
pub mod listing;
pub mod logging;
pub mod registry;
pub mod report;
pub mod reporters;
pub mod runner;
pub mod runtime;
pub mod syntax;
pub mod tags;
