//! Test case execution.
//!
//! The runner calls a case body once per leaf section path. Every call gets a
//! fresh [`Context`] path state while the section tracker inside it persists,
//! so each run-through picks the next unexecuted leaf. Panics are caught per
//! run-through and recorded as `Error` outcomes for that path only.

pub mod context;
pub mod tracker;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use crate::filter::TestFilter;
use crate::registry::{Registry, TestCase};
use crate::report::{CaseReport, PathResult, RunReport};

pub use context::{Abort, Assertion, Context};

// ============================================================================
// CANCELLATION
// ============================================================================

/// Lets a host stop a run between test cases. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// RUNNER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Runner {
    cancel: CancelHandle,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancelHandle) -> Self {
        Self { cancel }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Executes every leaf path of `case`, one body call per path.
    ///
    /// Run-throughs that only re-walk finished sections after an abort end
    /// at no leaf. Their records are folded into the latest path that went
    /// through the same sections, so every leaf yields exactly one result.
    pub fn run(&self, case: &TestCase) -> Vec<PathResult> {
        let mut ctx = Context::new(case.name());
        let mut results: Vec<PathResult> = Vec::new();
        let mut pending: Option<PathResult> = None;

        while !ctx.is_complete() {
            ctx.begin_path();
            let started = Instant::now();

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| case.body().run(&mut ctx)));
            let finished = match outcome {
                Ok(result) => result.is_ok(),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    ctx.error(format!("panic: {}", message), None);
                    false
                }
            };

            let (summary, records) = ctx.finish_path(finished);
            let path = PathResult::new(summary.sections, records, started.elapsed());
            if summary.reached_leaf {
                debug!(
                    "'{}' run {}: {} ({} records)",
                    path.display_name(case.name()),
                    ctx.runs(),
                    path.status,
                    path.records.len()
                );
                results.push(path);
            } else {
                debug!(
                    "'{}' run {} reached no new leaf; merging {} records",
                    path.display_name(case.name()),
                    ctx.runs(),
                    path.records.len()
                );
                let target = results
                    .iter()
                    .rposition(|r| r.sections.starts_with(&path.sections))
                    .or_else(|| results.len().checked_sub(1));
                if let Some(i) = target {
                    results[i].absorb(path);
                } else if let Some(earlier) = pending.as_mut() {
                    earlier.absorb(path);
                } else {
                    pending = Some(path);
                }
            }
        }

        if results.is_empty() {
            results.extend(pending);
        }
        results
    }

    pub fn run_case(&self, case: &TestCase) -> CaseReport {
        CaseReport {
            name: case.name().to_string(),
            tags: case.tags().clone(),
            location: case.location().clone(),
            paths: self.run(case),
        }
    }

    /// Runs `cases` in order, stopping before the next case once cancelled.
    pub fn run_cases<'a, I>(&self, cases: I) -> RunReport
    where
        I: IntoIterator<Item = &'a TestCase>,
    {
        let mut report = RunReport::default();
        for case in cases {
            if self.cancel.is_cancelled() {
                info!("run cancelled; skipping remaining test cases");
                report.cancelled = true;
                break;
            }
            report.cases.push(self.run_case(case));
        }
        report
    }

    /// Discovers the cases in `registry` that match `filter` and runs them.
    pub fn run_all(&self, registry: &Registry, filter: &TestFilter) -> RunReport {
        self.run_cases(registry.discover(filter))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location;
    use crate::registry::RegistryBuilder;
    use crate::report::{Record, Status};

    #[test]
    fn panics_become_errors_on_their_path_only() {
        let registry = RegistryBuilder::new()
            .case("explodes", "", location!(), |ctx: &mut Context| {
                ctx.section("fine", |ctx| ctx.require(true, "true", location!()))?;
                ctx.section("boom", |_| panic!("kaboom"))
            })
            .build()
            .unwrap();
        let case = registry.get("explodes").unwrap();
        let paths = Runner::new().run(case);

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].status, Status::Pass);
        assert_eq!(paths[1].status, Status::Error);
        assert_eq!(paths[1].sections, vec!["boom"]);
        assert!(matches!(
            &paths[1].records[0],
            Record::Error { message, .. } if message.contains("kaboom")
        ));
    }

    #[test]
    fn code_after_an_aborted_child_lands_on_the_aborted_path() {
        let registry = RegistryBuilder::new()
            .case("after abort", "", location!(), |ctx: &mut Context| {
                ctx.section("a", |ctx| {
                    ctx.check(true, "true", location!());
                    ctx.section("b", |ctx| ctx.require(false, "false", location!()))?;
                    ctx.warn("after b", location!());
                    ctx.check(1 == 2, "1 == 2", location!());
                    Ok(())
                })
            })
            .build()
            .unwrap();
        let paths = Runner::new().run(registry.get("after abort").unwrap());

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].sections, vec!["a", "b"]);
        assert_eq!(paths[0].status, Status::Fail);
        assert_eq!(paths[0].warnings().collect::<Vec<_>>(), vec!["after b"]);
        let expressions: Vec<_> = paths[0].assertions().map(|a| a.original.as_str()).collect();
        assert_eq!(expressions, vec!["true", "false", "1 == 2"]);
    }

    #[test]
    fn cancelled_runner_stops_before_the_next_case() {
        let registry = RegistryBuilder::new()
            .case("one", "", location!(), |_: &mut Context| Ok(()))
            .case("two", "", location!(), |_: &mut Context| Ok(()))
            .build()
            .unwrap();
        let runner = Runner::new();
        runner.cancel_handle().cancel();
        let report = runner.run_all(&registry, &TestFilter::all());
        assert!(report.cancelled);
        assert!(report.cases.is_empty());
    }
}
