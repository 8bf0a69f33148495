//! Section tracking across re-entries of a test case body.
//!
//! The tracker owns the section tree discovered so far. Each run-through of
//! the body calls [`SectionTracker::start_run`], then [`try_enter`] for every
//! `SECTION` it reaches and [`leave`] when the section body returns. Within
//! one run-through at most one not-yet-completed child of any open section is
//! entered, so a run-through executes a single root-to-leaf path. The body is
//! re-entered until the root is completed.
//!
//! A section is completed once every child it has is completed and its own
//! body has run to the end at least once, so siblings declared after an
//! aborted section are still discovered. The section a run aborted in is
//! completed immediately. A run-through that only re-walks finished sections
//! to reach code after an abort does not end at a leaf; the runner folds its
//! records into the path it re-walked.
//!
//! [`try_enter`]: SectionTracker::try_enter
//! [`leave`]: SectionTracker::leave

use std::collections::HashMap;

use log::{debug, warn};

/// Index of a node in the tracker's arena. The root is always `0`.
pub type SectionId = usize;

const ROOT: SectionId = 0;

#[derive(Debug)]
struct SectionNode {
    name: String,
    /// Distinguishes siblings that share a name.
    ordinal: usize,
    children: Vec<SectionId>,
    completed: bool,
    /// The node's body has returned normally at least once.
    finished_once: bool,
    /// Run number in which a child of this node was last entered.
    child_entered_in: Option<usize>,
}

impl SectionNode {
    fn new(name: &str, ordinal: usize) -> Self {
        Self {
            name: name.to_string(),
            ordinal,
            children: Vec::new(),
            completed: false,
            finished_once: false,
            child_entered_in: None,
        }
    }
}

/// What one run-through executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Entered section names, outermost first.
    pub sections: Vec<String>,
    /// Whether the innermost entered section (or the case itself) is a leaf.
    pub reached_leaf: bool,
}

#[derive(Debug)]
pub struct SectionTracker {
    nodes: Vec<SectionNode>,
    /// Sections currently open, root first.
    open: Vec<SectionId>,
    /// Sections entered during the current run, outermost first.
    entered: Vec<SectionId>,
    /// How many times each (parent, name) pair was encountered this run.
    seen: HashMap<(SectionId, String), usize>,
    /// The section the current run aborted in, if it aborted.
    aborted_in: Option<SectionId>,
    run: usize,
    progressed: bool,
}

impl SectionTracker {
    pub fn new(case_name: &str) -> Self {
        Self {
            nodes: vec![SectionNode::new(case_name, 0)],
            open: vec![ROOT],
            entered: Vec::new(),
            seen: HashMap::new(),
            aborted_in: None,
            run: 0,
            progressed: false,
        }
    }

    /// Number of run-throughs started so far.
    pub fn runs(&self) -> usize {
        self.run
    }

    pub fn is_complete(&self) -> bool {
        self.nodes[ROOT].completed
    }

    pub fn start_run(&mut self) {
        self.run += 1;
        self.open.clear();
        self.open.push(ROOT);
        self.entered.clear();
        self.seen.clear();
        self.aborted_in = None;
        self.progressed = false;
    }

    /// Decides whether the section `name`, reached inside the innermost open
    /// section, executes in this run. Returns its id when it does.
    pub fn try_enter(&mut self, name: &str) -> Option<SectionId> {
        let parent = *self.open.last().unwrap_or(&ROOT);
        let ordinal = {
            let count = self.seen.entry((parent, name.to_string())).or_insert(0);
            *count += 1;
            *count - 1
        };

        let id = self.find_or_insert_child(parent, name, ordinal);
        if self.nodes[id].completed || self.nodes[parent].child_entered_in == Some(self.run) {
            return None;
        }

        self.nodes[parent].child_entered_in = Some(self.run);
        self.open.push(id);
        self.entered.push(id);
        debug!("run {}: entering section '{}'", self.run, name);
        Some(id)
    }

    /// Closes the innermost open section, which must be `id`. `finished` is
    /// false when the section body was aborted.
    pub fn leave(&mut self, id: SectionId, finished: bool) {
        if self.open.last() != Some(&id) {
            // Out-of-order closes only happen after an unwind; end_run
            // reconciles whatever is still open.
            return;
        }
        self.open.pop();
        self.close(id, finished);
    }

    /// Finishes the current run-through. `finished` is false when the case
    /// body itself was aborted.
    pub fn end_run(&mut self, finished: bool) -> RunSummary {
        // Anything still open was unwound through.
        while let Some(id) = self.open.pop() {
            if id != ROOT {
                self.close(id, false);
            }
        }
        self.close(ROOT, finished);

        if !self.progressed && !self.is_complete() {
            // The body stopped short of every incomplete section it had
            // discovered; close the deepest one so re-entry always terminates.
            let stuck = self.entered.last().copied().unwrap_or(ROOT);
            warn!(
                "run {} made no progress; closing section '{}'",
                self.run, self.nodes[stuck].name
            );
            self.nodes[stuck].completed = true;
            self.propagate_completion(stuck);
        }

        self.open.push(ROOT);
        let innermost = self.entered.last().copied().unwrap_or(ROOT);
        RunSummary {
            sections: self
                .entered
                .iter()
                .map(|&id| self.nodes[id].name.clone())
                .collect(),
            reached_leaf: self.nodes[innermost].children.is_empty(),
        }
    }

    fn close(&mut self, id: SectionId, finished: bool) {
        if finished {
            if !self.nodes[id].finished_once {
                self.nodes[id].finished_once = true;
                self.progressed = true;
            }
            self.update_completion(id);
        } else if self.aborted_in.is_none() {
            self.aborted_in = Some(id);
            if !self.nodes[id].completed {
                self.nodes[id].completed = true;
                self.progressed = true;
            }
        } else {
            self.update_completion(id);
        }
    }

    fn find_or_insert_child(&mut self, parent: SectionId, name: &str, ordinal: usize) -> SectionId {
        let existing = self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name == name && self.nodes[c].ordinal == ordinal);
        if let Some(id) = existing {
            return id;
        }
        if ordinal > 0 {
            warn!(
                "section '{}' appears more than once under '{}'; treating occurrences as distinct",
                name, self.nodes[parent].name
            );
        }
        let id = self.nodes.len();
        self.nodes.push(SectionNode::new(name, ordinal));
        self.nodes[parent].children.push(id);
        id
    }

    fn update_completion(&mut self, id: SectionId) {
        let node = &self.nodes[id];
        if node.completed || !node.finished_once {
            return;
        }
        let done = node.children.iter().all(|&c| self.nodes[c].completed);
        if done {
            self.nodes[id].completed = true;
            self.progressed = true;
        }
    }

    fn propagate_completion(&mut self, from: SectionId) {
        // Ancestors of `from` on this run's path, outermost first.
        let mut chain: Vec<SectionId> = std::iter::once(ROOT)
            .chain(self.entered.iter().copied())
            .take_while(|&id| id != from)
            .collect();
        while let Some(id) = chain.pop() {
            self.update_completion(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (name, children, aborts)
    struct Node(&'static str, &'static [Node], bool);

    /// Drives the tracker through one run of a body shaped like `tree`.
    /// Returns false when an aborting section was executed.
    fn walk(tracker: &mut SectionTracker, tree: &[Node]) -> bool {
        for node in tree {
            if let Some(id) = tracker.try_enter(node.0) {
                let finished = walk(tracker, node.1) && !node.2;
                tracker.leave(id, finished);
                if !finished {
                    return false;
                }
            }
        }
        true
    }

    /// Every run as (sections, reached_leaf).
    fn all_runs(tree: &[Node]) -> Vec<RunSummary> {
        let mut tracker = SectionTracker::new("case");
        let mut runs = Vec::new();
        while !tracker.is_complete() {
            tracker.start_run();
            let finished = walk(&mut tracker, tree);
            runs.push(tracker.end_run(finished));
            assert!(tracker.runs() < 100, "tracker did not terminate");
        }
        runs
    }

    fn leaf_paths(tree: &[Node]) -> Vec<Vec<String>> {
        all_runs(tree)
            .into_iter()
            .filter(|r| r.reached_leaf)
            .map(|r| r.sections)
            .collect()
    }

    fn path(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_sections_means_one_run() {
        let runs = all_runs(&[]);
        assert_eq!(runs.len(), 1);
        assert!(runs[0].reached_leaf);
        assert!(runs[0].sections.is_empty());
    }

    #[test]
    fn each_leaf_runs_exactly_once() {
        const TREE: &[Node] = &[
            Node(
                "a",
                &[Node("a1", &[], false), Node("a2", &[Node("a2x", &[], false)], false)],
                false,
            ),
            Node("b", &[], false),
        ];
        assert_eq!(
            leaf_paths(TREE),
            vec![path(&["a", "a1"]), path(&["a", "a2", "a2x"]), path(&["b"])]
        );
    }

    #[test]
    fn duplicate_names_are_distinct_sections() {
        const TREE: &[Node] = &[Node("same", &[], false), Node("same", &[], false)];
        assert_eq!(leaf_paths(TREE).len(), 2);
    }

    #[test]
    fn siblings_after_an_aborted_section_still_run() {
        const TREE: &[Node] = &[
            Node("fails", &[], true),
            Node("later", &[], false),
            Node("last", &[], true),
        ];
        assert_eq!(
            leaf_paths(TREE),
            vec![path(&["fails"]), path(&["later"]), path(&["last"])]
        );
    }

    #[test]
    fn abort_in_a_nested_leaf_yields_one_leaf_path() {
        const TREE: &[Node] = &[Node("equals", &[Node("bar", &[], true)], false)];
        let runs = all_runs(TREE);
        assert_eq!(leaf_paths(TREE), vec![path(&["equals", "bar"])]);
        // The parent is re-walked once to reach the code after "bar".
        assert_eq!(runs.len(), 2);
        assert!(!runs[1].reached_leaf);
    }

    #[test]
    fn run_that_skips_known_sections_still_terminates() {
        let mut tracker = SectionTracker::new("case");
        tracker.start_run();
        let a = tracker.try_enter("a").unwrap();
        let a1 = tracker.try_enter("a1").unwrap();
        tracker.leave(a1, true);
        assert!(tracker.try_enter("a2").is_none());
        tracker.leave(a, true);
        assert_eq!(tracker.end_run(true).sections, path(&["a", "a1"]));
        assert!(!tracker.is_complete());

        // The body takes another branch and never reaches "a" again.
        tracker.start_run();
        assert!(tracker.end_run(true).sections.is_empty());
        assert!(tracker.is_complete());
    }

    #[test]
    fn sections_left_open_by_an_unwind_are_closed() {
        let mut tracker = SectionTracker::new("case");
        tracker.start_run();
        tracker.try_enter("a").unwrap();
        tracker.try_enter("a1").unwrap();
        let summary = tracker.end_run(false);
        assert_eq!(summary.sections, path(&["a", "a1"]));
        assert!(summary.reached_leaf);

        // "a" never finished, so it is walked once more before completing.
        tracker.start_run();
        let a = tracker.try_enter("a").unwrap();
        assert!(tracker.try_enter("a1").is_none());
        tracker.leave(a, true);
        assert!(!tracker.end_run(true).reached_leaf);
        assert!(tracker.is_complete());
    }
}
