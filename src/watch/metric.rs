//! Simple search counters.

use crate::word::plan::{StateId, Watcher};
use crate::word::solution::Solution;

/// Counts steps, forks and results of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricWatcher {
    pub steps: u64,
    /// States entered into the frontier, the root included.
    pub emits: u64,
    /// States forked from a running parent.
    pub forks: u64,
    pub results: u64,
    /// Results that did not check out.
    pub failures: u64,
    /// Most states alive at once.
    pub max_live: u64,
    live: u64,
}

impl MetricWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> u64 {
        self.results - self.failures
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Steps: {}\nEmits: {}\nForks: {}\nResults: {} ({} ok, {} failed)\nMax live states: {}",
            self.steps,
            self.emits,
            self.forks,
            self.results,
            self.successes(),
            self.failures,
            self.max_live
        )
    }
}

impl Watcher for MetricWatcher {
    fn before(&mut self, _id: StateId, _sol: &dyn Solution) {
        self.steps += 1;
    }

    fn fork(&mut self, parent: Option<StateId>, _child: StateId, _sol: &dyn Solution) {
        self.emits += 1;
        if parent.is_some() {
            self.forks += 1;
        }
        self.live += 1;
        self.max_live = self.max_live.max(self.live);
    }

    fn result(&mut self, _id: StateId, sol: &dyn Solution) -> bool {
        self.results += 1;
        if sol.check().is_err() {
            self.failures += 1;
        }
        self.live = self.live.saturating_sub(1);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolutionError;
    use crate::word::problem::Problem;

    struct Stub {
        problem: Problem,
        ok: bool,
    }

    impl Solution for Stub {
        fn problem(&self) -> &Problem {
            &self.problem
        }

        fn value_of(&self, _c: u8) -> (i32, bool) {
            (0, false)
        }

        fn check(&self) -> Result<(), SolutionError> {
            if self.ok {
                Ok(())
            } else {
                Err(SolutionError::CheckFailed)
            }
        }

        fn dump(&self, _out: &mut dyn FnMut(&str)) {}
    }

    #[test]
    fn test_metric_counts() {
        let problem = Problem::setup("a", "b", "c").unwrap();
        let good = Stub {
            problem: problem.clone(),
            ok: true,
        };
        let bad = Stub { problem, ok: false };
        let mut m = MetricWatcher::new();
        m.fork(None, 1, &good);
        m.before(1, &good);
        m.fork(Some(1), 2, &bad);
        m.before(1, &good);
        m.result(1, &good);
        m.before(2, &bad);
        m.result(2, &bad);
        assert_eq!(m.steps, 3);
        assert_eq!(m.emits, 2);
        assert_eq!(m.forks, 1);
        assert_eq!(m.results, 2);
        assert_eq!(m.failures, 1);
        assert_eq!(m.successes(), 1);
        assert_eq!(m.max_live, 2);
        assert!(m.format_summary().contains("Results: 2 (1 ok, 1 failed)"));
    }
}
