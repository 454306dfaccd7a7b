//! Collects a per-state execution trace and attaches it to results.

use std::collections::HashMap;

use crate::word::plan::{StateId, Watcher};
use crate::word::solution::{Solution, TracedSolution};

/// Appends a numbered dump of each state before every step.
///
/// A forked child starts with a copy of its parent's trace; both get a
/// fork marker. Results are wrapped as [`TracedSolution`]s.
#[derive(Debug, Default)]
pub struct TraceWatcher {
    traces: HashMap<StateId, Vec<String>>,
}

impl TraceWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The trace collected so far for a live state.
    pub fn trace_of(&self, id: StateId) -> &[String] {
        self.traces.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn take_dump(&mut self, id: StateId, sol: &dyn Solution) -> &mut Vec<String> {
        let trace = self.traces.entry(id).or_default();
        sol.dump(&mut |line| {
            let n = trace.len();
            trace.push(format!("{n:04}> {line}"));
        });
        trace
    }
}

impl Watcher for TraceWatcher {
    fn before(&mut self, id: StateId, sol: &dyn Solution) {
        self.take_dump(id, sol);
    }

    fn fork(&mut self, parent: Option<StateId>, child: StateId, _sol: &dyn Solution) {
        let Some(parent) = parent else {
            self.traces.insert(child, Vec::new());
            return;
        };
        let trace = self.traces.entry(parent).or_default();
        let i = trace.len();
        trace.push(format!("{i:04}* FORK : Parent"));
        let mut copy = trace.clone();
        if let Some(last) = copy.last_mut() {
            *last = format!("{i:04}* FORK : Child");
        }
        self.traces.insert(child, copy);
    }

    fn result(&mut self, id: StateId, _sol: &dyn Solution) -> bool {
        self.traces.remove(&id);
        false
    }

    fn wrap_result(&mut self, id: StateId, sol: &dyn Solution) -> Option<Box<dyn Solution>> {
        self.take_dump(id, sol);
        let trace = self.traces.remove(&id).unwrap_or_default();
        Some(Box::new(TracedSolution::new(sol, trace)))
    }
}
