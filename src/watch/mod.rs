//! Search watchers: composition, debug logging, counters and traces.

pub mod debug;
pub mod metric;
pub mod trace;

pub use debug::{DebugId, DebugWatcher};
pub use metric::MetricWatcher;
pub use trace::TraceWatcher;

use crate::word::plan::{Resultor, StateId, Watcher};
use crate::word::solution::Solution;

/// Dispatches every event to several watchers in order.
///
/// Each watcher may wrap the result handed on by the one before it; all
/// results are consulted and the run stops if any says so.
#[derive(Default)]
pub struct Watchers<'w> {
    watchers: Vec<&'w mut dyn Watcher>,
}

impl<'w> Watchers<'w> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, watcher: &'w mut dyn Watcher) -> Self {
        self.watchers.push(watcher);
        self
    }

    pub fn push(&mut self, watcher: &'w mut dyn Watcher) {
        self.watchers.push(watcher);
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

impl Watcher for Watchers<'_> {
    fn before(&mut self, id: StateId, sol: &dyn Solution) {
        for w in self.watchers.iter_mut() {
            w.before(id, sol);
        }
    }

    fn after(&mut self, id: StateId, sol: &dyn Solution) {
        for w in self.watchers.iter_mut() {
            w.after(id, sol);
        }
    }

    fn fork(&mut self, parent: Option<StateId>, child: StateId, sol: &dyn Solution) {
        for w in self.watchers.iter_mut() {
            w.fork(parent, child, sol);
        }
    }

    fn result(&mut self, id: StateId, sol: &dyn Solution) -> bool {
        let mut stop = false;
        for w in self.watchers.iter_mut() {
            stop = w.result(id, sol) || stop;
        }
        stop
    }

    fn wrap_result(&mut self, id: StateId, sol: &dyn Solution) -> Option<Box<dyn Solution>> {
        let mut wrapped: Option<Box<dyn Solution>> = None;
        for w in self.watchers.iter_mut() {
            let cur: &dyn Solution = match wrapped.as_deref() {
                Some(s) => s,
                None => sol,
            };
            if let Some(next) = w.wrap_result(id, cur) {
                wrapped = Some(next);
            }
        }
        wrapped
    }
}

/// Adapts a [`Resultor`] into a watcher that only sees results.
pub struct ResultWatcher<R> {
    res: R,
}

impl<R: Resultor> ResultWatcher<R> {
    pub fn new(res: R) -> Self {
        Self { res }
    }

    pub fn into_inner(self) -> R {
        self.res
    }
}

impl<R: Resultor> Watcher for ResultWatcher<R> {
    fn result(&mut self, _id: StateId, sol: &dyn Solution) -> bool {
        self.res.result(sol)
    }
}
