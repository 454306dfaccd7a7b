//! Runnable plans and the sinks and observers that consume their states.

use crate::error::SearchError;
use crate::search::{SearchHooks, SearchReport};
use crate::word::problem::Problem;
use crate::word::solution::Solution;

/// Identifies one search state for the lifetime of a run; the root state
/// is 1 and every forked state gets the next id.
pub type StateId = u64;

/// Consumes finished states of a plan run.
pub trait Resultor {
    /// Extracts whatever is needed from a finished state; the state must not
    /// be retained. Returns true to stop the search.
    fn result(&mut self, sol: &dyn Solution) -> bool;
}

impl<F> Resultor for F
where
    F: FnMut(&dyn Solution) -> bool,
{
    fn result(&mut self, sol: &dyn Solution) -> bool {
        self(sol)
    }
}

/// Observes a plan run.
pub trait Watcher {
    fn before(&mut self, _id: StateId, _sol: &dyn Solution) {}

    fn after(&mut self, _id: StateId, _sol: &dyn Solution) {}

    /// A new state was created; `parent` is `None` for the root.
    fn fork(&mut self, _parent: Option<StateId>, _child: StateId, _sol: &dyn Solution) {}

    /// A state finished; returns true to stop the search.
    fn result(&mut self, _id: StateId, _sol: &dyn Solution) -> bool {
        false
    }

    /// May replace a finished state with a richer one before it is
    /// delivered onwards.
    fn wrap_result(&mut self, _id: StateId, _sol: &dyn Solution) -> Option<Box<dyn Solution>> {
        None
    }
}

/// A compiled plan that can be run to find solutions.
pub trait Plan {
    fn problem(&self) -> &Problem;

    fn run_watched(
        &self,
        res: &mut dyn Resultor,
        watcher: Option<&mut dyn Watcher>,
    ) -> Result<SearchReport, SearchError>;

    fn run(&self, res: &mut dyn Resultor) -> Result<SearchReport, SearchError> {
        self.run_watched(res, None)
    }

    /// Prints the compiled program with any annotations.
    fn dump(&self, out: &mut dyn FnMut(&str));

    /// Annotations recorded at the program position of `sol`.
    fn decorate(&self, sol: &dyn Solution) -> Vec<String>;
}

/// Routes search events of one run to an optional watcher and the resultor.
pub struct Delivery<'r, 'w> {
    res: &'r mut dyn Resultor,
    watcher: Option<&'w mut dyn Watcher>,
}

impl<'r, 'w> Delivery<'r, 'w> {
    pub fn new(res: &'r mut dyn Resultor, watcher: Option<&'w mut dyn Watcher>) -> Self {
        Self { res, watcher }
    }

    pub fn is_watched(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn before(&mut self, id: StateId, sol: &dyn Solution) {
        if let Some(w) = self.watcher.as_deref_mut() {
            w.before(id, sol);
        }
    }

    pub fn after(&mut self, id: StateId, sol: &dyn Solution) {
        if let Some(w) = self.watcher.as_deref_mut() {
            w.after(id, sol);
        }
    }

    pub fn fork(&mut self, parent: Option<StateId>, child: StateId, sol: &dyn Solution) {
        if let Some(w) = self.watcher.as_deref_mut() {
            w.fork(parent, child, sol);
        }
    }

    /// Lets the watcher wrap and see the finished state, then hands it to
    /// the resultor. Returns true if either asks to stop.
    pub fn result(&mut self, id: StateId, sol: &dyn Solution) -> bool {
        let Some(w) = self.watcher.as_deref_mut() else {
            return self.res.result(sol);
        };
        let wrapped = w.wrap_result(id, sol);
        let sol: &dyn Solution = match wrapped.as_deref() {
            Some(wrapped) => wrapped,
            None => sol,
        };
        let stop = w.result(id, sol);
        self.res.result(sol) || stop
    }
}

impl<S: Solution> SearchHooks<S> for Delivery<'_, '_> {
    fn before(&mut self, id: StateId, state: &S) {
        Delivery::before(self, id, state);
    }

    fn after(&mut self, id: StateId, state: &S) {
        Delivery::after(self, id, state);
    }

    fn fork(&mut self, parent: Option<StateId>, child: StateId, state: &S) {
        Delivery::fork(self, parent, child, state);
    }

    fn result(&mut self, id: StateId, state: &S) -> bool {
        Delivery::result(self, id, state)
    }

    fn observes_steps(&self) -> bool {
        self.is_watched()
    }
}
