//! Fork/branch search engine shared by both backends
//!
//! A run starts from one root state and steps the current state until it
//! halts. Steps may emit copies of the state (forks and branches); those
//! wait on the frontier. Once a state halts it is delivered through
//! [`SearchHooks::result`] and its storage goes back to a free list, from
//! which later copies are served.
//!
//! The frontier is a stack, so the next state to run is always the most
//! recently forked live one (depth first).

pub mod config;
pub mod result;

pub use config::SearchConfig;
pub use result::{SearchOutcome, SearchReport, SearchStatistics};

use std::time::Instant;

use crate::error::SearchError;
use crate::word::StateId;

/// A resumable search state: a step-IR solution or a tiny machine.
pub trait SearchState: Clone {
    /// Runs one step; forking steps hand copies to `emit`.
    fn step(&mut self, emit: &mut Emitter<'_, Self>);

    fn is_halted(&self) -> bool;
}

/// Collects the states emitted by one step, serving copies from the pool.
pub struct Emitter<'a, S> {
    pool: &'a mut Vec<S>,
    out: &'a mut Vec<S>,
    reused: u64,
}

impl<'a, S: Clone> Emitter<'a, S> {
    /// Copies come from `pool`; emitted states collect in `out`.
    pub fn new(pool: &'a mut Vec<S>, out: &'a mut Vec<S>) -> Self {
        Self {
            pool,
            out,
            reused: 0,
        }
    }

    /// A fresh copy of `state`, reusing pooled storage when possible.
    pub fn copy_of(&mut self, state: &S) -> S {
        match self.pool.pop() {
            Some(mut copy) => {
                copy.clone_from(state);
                self.reused += 1;
                copy
            }
            None => state.clone(),
        }
    }

    pub fn emit(&mut self, child: S) {
        self.out.push(child);
    }
}

/// Callbacks of one search run.
pub trait SearchHooks<S> {
    fn before(&mut self, _id: StateId, _state: &S) {}

    fn after(&mut self, _id: StateId, _state: &S) {}

    /// A state entered the frontier; the root has no parent.
    fn fork(&mut self, _parent: Option<StateId>, _child: StateId, _state: &S) {}

    /// A state halted; returns true to stop the run.
    fn result(&mut self, id: StateId, state: &S) -> bool;

    /// Whether per-step callbacks are wanted at all.
    fn observes_steps(&self) -> bool {
        true
    }
}

/// Depth-first search engine over states of type `S`.
pub struct Search<S> {
    config: SearchConfig,
    frontier: Vec<(StateId, S)>,
    pool: Vec<S>,
    emitted: Vec<S>,
    next_id: StateId,
}

impl<S: SearchState> Search<S> {
    pub fn new(config: SearchConfig) -> Self {
        let frontier = Vec::with_capacity(config.frontier_capacity);
        Self {
            config,
            frontier,
            pool: Vec::new(),
            emitted: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of states waiting to run.
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Number of halted states kept for reuse.
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    fn alloc_id(&mut self) -> StateId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Runs `root` and everything it forks until the frontier drains, a
    /// hook asks to stop, or more than the step limit is spent.
    ///
    /// `budget` is the plan's own step limit; a configured `max_steps`
    /// overrides it.
    pub fn run(
        &mut self,
        root: S,
        budget: u64,
        hooks: &mut dyn SearchHooks<S>,
    ) -> Result<SearchReport, SearchError> {
        let start = Instant::now();
        let limit = self.config.step_limit(budget);
        let observe = hooks.observes_steps();
        let mut stats = SearchStatistics::new(limit);

        self.frontier.clear();
        self.next_id = 1;
        let root_id = self.alloc_id();
        hooks.fork(None, root_id, &root);
        self.frontier.push((root_id, root));
        stats.states = 1;
        stats.max_frontier = 1;

        let mut outcome = SearchOutcome::Exhausted;
        while let Some((id, mut state)) = self.frontier.pop() {
            while !state.is_halted() {
                if observe {
                    hooks.before(id, &state);
                }

                let mut emitter = Emitter::new(&mut self.pool, &mut self.emitted);
                state.step(&mut emitter);
                stats.reused += emitter.reused;
                stats.steps += 1;

                for child in std::mem::take(&mut self.emitted) {
                    let child_id = self.next_id;
                    self.next_id += 1;
                    hooks.fork(Some(id), child_id, &child);
                    self.frontier.push((child_id, child));
                    stats.states += 1;
                    stats.forks += 1;
                }
                stats.max_frontier = stats.max_frontier.max(self.frontier.len());

                if observe {
                    hooks.after(id, &state);
                }

                if stats.steps > limit {
                    stats.elapsed_time = start.elapsed();
                    log::debug!(
                        "search abandoned {} states after {} steps",
                        self.frontier.len() + 1,
                        stats.steps
                    );
                    self.frontier.clear();
                    return Err(SearchError::BudgetExhausted {
                        steps: stats.steps,
                        limit,
                    });
                }
            }

            stats.results += 1;
            log::trace!("state {id} halted after {} total steps", stats.steps);
            let stop = hooks.result(id, &state);
            if self.pool.len() < self.config.pool_limit {
                self.pool.push(state);
            }
            if stop {
                outcome = SearchOutcome::Stopped;
                self.frontier.clear();
                break;
            }
        }

        stats.elapsed_time = start.elapsed();
        log::debug!(
            "search {outcome}: {} results, {} states, {} steps",
            stats.results,
            stats.states,
            stats.steps
        );
        Ok(SearchReport {
            outcome,
            statistics: stats,
        })
    }
}
