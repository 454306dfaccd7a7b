//! Configuration types for plan runs

/// Search engine configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Overrides the plan's computed step budget
    pub max_steps: Option<u64>,
    /// Initial frontier capacity
    pub frontier_capacity: usize,
    /// Most finished states kept for reuse
    pub pool_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            frontier_capacity: 64,
            pool_limit: 256,
        }
    }
}

impl SearchConfig {
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_max_steps_option(mut self, steps: Option<u64>) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_frontier_capacity(mut self, capacity: usize) -> Self {
        self.frontier_capacity = capacity;
        self
    }

    pub fn with_pool_limit(mut self, limit: usize) -> Self {
        self.pool_limit = limit;
        self
    }

    /// The effective step limit given a plan's own budget.
    pub fn step_limit(&self, budget: u64) -> u64 {
        self.max_steps.unwrap_or(budget)
    }
}
