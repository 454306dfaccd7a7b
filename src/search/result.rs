//! Search outcome types and statistics

use std::time::Duration;

/// Why a search run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOutcome {
    /// Every state ran to completion
    #[default]
    Exhausted,
    /// A resultor or watcher asked to stop
    Stopped,
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchOutcome::Exhausted => write!(f, "exhausted"),
            SearchOutcome::Stopped => write!(f, "stopped"),
        }
    }
}

/// Statistics from a search run
#[derive(Debug, Clone, Default)]
pub struct SearchStatistics {
    /// Total time spent searching
    pub elapsed_time: Duration,
    /// Steps executed across all states
    pub steps: u64,
    /// States created, including the root
    pub states: u64,
    /// States created by fork or branch
    pub forks: u64,
    /// States that ran to completion and were delivered
    pub results: u64,
    /// Largest number of states waiting at once
    pub max_frontier: usize,
    /// Copies served from the free list instead of allocating
    pub reused: u64,
    /// Step limit in force for the run
    pub step_limit: u64,
}

impl SearchStatistics {
    pub fn new(step_limit: u64) -> Self {
        Self {
            step_limit,
            ..Default::default()
        }
    }

    /// Average steps per delivered state
    pub fn steps_per_result(&self) -> f64 {
        if self.results == 0 {
            0.0
        } else {
            self.steps as f64 / self.results as f64
        }
    }

    /// Fraction of copies that reused pooled storage (0.0 to 1.0)
    pub fn reuse_rate(&self) -> f64 {
        if self.forks == 0 {
            0.0
        } else {
            self.reused as f64 / self.forks as f64
        }
    }

    /// Get steps executed per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.steps as f64 / secs
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Time: {:.2?}\n", self.elapsed_time));
        s.push_str(&format!("Steps: {} (limit {})\n", self.steps, self.step_limit));
        s.push_str(&format!("Throughput: {:.0} steps/sec\n", self.throughput()));
        s.push_str(&format!("States: {}\n", self.states));
        s.push_str(&format!("Forks: {}\n", self.forks));
        s.push_str(&format!("Results: {}\n", self.results));
        s.push_str(&format!("Max frontier: {}\n", self.max_frontier));

        if self.forks > 0 {
            s.push_str(&format!("Pool reuse: {:.2}%\n", self.reuse_rate() * 100.0));
        }

        s
    }
}

/// Result of a completed search run
#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    pub statistics: SearchStatistics,
}

impl std::fmt::Display for SearchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Search {}.", self.outcome)?;
        write!(f, "{}", self.statistics.format_summary())
    }
}
