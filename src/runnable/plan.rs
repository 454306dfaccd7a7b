//! Runnable step plans.

use std::rc::Rc;

use crate::error::SearchError;
use crate::runnable::machine::{StepProgram, StepSolution};
use crate::search::{Search, SearchConfig, SearchReport};
use crate::word::plan::{Delivery, Plan, Resultor, Watcher};
use crate::word::problem::Problem;
use crate::word::solution::Solution;

/// A compiled step program plus the search settings to run it with.
pub struct StepPlan {
    program: Rc<StepProgram>,
    config: SearchConfig,
}

impl StepPlan {
    pub fn new(program: StepProgram, config: SearchConfig) -> Self {
        Self {
            program: Rc::new(program),
            config,
        }
    }

    pub fn program(&self) -> &StepProgram {
        &self.program
    }
}

impl Plan for StepPlan {
    fn problem(&self) -> &Problem {
        &self.program.problem
    }

    fn run_watched(
        &self,
        res: &mut dyn Resultor,
        watcher: Option<&mut dyn Watcher>,
    ) -> Result<SearchReport, SearchError> {
        let mut delivery = Delivery::new(res, watcher);
        let root = StepSolution::new(self.program.clone());
        let report = Search::new(self.config.clone()).run(
            root,
            self.program.budget(),
            &mut delivery,
        )?;
        log::debug!("step plan run:\n{}", report.statistics.format_summary());
        Ok(report)
    }

    fn dump(&self, out: &mut dyn FnMut(&str)) {
        self.program.dump(out);
    }

    fn decorate(&self, sol: &dyn Solution) -> Vec<String> {
        sol.position()
            .and_then(|addr| self.program.compiled.annotations.get(&addr))
            .cloned()
            .unwrap_or_default()
    }
}
