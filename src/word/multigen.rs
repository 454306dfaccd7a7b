//! Fan-out over several generators.

use crate::error::{PlanError, SolutionError};
use crate::word::generator::{FinalizeResult, Generator};
use crate::word::plan::Plan;
use crate::word::plan_problem::PlanProblem;

/// Forwards every operation to each member in order; typically one
/// concrete backend plus a [`LogGen`](crate::word::LogGen).
#[derive(Default)]
pub struct MultiGen {
    gens: Vec<Box<dyn Generator>>,
}

impl MultiGen {
    pub fn new(gens: Vec<Box<dyn Generator>>) -> Self {
        Self { gens }
    }

    pub fn push(&mut self, gen: Box<dyn Generator>) {
        self.gens.push(gen);
    }

    pub fn len(&self) -> usize {
        self.gens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gens.is_empty()
    }

    fn each(
        &mut self,
        mut f: impl FnMut(&mut dyn Generator) -> Result<(), PlanError>,
    ) -> Result<(), PlanError> {
        for gen in &mut self.gens {
            f(gen.as_mut())?;
        }
        Ok(())
    }
}

impl Generator for MultiGen {
    fn logf(&mut self, prob: &PlanProblem, msg: &str) {
        for gen in &mut self.gens {
            gen.logf(prob, msg);
        }
    }

    fn init(&mut self, prob: &PlanProblem, desc: &str) -> Result<(), PlanError> {
        self.each(|g| g.init(prob, desc))
    }

    fn fork(
        &mut self,
        prob: &PlanProblem,
        name: &str,
        alt: &str,
        cont: &str,
    ) -> Result<Box<dyn Generator>, PlanError> {
        let alts = self
            .gens
            .iter_mut()
            .map(|g| g.fork(prob, name, alt, cont))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(MultiGen::new(alts)))
    }

    fn fix(&mut self, prob: &PlanProblem, c: u8, v: u8) -> Result<(), PlanError> {
        self.each(|g| g.fix(prob, c, v))
    }

    fn compute_sum(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError> {
        self.each(|g| g.compute_sum(prob, col))
    }

    fn compute_first_summand(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError> {
        self.each(|g| g.compute_first_summand(prob, col))
    }

    fn compute_second_summand(
        &mut self,
        prob: &PlanProblem,
        col: usize,
    ) -> Result<(), PlanError> {
        self.each(|g| g.compute_second_summand(prob, col))
    }

    fn choose_range(
        &mut self,
        prob: &PlanProblem,
        c: u8,
        min: u8,
        max: u8,
    ) -> Result<(), PlanError> {
        self.each(|g| g.choose_range(prob, c, min, max))
    }

    fn check_column(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        err: Option<SolutionError>,
    ) -> Result<(), PlanError> {
        self.each(|g| g.check_column(prob, col, err.clone()))
    }

    fn check(&mut self, prob: &PlanProblem, err: SolutionError) -> Result<(), PlanError> {
        self.each(|g| g.check(prob, err.clone()))
    }

    fn verify(&mut self, prob: &PlanProblem) -> Result<(), PlanError> {
        self.each(|g| g.verify(prob))
    }

    fn finish(&mut self, prob: &PlanProblem) -> Result<(), PlanError> {
        self.each(|g| g.finish(prob))
    }

    /// Finalizes every member; exactly one must yield a plan.
    fn finalize(&mut self, prob: &PlanProblem) -> FinalizeResult {
        let mut plan: Option<Box<dyn Plan>> = None;
        for gen in &mut self.gens {
            if let Some(p) = gen.finalize(prob)? {
                if plan.is_some() {
                    return Err(PlanError::MultipleConcretePlans);
                }
                plan = Some(p);
            }
        }
        match plan {
            Some(plan) => Ok(Some(plan)),
            None => Err(PlanError::NoConcretePlan),
        }
    }
}
