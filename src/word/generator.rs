//! The operations a strategy emits into a backend.

use crate::error::{PlanError, SolutionError};
use crate::word::plan::Plan;
use crate::word::plan_problem::PlanProblem;

/// Result of finalizing a generator: a runnable plan for concrete backends,
/// `None` for purely observational ones.
pub type FinalizeResult = Result<Option<Box<dyn Plan>>, PlanError>;

/// A backend that turns planning operations into something runnable.
///
/// Every operation receives the planning state as it stands *before* the
/// operation updates it. Column arguments are indices into
/// `prob.columns`.
pub trait Generator {
    /// Free form commentary; only observational generators print it.
    fn logf(&mut self, _prob: &PlanProblem, _msg: &str) {}

    fn init(&mut self, prob: &PlanProblem, desc: &str) -> Result<(), PlanError>;

    /// Returns a sibling generator for an alternate path of execution.
    ///
    /// Everything emitted into the returned generator, up to and including
    /// its `finish`, forms the alternate path. Emissions into `self` after
    /// the fork continue the original path at the continuation point.
    fn fork(
        &mut self,
        prob: &PlanProblem,
        name: &str,
        alt: &str,
        cont: &str,
    ) -> Result<Box<dyn Generator>, PlanError>;

    fn fix(&mut self, prob: &PlanProblem, c: u8, v: u8) -> Result<(), PlanError>;

    /// `c = carry + a + b (mod base)`
    fn compute_sum(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError>;

    /// `a = c - b - carry (mod base)`
    fn compute_first_summand(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError>;

    /// `b = c - a - carry (mod base)`
    fn compute_second_summand(&mut self, prob: &PlanProblem, col: usize)
        -> Result<(), PlanError>;

    /// Tries every unused digit in `[min, max]` for `c`.
    fn choose_range(&mut self, prob: &PlanProblem, c: u8, min: u8, max: u8)
        -> Result<(), PlanError>;

    /// Ensures the column sum holds, exiting with `err` (or a default
    /// check failure) otherwise.
    fn check_column(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        err: Option<SolutionError>,
    ) -> Result<(), PlanError>;

    /// Ensures the whole sum holds, exiting with `err` otherwise.
    fn check(&mut self, prob: &PlanProblem, err: SolutionError) -> Result<(), PlanError>;

    /// Full validation of the letter mapping.
    fn verify(&mut self, prob: &PlanProblem) -> Result<(), PlanError>;

    /// Normal exit.
    fn finish(&mut self, prob: &PlanProblem) -> Result<(), PlanError>;

    fn finalize(&mut self, prob: &PlanProblem) -> FinalizeResult;
}
