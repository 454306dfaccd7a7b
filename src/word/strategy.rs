//! Top level solving strategies.
//!
//! Each strategy drives a generator through a whole problem and returns
//! whatever the generator finalizes into:
//!
//! - naive brute force: choose every letter, then check the sum
//! - pruned brute force: choose a column's letters, then check that column,
//!   right to left
//! - bottom up: right to left, choose letters until one is left in a
//!   column, then compute it
//! - top down: left to right, forking on each unknown carry

use crate::error::{PlanError, SolutionError};
use crate::word::generator::{FinalizeResult, Generator};
use crate::word::plan_problem::PlanProblem;

/// Available strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    NaiveBrute,
    PrunedBrute,
    BottomUp,
    #[default]
    TopDown,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::NaiveBrute,
        Strategy::PrunedBrute,
        Strategy::BottomUp,
        Strategy::TopDown,
    ];

    /// Plans `prob` into `gen` with this strategy.
    pub fn plan(
        self,
        prob: &mut PlanProblem,
        gen: &mut dyn Generator,
        verified: bool,
    ) -> FinalizeResult {
        match self {
            Strategy::NaiveBrute => plan_naive_brute(prob, gen, verified),
            Strategy::PrunedBrute => plan_pruned_brute(prob, gen, verified),
            Strategy::BottomUp => plan_bottom_up(prob, gen, verified),
            Strategy::TopDown => plan_top_down(prob, gen, verified),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::NaiveBrute => write!(f, "naive-brute"),
            Strategy::PrunedBrute => write!(f, "pruned-brute"),
            Strategy::BottomUp => write!(f, "bottom-up"),
            Strategy::TopDown => write!(f, "top-down"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "naive-brute" | "naive" => Ok(Strategy::NaiveBrute),
            "pruned-brute" | "pruned" => Ok(Strategy::PrunedBrute),
            "bottom-up" | "bottomup" => Ok(Strategy::BottomUp),
            "top-down" | "topdown" => Ok(Strategy::TopDown),
            _ => Err(format!(
                "Unknown strategy: '{}'. Valid options: naive-brute, pruned-brute, bottom-up, top-down",
                s
            )),
        }
    }
}

fn finish_plan(prob: &PlanProblem, gen: &mut dyn Generator, verified: bool) -> FinalizeResult {
    if verified {
        gen.verify(prob)?;
    }
    gen.finish(prob)?;
    gen.finalize(prob)
}

/// Chooses every letter over the whole base in sorted order, then checks
/// the sum. Branches factorially in the number of letters.
pub fn plan_naive_brute(
    prob: &mut PlanProblem,
    gen: &mut dyn Generator,
    verified: bool,
) -> FinalizeResult {
    gen.init(prob, "naive brute force")?;
    let top = prob.base() - 1;
    for c in prob.problem.sorted_letters() {
        prob.choose_range(gen, c, 0, top)?;
    }
    gen.check(prob, SolutionError::CheckFailed)?;
    finish_plan(prob, gen, verified)
}

/// Chooses all letters of a column, then checks it, right to left; each
/// check prunes the choices before the next column widens the search.
pub fn plan_pruned_brute(
    prob: &mut PlanProblem,
    gen: &mut dyn Generator,
    verified: bool,
) -> FinalizeResult {
    gen.init(prob, "pruned brute force")?;
    let top = prob.base() - 1;
    for i in (0..prob.columns.len()).rev() {
        for c in prob.columns[i].chars {
            if c != 0 && !prob.is_known(c) {
                let min = u8::from(prob.problem.is_initial_letter(c));
                prob.choose_range(gen, c, min, top)?;
            }
        }
        prob.check_column(gen, i)?;
    }
    finish_plan(prob, gen, verified)
}

/// Right to left: choose letters until one is unknown, then compute it.
pub fn plan_bottom_up(
    prob: &mut PlanProblem,
    gen: &mut dyn Generator,
    verified: bool,
) -> FinalizeResult {
    gen.init(prob, "bottom up")?;
    for i in (0..prob.columns.len()).rev() {
        if !prob.may_solve_column(gen, i)? {
            return Err(PlanError::UnsolvableColumn {
                column: prob.column_label(i),
            });
        }
    }
    finish_plan(prob, gen, verified)
}

/// Left to right: solve a column when its carry in is known, otherwise fork
/// on the carry (0 on the alternate path, 1 on this one).
///
/// The carry fork is a static two way branch, and leading letters can
/// never be zero, so choices made early are narrower than bottom up's.
pub fn plan_top_down(
    prob: &mut PlanProblem,
    gen: &mut dyn Generator,
    verified: bool,
) -> FinalizeResult {
    fn proc(
        prob: &mut PlanProblem,
        gen: &mut dyn Generator,
        col: usize,
        verified: bool,
    ) -> Result<bool, PlanError> {
        let Some(prior) = prob.columns[col].prior else {
            if !prob.may_solve_column(gen, col)? {
                return Ok(false);
            }
            if verified {
                gen.verify(prob)?;
            }
            gen.finish(prob)?;
            return Ok(true);
        };
        if prob.may_solve_column(gen, col)? {
            return proc(prob, gen, prior, verified);
        }
        prob.assume_carry_solve_column(gen, col, &|prob, gen, col| {
            proc(prob, gen, col, verified)
        })
    }

    gen.init(prob, "top down")?;
    if !proc(prob, gen, 0, verified)? {
        return Err(PlanError::TopDownFailed);
    }
    gen.finalize(prob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::loggen::LogGen;
    use crate::word::problem::Problem;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn narrate(strategy: Strategy, verified: bool) -> Vec<String> {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink_lines = lines.clone();
        let mut gen = LogGen::with_sink(Rc::new(move |s: &str| {
            sink_lines.borrow_mut().push(s.to_string())
        }));
        let problem = Problem::setup("send", "more", "money").unwrap();
        let mut prob = PlanProblem::new(&problem, false);
        // a log generator alone yields no plan
        assert!(strategy.plan(&mut prob, &mut gen, verified).unwrap().is_none());
        let out = lines.borrow().clone();
        out
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("top-down".parse::<Strategy>().unwrap(), Strategy::TopDown);
        assert_eq!("Bottom_Up".parse::<Strategy>().unwrap(), Strategy::BottomUp);
        assert_eq!("naive".parse::<Strategy>().unwrap(), Strategy::NaiveBrute);
        assert!("sideways".parse::<Strategy>().is_err());
        for s in Strategy::ALL {
            assert_eq!(s.to_string().parse::<Strategy>().unwrap(), s);
        }
    }

    #[test]
    fn test_naive_chooses_every_letter() {
        let lines = narrate(Strategy::NaiveBrute, false);
        assert!(lines.contains(&"// method: naive brute force".to_string()));
        let chooses = lines.iter().filter(|l| l.contains("choose")).count();
        assert_eq!(chooses, 8);
        assert!(lines.iter().any(|l| l.ends_with(": check")));
        assert!(lines.iter().any(|l| l.ends_with(": finish")));
    }

    #[test]
    fn test_pruned_checks_every_column() {
        let lines = narrate(Strategy::PrunedBrute, true);
        let checks = lines.iter().filter(|l| l.contains("check column")).count();
        assert_eq!(checks, 5);
        assert!(lines.iter().any(|l| l.ends_with(": verify")));
    }

    #[test]
    fn test_bottom_up_computes() {
        let lines = narrate(Strategy::BottomUp, false);
        assert!(lines.iter().any(|l| l.contains("compute y = d + e + carry (mod 10)")));
        assert!(!lines.iter().any(|l| l.ends_with(": verify")));
    }

    #[test]
    fn test_top_down_forks_on_carry() {
        let lines = narrate(Strategy::TopDown, false);
        assert!(lines.iter().any(|l| l.contains("fix m = 1")));
        assert!(lines.iter().any(|l| l.contains(":alt>")));
        let finishes = lines.iter().filter(|l| l.ends_with(": finish")).count();
        assert!(finishes >= 2);
    }
}
