//! A generator that only narrates planning.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{PlanError, SolutionError};
use crate::log::{info_sink, LogSink};
use crate::word::generator::{FinalizeResult, Generator};
use crate::word::plan_problem::PlanProblem;

/// Prints one line of commentary per planning operation.
///
/// Lines are prefixed with the fork context; every fork indents the
/// alternate path by two more spaces.
pub struct LogGen {
    sink: LogSink,
    prefix: String,
    step: usize,
    branches: Rc<RefCell<Vec<usize>>>,
}

impl Default for LogGen {
    fn default() -> Self {
        Self::new()
    }
}

impl LogGen {
    /// Narrates through `log::info!`.
    pub fn new() -> Self {
        Self::with_sink(info_sink())
    }

    pub fn with_sink(sink: LogSink) -> Self {
        Self {
            sink,
            prefix: String::new(),
            step: 0,
            branches: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn say(&self, msg: &str) {
        if self.prefix.is_empty() {
            (self.sink)(&format!("// {msg}"));
        } else {
            (self.sink)(&format!("// {}> {msg}", self.prefix));
        }
    }

    fn stepf(&mut self, msg: &str) {
        self.step += 1;
        self.say(&format!("step[{}]: {msg}", self.step));
    }

    fn compute_summand(&mut self, prob: &PlanProblem, a: u8, b: u8, c: u8) {
        let base = prob.base();
        let (a, b, c) = (char::from(a), char::from(b), char::from(c));
        let msg = match (b != '\0', c != '\0') {
            (true, true) => format!("compute {a} = {b} - {c} - carry (mod {base})"),
            (true, false) => format!("compute {a} = {b} - carry (mod {base})"),
            (false, true) => format!("compute {a} = {c} - carry (mod {base})"),
            (false, false) => format!("compute {a} = - carry (mod {base})"),
        };
        self.stepf(&msg);
    }
}

impl Generator for LogGen {
    fn logf(&mut self, _prob: &PlanProblem, msg: &str) {
        self.say(msg);
    }

    fn init(&mut self, prob: &PlanProblem, desc: &str) -> Result<(), PlanError> {
        let words = prob.problem.words();
        let w = words.iter().map(String::len).max().unwrap_or(0);
        let letters: Vec<String> = prob
            .problem
            .sorted_letters()
            .into_iter()
            .map(|c| char::from(c).to_string())
            .collect();
        self.say("Problem:");
        for (mark, word) in ["  ", "+ ", "= "].iter().zip(&words) {
            self.say(&format!("{mark}{word:>w$}"));
        }
        self.say(&format!("base: {}", prob.base()));
        self.say(&format!("letters: [{}]", letters.join(" ")));
        self.say(&format!("method: {desc}"));
        self.say("");
        Ok(())
    }

    fn fork(
        &mut self,
        _prob: &PlanProblem,
        name: &str,
        alt: &str,
        cont: &str,
    ) -> Result<Box<dyn Generator>, PlanError> {
        let alt = if alt.is_empty() {
            format!("{name}:alt")
        } else {
            alt.to_string()
        };
        let cont = if cont.is_empty() {
            format!("{name}:cont")
        } else {
            cont.to_string()
        };
        let n = self
            .prefix
            .bytes()
            .take(self.prefix.len().saturating_sub(1))
            .take_while(|&b| b == b' ')
            .count();
        self.prefix = format!("{}{cont}", " ".repeat(n));
        Ok(Box::new(LogGen {
            sink: self.sink.clone(),
            prefix: format!("{}{alt}", " ".repeat(n + 2)),
            step: self.step,
            branches: self.branches.clone(),
        }))
    }

    fn fix(&mut self, _prob: &PlanProblem, c: u8, v: u8) -> Result<(), PlanError> {
        self.stepf(&format!("fix {} = {v}", char::from(c)));
        Ok(())
    }

    fn compute_sum(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError> {
        let [a, b, c] = prob.columns[col].chars;
        let base = prob.base();
        let (a, b, c) = (char::from(a), char::from(b), char::from(c));
        let msg = match (a != '\0', b != '\0') {
            (true, true) => format!("compute {c} = {a} + {b} + carry (mod {base})"),
            (true, false) => format!("compute {c} = {a} + carry (mod {base})"),
            (false, true) => format!("compute {c} = {b} + carry (mod {base})"),
            (false, false) => format!("compute {c} = carry (mod {base})"),
        };
        self.stepf(&msg);
        Ok(())
    }

    fn compute_first_summand(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError> {
        let [a, b, c] = prob.columns[col].chars;
        self.compute_summand(prob, a, b, c);
        Ok(())
    }

    fn compute_second_summand(
        &mut self,
        prob: &PlanProblem,
        col: usize,
    ) -> Result<(), PlanError> {
        let [a, b, c] = prob.columns[col].chars;
        self.compute_summand(prob, b, a, c);
        Ok(())
    }

    fn choose_range(
        &mut self,
        prob: &PlanProblem,
        c: u8,
        min: u8,
        max: u8,
    ) -> Result<(), PlanError> {
        let spread = usize::from(max.saturating_sub(min));
        let remaining = usize::from(prob.base()).saturating_sub(prob.known.len());
        let n = spread.min(remaining);
        self.branches.borrow_mut().push(n);
        self.stepf(&format!("choose {} (branch by {n})", char::from(c)));
        Ok(())
    }

    fn check_column(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        _err: Option<SolutionError>,
    ) -> Result<(), PlanError> {
        self.stepf(&format!("check column: {}", prob.columns[col].label()));
        Ok(())
    }

    fn check(&mut self, _prob: &PlanProblem, _err: SolutionError) -> Result<(), PlanError> {
        self.stepf("check");
        Ok(())
    }

    fn verify(&mut self, _prob: &PlanProblem) -> Result<(), PlanError> {
        self.stepf("verify");
        Ok(())
    }

    fn finish(&mut self, _prob: &PlanProblem) -> Result<(), PlanError> {
        self.stepf("finish");
        Ok(())
    }

    fn finalize(&mut self, _prob: &PlanProblem) -> FinalizeResult {
        let total: usize = self.branches.borrow().iter().product();
        self.say(&format!("Total Branches: {total}"));
        Ok(None)
    }
}
