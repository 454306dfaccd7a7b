//! Finished (or in-flight) search states as seen from outside a backend.

use crate::error::SolutionError;
use crate::word::problem::Problem;

/// A search state of some concrete plan.
pub trait Solution {
    fn problem(&self) -> &Problem;

    /// The value of a letter and whether it is known yet.
    fn value_of(&self, c: u8) -> (i32, bool);

    /// `Ok(())` only for a state that halted normally.
    fn check(&self) -> Result<(), SolutionError>;

    /// Human readable description of the state, one line per call.
    fn dump(&self, out: &mut dyn FnMut(&str));

    /// Collected execution trace, if any.
    fn trace(&self) -> &[String] {
        &[]
    }

    /// Program position used to look up plan annotations.
    fn position(&self) -> Option<usize> {
        None
    }
}

/// Describes the known letter mapping like `"x:1 y:2 z:3"`.
pub fn solution_mapping(sol: &dyn Solution) -> String {
    sol.problem()
        .sorted_letters()
        .into_iter()
        .filter_map(|c| {
            let (v, known) = sol.value_of(c);
            known.then(|| format!("{}:{}", char::from(c), v))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The three numbers spelled by the solution's letter mapping.
pub fn solution_numbers(sol: &dyn Solution) -> [i64; 3] {
    let prob = sol.problem();
    let base = prob.base as i64;
    let mut ns = [0i64; 3];
    for (i, word) in prob.words.iter().enumerate() {
        ns[i] = word
            .iter()
            .fold(0i64, |n, &c| n * base + sol.value_of(c).0 as i64);
    }
    ns
}

/// Prints a simple double check of the solution.
pub fn solution_check(sol: &dyn Solution, out: &mut dyn FnMut(&str)) -> bool {
    let prob = sol.problem();
    let ns = solution_numbers(sol);
    let check = ns[0] + ns[1] == ns[2];
    out(&format!("Check: {check}"));
    let width = prob.words[2].len();
    let marks = [' ', '+', '='];
    for (i, word) in prob.words.iter().enumerate() {
        let pad = " ".repeat(width.saturating_sub(word.len()));
        out(&format!(
            "  {}{} {} == {}{}",
            marks[i],
            pad,
            String::from_utf8_lossy(word),
            pad,
            ns[i]
        ));
    }
    check
}

/// An owned snapshot of a solution that may outlive the search state it
/// was taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedSolution {
    problem: Problem,
    values: Vec<(u8, i32, bool)>,
    result: Result<(), SolutionError>,
    dump: Vec<String>,
    position: Option<usize>,
}

impl CapturedSolution {
    pub fn capture(sol: &dyn Solution) -> Self {
        let problem = sol.problem().clone();
        let values = problem
            .sorted_letters()
            .into_iter()
            .map(|c| {
                let (v, known) = sol.value_of(c);
                (c, v, known)
            })
            .collect();
        let mut dump = Vec::new();
        sol.dump(&mut |line| dump.push(line.to_string()));
        Self {
            problem,
            values,
            result: sol.check(),
            dump,
            position: sol.position(),
        }
    }
}

impl Solution for CapturedSolution {
    fn problem(&self) -> &Problem {
        &self.problem
    }

    fn value_of(&self, c: u8) -> (i32, bool) {
        self.values
            .iter()
            .find(|(l, _, _)| *l == c)
            .map(|&(_, v, known)| (v, known))
            .unwrap_or((0, false))
    }

    fn check(&self) -> Result<(), SolutionError> {
        self.result.clone()
    }

    fn dump(&self, out: &mut dyn FnMut(&str)) {
        for line in &self.dump {
            out(line);
        }
    }

    fn position(&self) -> Option<usize> {
        self.position
    }
}

/// A captured solution with the execution trace that led to it.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedSolution {
    captured: CapturedSolution,
    trace: Vec<String>,
}

impl TracedSolution {
    pub fn new(sol: &dyn Solution, trace: Vec<String>) -> Self {
        Self {
            captured: CapturedSolution::capture(sol),
            trace,
        }
    }
}

impl Solution for TracedSolution {
    fn problem(&self) -> &Problem {
        self.captured.problem()
    }

    fn value_of(&self, c: u8) -> (i32, bool) {
        self.captured.value_of(c)
    }

    fn check(&self) -> Result<(), SolutionError> {
        self.captured.check()
    }

    /// The captured dump followed by the trace.
    fn dump(&self, out: &mut dyn FnMut(&str)) {
        self.captured.dump(out);
        for line in &self.trace {
            out(line);
        }
    }

    fn trace(&self) -> &[String] {
        &self.trace
    }

    fn position(&self) -> Option<usize> {
        self.captured.position()
    }
}
