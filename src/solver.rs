//! One-call planning and solving on top of the strategies and backends.

use std::fmt;
use std::str::FromStr;

use crate::error::{PlanError, SearchError};
use crate::opcode::{ByteOrder, CodeGen};
use crate::runnable::StepGen;
use crate::search::{SearchConfig, SearchReport};
use crate::word::{
    CapturedSolution, ChoicePolicy, Generator, LogGen, MultiGen, Plan, PlanProblem, Problem,
    Solution, Strategy, Watcher,
};

/// Which generator compiles the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Register step programs run by the step interpreter.
    #[default]
    Steps,
    /// Byte encoded programs run by the tiny machine.
    Opcode,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Steps, Backend::Opcode];
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Steps => write!(f, "steps"),
            Backend::Opcode => write!(f, "opcode"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steps" | "step" | "runnable" => Ok(Backend::Steps),
            "opcode" | "opcodes" | "tiny" => Ok(Backend::Opcode),
            _ => Err(format!(
                "Unknown backend: '{}'. Valid options: steps, opcode",
                s
            )),
        }
    }
}

/// Options for [`plan`].
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Append a full verification of the mapping to the plan.
    pub verified: bool,
    /// Record labels and annotations for dumps.
    pub annotated: bool,
    /// Narrate planning through a [`LogGen`].
    pub logged: bool,
    pub choice: ChoicePolicy,
    pub search: SearchConfig,
    /// Encoding of opcode programs.
    pub byte_order: ByteOrder,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            verified: false,
            annotated: false,
            logged: false,
            choice: ChoicePolicy::default(),
            search: SearchConfig::default(),
            byte_order: ByteOrder::native(),
        }
    }
}

impl PlanOptions {
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn with_annotated(mut self, annotated: bool) -> Self {
        self.annotated = annotated;
        self
    }

    pub fn with_logged(mut self, logged: bool) -> Self {
        self.logged = logged;
        self
    }

    pub fn with_choice(mut self, choice: ChoicePolicy) -> Self {
        self.choice = choice;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_byte_order(mut self, bo: ByteOrder) -> Self {
        self.byte_order = bo;
        self
    }
}

fn backend_gen(
    problem: &Problem,
    backend: Backend,
    opts: &PlanOptions,
) -> Result<Box<dyn Generator>, PlanError> {
    Ok(match backend {
        Backend::Steps => {
            Box::new(StepGen::new(opts.annotated).with_config(opts.search.clone()))
        }
        Backend::Opcode => Box::new(
            CodeGen::with_byte_order(problem, opts.annotated, opts.byte_order)?
                .with_config(opts.search.clone()),
        ),
    })
}

/// Plans `problem` with `strategy` into a runnable plan for `backend`.
pub fn plan(
    problem: &Problem,
    strategy: Strategy,
    backend: Backend,
    opts: &PlanOptions,
) -> Result<Box<dyn Plan>, PlanError> {
    let mut prob = PlanProblem::new(problem, opts.annotated).with_choice(opts.choice);
    let mut gen = backend_gen(problem, backend, opts)?;
    if opts.logged {
        gen = Box::new(MultiGen::new(vec![gen, Box::new(LogGen::new())]));
    }
    log::debug!("planning {strategy} for the {backend} backend");
    strategy
        .plan(&mut prob, gen.as_mut(), opts.verified)?
        .ok_or(PlanError::NoConcretePlan)
}

/// Outcome of [`solve`].
#[derive(Debug)]
pub struct Solved {
    /// Every state that checked out, in the order found.
    pub solutions: Vec<CapturedSolution>,
    /// States that finished with an error.
    pub failures: u64,
    pub report: SearchReport,
}

/// Runs `plan`, capturing passing states; stops at the first unless `all`.
pub fn solve(
    plan: &dyn Plan,
    all: bool,
    watcher: Option<&mut dyn Watcher>,
) -> Result<Solved, SearchError> {
    let mut solutions = Vec::new();
    let mut failures = 0;
    let mut res = |sol: &dyn Solution| {
        if sol.check().is_err() {
            failures += 1;
            return false;
        }
        solutions.push(CapturedSolution::capture(sol));
        !all
    };
    let report = plan.run_watched(&mut res, watcher)?;
    Ok(Solved {
        solutions,
        failures,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::solution_mapping;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("steps".parse::<Backend>().unwrap(), Backend::Steps);
        assert_eq!("OPCODE".parse::<Backend>().unwrap(), Backend::Opcode);
        let err = "vm".parse::<Backend>().unwrap_err();
        assert!(err.contains("Unknown backend: 'vm'"));
        assert_eq!(Backend::Opcode.to_string(), "opcode");
    }

    #[test]
    fn test_plan_options_builders() {
        let opts = PlanOptions::default()
            .with_verified(true)
            .with_annotated(true)
            .with_choice(ChoicePolicy::Best)
            .with_byte_order(ByteOrder::Big);
        assert!(opts.verified);
        assert!(opts.annotated);
        assert!(!opts.logged);
        assert_eq!(opts.choice, ChoicePolicy::Best);
        assert_eq!(opts.byte_order, ByteOrder::Big);
    }

    #[test]
    fn test_solve_every_backend() {
        let problem = Problem::setup("to", "go", "out").unwrap();
        for backend in Backend::ALL {
            let plan = plan(&problem, Strategy::TopDown, backend, &PlanOptions::default()).unwrap();
            let solved = solve(plan.as_ref(), true, None).unwrap();
            let found: Vec<String> = solved
                .solutions
                .iter()
                .map(|s| solution_mapping(s))
                .collect();
            assert_eq!(found, vec!["g:8 o:1 t:2 u:0"], "{backend}");
        }
    }
}
