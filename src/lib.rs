//! Word-sum (cryptarithm) solving: `W1 + W2 = W3` where every letter is
//! a distinct digit.
//!
//! A strategy plans the problem column by column into a [`Generator`];
//! the step-IR and opcode backends compile that plan into programs that a
//! fork/branch search engine runs to enumerate every solution.
//!
//! [`Generator`]: word::Generator

pub mod error;
pub mod log;
pub mod opcode;
pub mod runnable;
pub mod search;
pub mod solver;
pub mod watch;
pub mod word;

pub use error::{PlanError, SearchError, SetupError, SolutionError, VerifyError};
pub use solver::{plan, solve, Backend, PlanOptions, Solved};
pub use word::{Plan, Problem, Solution, Strategy};
