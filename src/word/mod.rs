//! The word-sum problem model and the planner.
//!
//! A [`Problem`] is three words and a base. A strategy walks a
//! [`PlanProblem`] column by column and emits operations into a
//! [`Generator`]; concrete generators finalize into a runnable [`Plan`].

pub mod column;
pub mod generator;
pub mod loggen;
pub mod multigen;
pub mod plan;
pub mod plan_problem;
pub mod problem;
pub mod solution;
pub mod strategy;

pub use column::{Carry, Column};
pub use generator::{FinalizeResult, Generator};
pub use loggen::LogGen;
pub use multigen::MultiGen;
pub use plan::{Delivery, Plan, Resultor, StateId, Watcher};
pub use plan_problem::{AndThen, ChoicePolicy, PlanProblem};
pub use problem::{Problem, DEFAULT_BASE, MAX_BASE};
pub use solution::{
    solution_check, solution_mapping, solution_numbers, CapturedSolution, Solution,
    TracedSolution,
};
pub use strategy::{plan_bottom_up, plan_naive_brute, plan_pruned_brute, plan_top_down, Strategy};
