//! Step-IR backend: a generator that emits labelled register steps, a
//! compiler that expands and resolves them, and an interpreter that runs
//! them under the fork/branch search engine.

pub mod compile;
pub mod gen;
pub mod machine;
pub mod plan;
pub mod step;

pub use compile::{compile, Annotations, Compiled, Labels};
pub use gen::StepGen;
pub use machine::{floor_div, floor_mod, StepProgram, StepSolution};
pub use plan::StepPlan;
pub use step::{Cmp, ForkAlt, Reg, Step};
