//! The step interpreter: programs and the per-state solution registers.

use std::fmt;
use std::rc::Rc;

use crate::error::{MachineError, SolutionError};
use crate::runnable::compile::Compiled;
use crate::runnable::step::{Reg, Step};
use crate::search::{Emitter, SearchState};
use crate::word::problem::Problem;
use crate::word::solution::{solution_mapping, Solution};

/// Floor modulus: the result always lies in `[0, m)` for `m > 0`.
///
/// Defined for any `a` and any positive `m`; a non-positive `m` yields 0.
pub fn floor_mod(a: i32, m: i32) -> i32 {
    if m <= 0 {
        return 0;
    }
    a.rem_euclid(m)
}

/// Floor division matching [`floor_mod`]: `a == floor_div(a, m) * m +
/// floor_mod(a, m)` for positive `m`; a non-positive `m` yields 0.
pub fn floor_div(a: i32, m: i32) -> i32 {
    if m <= 0 {
        return 0;
    }
    a.div_euclid(m)
}

/// A compiled program ready to run, shared by all states of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct StepProgram {
    pub problem: Problem,
    pub compiled: Compiled,
}

impl StepProgram {
    pub fn new(problem: Problem, compiled: Compiled) -> Self {
        Self { problem, compiled }
    }

    pub fn steps(&self) -> &[Step] {
        &self.compiled.steps
    }

    pub fn len(&self) -> usize {
        self.compiled.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.steps.is_empty()
    }

    /// The all-brute-force step count: every assignment of every letter,
    /// times every step.
    pub fn budget(&self) -> u64 {
        self.problem
            .falling_factorial()
            .saturating_mul(self.len() as u64)
    }

    /// Prints every step with its annotations.
    pub fn dump(&self, out: &mut dyn FnMut(&str)) {
        for (addr, step) in self.compiled.steps.iter().enumerate() {
            match self.compiled.annotations.get(&addr) {
                Some(annos) => out(&format!("{addr}: {step} // {}", annos.join(", "))),
                None => out(&format!("{addr}: {step}")),
            }
        }
    }
}

const SLOTS: usize = 256;

/// Registers and letter mapping of one search state.
#[derive(Clone)]
pub struct StepSolution {
    program: Rc<StepProgram>,
    stepi: usize,
    values: [i32; SLOTS],
    used: [bool; SLOTS],
    ra: i32,
    rb: i32,
    rc: i32,
    done: bool,
    err: Option<SolutionError>,
}

impl StepSolution {
    pub fn new(program: Rc<StepProgram>) -> Self {
        Self {
            program,
            stepi: 0,
            values: [-1; SLOTS],
            used: [false; SLOTS],
            ra: 0,
            rb: 0,
            rc: 0,
            done: false,
            err: None,
        }
    }

    pub fn program(&self) -> &StepProgram {
        &self.program
    }

    pub fn stepi(&self) -> usize {
        self.stepi
    }

    pub fn registers(&self) -> (i32, i32, i32) {
        (self.ra, self.rb, self.rc)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn err(&self) -> Option<&SolutionError> {
        self.err.as_ref()
    }

    /// The step that will run next (or, once halted, the one that halted).
    pub fn current_step(&self) -> Option<&Step> {
        self.program.steps().get(self.stepi)
    }

    fn reg(&self, r: Reg) -> i32 {
        match r {
            Reg::A => self.ra,
            Reg::B => self.rb,
            Reg::C => self.rc,
        }
    }

    fn set(&mut self, r: Reg, v: i32) {
        match r {
            Reg::A => self.ra = v,
            Reg::B => self.rb = v,
            Reg::C => self.rc = v,
        }
    }

    fn is_used(&self, v: i32) -> bool {
        usize::try_from(v)
            .ok()
            .and_then(|i| self.used.get(i))
            .copied()
            .unwrap_or(false)
    }

    fn exit(&mut self, err: Option<SolutionError>) {
        self.done = true;
        if err.is_some() {
            self.stepi = self.stepi.saturating_sub(1);
        }
        self.err = err;
    }

    fn jump_by(&mut self, offset: isize) {
        self.stepi = self.stepi.wrapping_add_signed(offset);
    }

    fn fork_by(&self, emit: &mut Emitter<'_, Self>, offset: isize) {
        let mut child = emit.copy_of(self);
        child.jump_by(offset);
        emit.emit(child);
    }

    /// Emits a copy that resumes at the current position, then jumps.
    fn branch_by(&mut self, emit: &mut Emitter<'_, Self>, offset: isize) {
        let child = emit.copy_of(self);
        emit.emit(child);
        self.jump_by(offset);
    }

    /// Runs one step; returns false once the state has halted.
    pub fn run_step(&mut self, emit: &mut Emitter<'_, Self>) -> bool {
        if self.done {
            return false;
        }
        let program = self.program.clone();
        let Some(step) = program.steps().get(self.stepi) else {
            self.done = true;
            self.err = Some(MachineError::InvalidPi.into());
            return false;
        };
        self.stepi += 1;
        self.exec(step, emit);
        !self.done
    }

    fn exec(&mut self, step: &Step, emit: &mut Emitter<'_, Self>) {
        match *step {
            Step::Move { dst, src } => self.set(dst, self.reg(src)),
            Step::Set(r, v) => self.set(r, v),
            Step::Compare(cmp, r, v) => self.ra = i32::from(cmp.test(self.reg(r), v)),
            Step::Neg(r) => self.set(r, -self.reg(r)),
            Step::AddReg(r, s) => self.set(r, self.reg(r) + self.reg(s)),
            Step::SubReg(r, s) => self.set(r, self.reg(r) - self.reg(s)),
            Step::AddValue(r, c) => self.set(r, self.reg(r) + self.values[usize::from(c)]),
            Step::SubValue(r, c) => self.set(r, self.reg(r) - self.values[usize::from(c)]),
            Step::Add(r, v) => self.set(r, self.reg(r) + v),
            Step::Sub(r, v) => self.set(r, self.reg(r) - v),
            Step::Mod(r, m) => self.set(r, floor_mod(self.reg(r), m)),
            Step::Div(r, m) => self.set(r, floor_div(self.reg(r), m)),
            Step::Exit(ref err) => self.exit(err.clone()),
            Step::Used(r) => self.ra = i32::from(self.is_used(self.reg(r))),
            Step::Store(c, r) => {
                let v = self.reg(r);
                match usize::try_from(v).ok().filter(|&i| i < SLOTS) {
                    Some(i) => {
                        self.values[usize::from(c)] = v;
                        self.used[i] = true;
                    }
                    None => self.exit(Some(SolutionError::Custom(format!(
                        "store of out of range value {v}"
                    )))),
                }
            }
            Step::Load(r, c) => self.set(r, self.values[usize::from(c)]),

            Step::Jmp(a) => self.stepi = a,
            Step::Jz(a) => {
                if self.ra == 0 {
                    self.stepi = a;
                }
            }
            Step::Jnz(a) => {
                if self.ra != 0 {
                    self.stepi = a;
                }
            }
            Step::RelJmp(o) => self.jump_by(o),
            Step::RelJz(o) => {
                if self.ra == 0 {
                    self.jump_by(o);
                }
            }
            Step::RelJnz(o) => {
                if self.ra != 0 {
                    self.jump_by(o);
                }
            }
            Step::Fork(a) => {
                let mut child = emit.copy_of(self);
                child.stepi = a;
                emit.emit(child);
            }
            Step::RelFork(o) => self.fork_by(emit, o),
            Step::Branch(a) => {
                let child = emit.copy_of(self);
                emit.emit(child);
                self.stepi = a;
            }
            Step::RelBranch(o) => self.branch_by(emit, o),
            Step::RelFz(o) => {
                if self.ra == 0 {
                    self.fork_by(emit, o);
                }
            }
            Step::RelFnz(o) => {
                if self.ra != 0 {
                    self.fork_by(emit, o);
                }
            }
            Step::RelBz(o) => {
                if self.ra == 0 {
                    self.branch_by(emit, o);
                }
            }
            Step::RelBnz(o) => {
                if self.ra != 0 {
                    self.branch_by(emit, o);
                }
            }
            Step::LoopB { offset, max } => {
                self.rb += 1;
                if self.rb < max {
                    self.jump_by(offset);
                }
            }

            Step::LabelJmp(ref l)
            | Step::LabelJz(ref l)
            | Step::LabelJnz(ref l)
            | Step::LabelFork(ref l)
            | Step::LabelBranch(ref l) => {
                self.exit(Some(SolutionError::UnresolvedLabel(l.clone())));
            }
            Step::Label(_) => {}
            Step::Finish(_) | Step::Range { .. } | Step::ForkAlt(_) => {
                self.exit(Some(SolutionError::UnexpandedMacro(step.to_string())));
            }
        }
    }
}

impl SearchState for StepSolution {
    fn step(&mut self, emit: &mut Emitter<'_, Self>) {
        self.run_step(emit);
    }

    fn is_halted(&self) -> bool {
        self.done
    }
}

impl Solution for StepSolution {
    fn problem(&self) -> &Problem {
        &self.program.problem
    }

    fn value_of(&self, c: u8) -> (i32, bool) {
        let v = self.values[usize::from(c)];
        (v, v >= 0 && self.is_used(v))
    }

    fn check(&self) -> Result<(), SolutionError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if !self.done {
            return Err(SolutionError::NotDone);
        }
        Ok(())
    }

    fn dump(&self, out: &mut dyn FnMut(&str)) {
        out(&self.to_string());
        let last_was_store = self
            .stepi
            .checked_sub(1)
            .and_then(|i| self.program.steps().get(i))
            .is_some_and(Step::is_store);
        if last_was_store {
            out(&solution_mapping(self));
        }
    }

    fn position(&self) -> Option<usize> {
        Some(self.stepi)
    }
}

impl fmt::Display for StepSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err = match &self.err {
            Some(err) => err.to_string(),
            None => "none".to_string(),
        };
        write!(
            f,
            "ra:{} rb:{} rc:{} done:{} err:{} -- @{}",
            self.ra, self.rb, self.rc, self.done, err, self.stepi
        )?;
        if let Some(step) = self.current_step() {
            write!(f, " {step}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StepSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepSolution({self})")
    }
}
