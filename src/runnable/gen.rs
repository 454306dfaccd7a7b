//! Generator that emits step programs.
//!
//! Register use:
//!
//! - `ra` is the accumulator; a column's carry out is left here
//! - `rb` holds digits under test and chosen digits
//! - `rc` may hold a stashed carry while `ra` is needed for other work
//!
//! The generator tracks which column's carry is live (`carry_prior`),
//! whether it still sits in `ra` (`carry_valid`), and whether a copy was
//! stashed in `rc` (`carry_saved`), so that consecutive columns can reuse
//! a carry instead of recomputing it.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::error::{PlanError, SolutionError, VerifyError};
use crate::runnable::compile::compile;
use crate::runnable::machine::StepProgram;
use crate::runnable::plan::StepPlan;
use crate::runnable::step::{Cmp, ForkAlt, Reg, Step};
use crate::search::SearchConfig;
use crate::word::column::Carry;
use crate::word::generator::{FinalizeResult, Generator};
use crate::word::plan_problem::PlanProblem;

/// Builds a step program from planning operations.
pub struct StepGen {
    steps: Rc<RefCell<Vec<Step>>>,
    annotated: bool,
    used_symbols: Rc<RefCell<HashSet<String>>>,
    carry_prior: Option<usize>,
    carry_saved: bool,
    carry_valid: bool,
    config: SearchConfig,
}

impl StepGen {
    pub fn new(annotated: bool) -> Self {
        Self {
            steps: Rc::new(RefCell::new(Vec::new())),
            annotated,
            used_symbols: Rc::new(RefCell::new(HashSet::new())),
            carry_prior: None,
            carry_saved: false,
            carry_valid: false,
            config: SearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// The steps emitted so far, before compilation.
    pub fn steps(&self) -> Vec<Step> {
        self.steps.borrow().clone()
    }

    fn emit(&self, steps: impl IntoIterator<Item = Step>) {
        self.steps.borrow_mut().extend(steps);
    }

    fn last_step(&self) -> Option<Step> {
        self.steps.borrow().last().cloned()
    }

    /// Returns `name`, or `name_N` for the first `N >= 2` not used yet.
    pub fn gensym(&self, name: &str) -> String {
        let mut used = self.used_symbols.borrow_mut();
        let mut sym = name.to_string();
        let mut n = 1;
        while used.contains(&sym) {
            n += 1;
            sym = format!("{name}_{n}");
        }
        used.insert(sym.clone());
        sym
    }

    /// Emits a uniquely named label in annotated mode.
    fn label(&self, name: impl FnOnce() -> String) {
        if self.annotated {
            let sym = self.gensym(&name());
            self.emit([Step::Label(sym)]);
        }
    }

    fn stash_carry(&mut self, col: Option<usize>) {
        if self.carry_prior == col && (col.is_none() || self.carry_saved) {
            return;
        }
        let Some(col) = col else {
            self.carry_saved = false;
            self.carry_prior = None;
            return;
        };
        if !self.carry_valid {
            return;
        }
        self.label(|| format!("stashCarry({col})"));
        self.emit([Step::Move { dst: Reg::C, src: Reg::A }]);
        self.carry_saved = true;
        self.carry_prior = Some(col);
    }

    fn restore_carry(&mut self, col: usize) -> bool {
        if self.carry_prior != Some(col) {
            return false;
        }
        if self.carry_valid {
            return true;
        }
        if !self.carry_saved {
            return false;
        }
        self.label(|| format!("restoreCarry({col})"));
        self.emit([Step::Move { dst: Reg::A, src: Reg::C }]);
        self.carry_valid = true;
        true
    }

    /// Leaves the carry out of `col` in `ra`; `None` is the zero carry into
    /// the rightmost column.
    fn ensure_carry(&mut self, prob: &PlanProblem, col: Option<usize>) -> Result<(), PlanError> {
        let Some(ci) = col else {
            self.label(|| "ensureCarry(nil)".to_string());
            self.emit([Step::Set(Reg::A, 0)]);
            self.carry_prior = None;
            self.carry_saved = false;
            self.carry_valid = true;
            return Ok(());
        };

        let column = &prob.columns[ci];
        if let Some(k) = column.carry.fixed() {
            self.label(|| format!("ensureCarry({})", column.label()));
            self.emit([Step::Set(Reg::A, i32::from(k))]);
            self.carry_prior = Some(ci);
            self.carry_saved = false;
            self.carry_valid = true;
            return Ok(());
        }

        if self.restore_carry(ci) {
            return Ok(());
        }

        let [a, b, _] = column.chars;
        for c in [a, b] {
            if c != 0 && !prob.is_known(c) {
                return Err(PlanError::UnresolvedCarry { column: ci });
            }
        }
        self.ensure_carry(prob, column.prior)?;
        self.label(|| format!("computeCarry({})", column.label()));
        self.emit(add_values(a, b));
        self.emit([Step::Div(Reg::A, i32::from(prob.base()))]);
        self.carry_prior = Some(ci);
        self.carry_saved = false;
        self.carry_valid = true;
        Ok(())
    }

    fn check_after_compute(&mut self, prob: &PlanProblem, col: usize, c: u8) {
        if prob.problem.is_initial_letter(c) {
            self.check_initial_letter(col, c);
        }
        self.check_fixed_carry(prob, col);
    }

    fn check_initial_letter(&mut self, col: usize, c: u8) {
        if self.carry_valid {
            self.stash_carry(Some(col));
            self.carry_valid = false;
        }
        self.label(|| format!("checkInitialLetter({})", char::from(c)));
        self.emit([
            Step::Load(Reg::A, c),
            Step::RelJnz(1),
            Step::Exit(Some(SolutionError::CheckFailed)),
        ]);
    }

    /// Guards a carry out that planning assumed to be a constant.
    fn check_fixed_carry(&mut self, prob: &PlanProblem, col: usize) {
        let column = &prob.columns[col];
        let jump = match column.carry {
            Carry::Zero => Step::RelJz(1),
            Carry::One => Step::RelJnz(1),
            _ => return,
        };
        if !self.restore_carry(col) {
            return;
        }
        self.label(|| format!("checkFixedCarry({})", column.label()));
        self.emit([jump, Step::Exit(Some(SolutionError::CheckFailed))]);
    }

    fn compute_summand(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        a: u8,
        b: u8,
        c: u8,
    ) -> Result<(), PlanError> {
        let base = i32::from(prob.base());
        self.ensure_carry(prob, prob.columns[col].prior)?;
        if !self.carry_saved {
            self.emit([Step::Move { dst: Reg::C, src: Reg::A }]);
        }
        self.carry_valid = false;
        self.carry_saved = false;

        self.label(|| format!("computeSummand({})", prob.columns[col].label()));
        // a = c - b - carry (mod base)
        self.emit([Step::Neg(Reg::A)]);
        if c != 0 {
            self.emit([Step::AddValue(Reg::A, c)]);
        }
        if b != 0 {
            self.emit([Step::SubValue(Reg::A, b)]);
        }
        self.emit([
            Step::Mod(Reg::A, base),
            Step::Move { dst: Reg::B, src: Reg::A },
            Step::Used(Reg::B),
            Step::RelJz(1),
            Step::Exit(Some(SolutionError::CheckFailed)),
            Step::Store(a, Reg::B),
        ]);
        self.carry_prior = Some(col);

        // carry out = (carry + a + b) / base
        self.emit([
            Step::Move { dst: Reg::A, src: Reg::C },
            Step::AddReg(Reg::A, Reg::B),
        ]);
        if b != 0 {
            self.emit([Step::AddValue(Reg::A, b)]);
        }
        self.emit([Step::Div(Reg::A, base)]);
        self.carry_valid = true;

        self.check_after_compute(prob, col, a);
        Ok(())
    }

    fn do_verify(
        &mut self,
        prob: &PlanProblem,
        name: &str,
        err: Option<SolutionError>,
    ) -> Result<(), PlanError> {
        let name = if self.annotated {
            self.gensym(name)
        } else {
            String::new()
        };
        if !name.is_empty() {
            self.emit([Step::Label(name.clone())]);
        }
        self.verify_initial_letters(prob, &name, err.clone());
        self.verify_duplicate_letters(prob, &name, err.clone());
        self.verify_non_negative(prob, &name, err.clone());
        self.verify_columns(prob, &name, err)
    }

    fn sub_label(&self, name: &str, part: &str) {
        if !name.is_empty() {
            self.label(|| format!("{name}:{part}"));
        }
    }

    fn verify_initial_letters(&self, prob: &PlanProblem, name: &str, err: Option<SolutionError>) {
        let err = err.unwrap_or(VerifyError::InitialLetters.into());
        self.sub_label(name, "initialLetters");
        for word in &prob.problem.words {
            if let Some(&c) = word.first() {
                self.emit([
                    Step::Load(Reg::A, c),
                    Step::RelJnz(1),
                    Step::Exit(Some(err.clone())),
                ]);
            }
        }
    }

    fn verify_duplicate_letters(&self, prob: &PlanProblem, name: &str, err: Option<SolutionError>) {
        let err = err.unwrap_or(VerifyError::DuplicateLetters.into());
        self.sub_label(name, "duplicateLetters");
        let letters: Vec<u8> = prob.known.iter().copied().collect();
        for (i, &c) in letters.iter().enumerate() {
            for &d in &letters[i + 1..] {
                self.emit([
                    Step::Load(Reg::A, c),
                    Step::SubValue(Reg::A, d),
                    Step::RelJnz(1),
                    Step::Exit(Some(err.clone())),
                ]);
            }
        }
    }

    fn verify_non_negative(&self, prob: &PlanProblem, name: &str, err: Option<SolutionError>) {
        let err = err.unwrap_or(VerifyError::NegativeValue.into());
        self.sub_label(name, "nonNegative");
        for &c in &prob.known {
            self.emit([
                Step::Load(Reg::A, c),
                Step::Compare(Cmp::Lt, Reg::A, 0),
                Step::RelJz(1),
                Step::Exit(Some(err.clone())),
            ]);
        }
    }

    fn verify_columns(
        &mut self,
        prob: &PlanProblem,
        name: &str,
        err: Option<SolutionError>,
    ) -> Result<(), PlanError> {
        self.sub_label(name, "columns");
        for i in (0..prob.columns.len()).rev() {
            if prob.columns[i].unknown > 0 {
                return Ok(());
            }
            let col_err = err
                .clone()
                .unwrap_or_else(|| VerifyError::Column(Some(prob.columns[i].label())).into());
            self.check_column(prob, i, Some(col_err))?;
        }

        if let Some(Step::Set(Reg::A, v)) = self.last_step() {
            if v != 0 {
                return Err(PlanError::BrokenFinalCarry(v));
            }
            return Ok(());
        }
        let err = err.unwrap_or(VerifyError::FinalCarry.into());
        self.emit([Step::RelJz(1), Step::Exit(Some(err))]);
        Ok(())
    }
}

fn add_values(a: u8, b: u8) -> Vec<Step> {
    [a, b]
        .into_iter()
        .filter(|&c| c != 0)
        .map(|c| Step::AddValue(Reg::A, c))
        .collect()
}

impl Generator for StepGen {
    fn init(&mut self, prob: &PlanProblem, desc: &str) -> Result<(), PlanError> {
        log::debug!("step plan for {} ({desc})", prob.problem);
        Ok(())
    }

    fn fork(
        &mut self,
        _prob: &PlanProblem,
        name: &str,
        alt: &str,
        cont: &str,
    ) -> Result<Box<dyn Generator>, PlanError> {
        let alt_label = if alt.is_empty() {
            String::new()
        } else {
            self.gensym(&format!("{alt}:alt"))
        };
        let cont_label = if cont.is_empty() {
            String::new()
        } else {
            self.gensym(&format!("{cont}:cont"))
        };
        let alt_steps = Rc::new(RefCell::new(Vec::new()));
        self.emit([Step::ForkAlt(Rc::new(ForkAlt {
            name: name.to_string(),
            alt_label,
            cont_label,
            steps: alt_steps.clone(),
        }))]);
        Ok(Box::new(StepGen {
            steps: alt_steps,
            annotated: self.annotated,
            used_symbols: self.used_symbols.clone(),
            carry_prior: None,
            carry_saved: false,
            carry_valid: false,
            config: self.config.clone(),
        }))
    }

    fn fix(&mut self, _prob: &PlanProblem, c: u8, v: u8) -> Result<(), PlanError> {
        // ra is about to be clobbered
        self.stash_carry(self.carry_prior);
        self.carry_valid = false;
        self.label(|| format!("fix({})", char::from(c)));
        self.emit([
            Step::Set(Reg::B, i32::from(v)),
            Step::Used(Reg::B),
            Step::RelJz(1),
            Step::Exit(Some(SolutionError::AlreadyUsed)),
            Step::Store(c, Reg::B),
        ]);
        Ok(())
    }

    fn compute_sum(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError> {
        let column = &prob.columns[col];
        let [a, b, c] = column.chars;
        let base = i32::from(prob.base());
        self.ensure_carry(prob, column.prior)?;
        self.carry_valid = false;
        self.carry_saved = false;

        self.label(|| format!("computeSum({})", column.label()));
        // c = carry + a + b (mod base)
        self.emit(add_values(a, b));
        self.emit([
            Step::Move { dst: Reg::C, src: Reg::A },
            Step::Mod(Reg::A, base),
            Step::Move { dst: Reg::B, src: Reg::A },
            Step::Used(Reg::A),
            Step::RelJz(1),
            Step::Exit(Some(SolutionError::CheckFailed)),
            Step::Store(c, Reg::B),
            Step::Move { dst: Reg::A, src: Reg::C },
            Step::Div(Reg::A, base),
        ]);
        self.carry_prior = Some(col);
        self.carry_valid = true;

        self.check_after_compute(prob, col, c);
        Ok(())
    }

    fn compute_first_summand(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError> {
        let [a, b, c] = prob.columns[col].chars;
        self.compute_summand(prob, col, a, b, c)
    }

    fn compute_second_summand(
        &mut self,
        prob: &PlanProblem,
        col: usize,
    ) -> Result<(), PlanError> {
        let [a, b, c] = prob.columns[col].chars;
        self.compute_summand(prob, col, b, a, c)
    }

    fn choose_range(
        &mut self,
        _prob: &PlanProblem,
        c: u8,
        min: u8,
        max: u8,
    ) -> Result<(), PlanError> {
        // ra is about to be clobbered
        self.stash_carry(self.carry_prior);
        self.carry_valid = false;
        let label = if self.annotated {
            self.gensym(&format!("choose({})", char::from(c)))
        } else {
            String::new()
        };
        self.emit([
            Step::Range {
                label,
                min: i32::from(min),
                max: i32::from(max),
            },
            Step::Store(c, Reg::B),
        ]);
        Ok(())
    }

    fn check_column(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        err: Option<SolutionError>,
    ) -> Result<(), PlanError> {
        let err = err.unwrap_or(SolutionError::CheckFailed);
        let column = &prob.columns[col];
        let [a, b, c] = column.chars;
        let base = i32::from(prob.base());
        let summed = add_values(a, b);
        let has_summands = !summed.is_empty();

        self.ensure_carry(prob, column.prior)?;
        self.label(|| format!("checkColumn({})", column.label()));
        self.emit(summed);
        if has_summands {
            self.emit([Step::Move { dst: Reg::C, src: Reg::A }, Step::Mod(Reg::A, base)]);
        }
        self.emit([
            Step::SubValue(Reg::A, c),
            Step::RelJz(1),
            Step::Exit(Some(err)),
        ]);
        if has_summands {
            self.emit([Step::Move { dst: Reg::A, src: Reg::C }, Step::Div(Reg::A, base)]);
        } else {
            self.emit([Step::Set(Reg::A, 0)]);
        }
        self.carry_prior = Some(col);
        self.carry_saved = false;
        self.carry_valid = true;

        if has_summands {
            self.check_fixed_carry(prob, col);
        }
        Ok(())
    }

    fn check(&mut self, prob: &PlanProblem, err: SolutionError) -> Result<(), PlanError> {
        self.do_verify(prob, "check", Some(err))
    }

    fn verify(&mut self, prob: &PlanProblem) -> Result<(), PlanError> {
        self.do_verify(prob, "verify", None)
    }

    fn finish(&mut self, _prob: &PlanProblem) -> Result<(), PlanError> {
        if matches!(self.last_step(), Some(Step::Finish(_))) {
            return Err(PlanError::DoubleFinish);
        }
        let name = self.gensym("finish");
        self.emit([Step::Finish(name)]);
        Ok(())
    }

    fn finalize(&mut self, prob: &PlanProblem) -> FinalizeResult {
        let compiled = compile(&self.steps.borrow(), self.annotated)?;
        let program = StepProgram::new(prob.problem.clone(), compiled);
        log::debug!(
            "step program: {} steps, budget {}",
            program.len(),
            program.budget()
        );
        Ok(Some(Box::new(StepPlan::new(program, self.config.clone()))))
    }
}
