//! Planning state: which letters are known, which digits are fixed, and what
//! is known about each column's carry.
//!
//! Strategies drive a [`Generator`] through the operations here; every
//! operation calls the generator *before* updating the planning state, so a
//! generator always observes the state as it was when the operation began.

use crate::error::PlanError;
use crate::word::column::{Carry, Column};
use crate::word::generator::Generator;
use crate::word::problem::Problem;
use std::collections::{BTreeMap, BTreeSet};

/// How `choose_one` picks the next letter to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChoicePolicy {
    /// The first unknown character in column order.
    #[default]
    First,
    /// The unknown character with the smallest effective range.
    Best,
}

impl std::fmt::Display for ChoicePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChoicePolicy::First => write!(f, "first"),
            ChoicePolicy::Best => write!(f, "best"),
        }
    }
}

impl std::str::FromStr for ChoicePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" => Ok(ChoicePolicy::First),
            "best" | "smallest" => Ok(ChoicePolicy::Best),
            _ => Err(format!(
                "Unknown choice policy: '{}'. Valid options: first, best",
                s
            )),
        }
    }
}

/// Continuation run on each side of a carry assumption fork.
pub type AndThen<'a> =
    dyn Fn(&mut PlanProblem, &mut dyn Generator, usize) -> Result<bool, PlanError> + 'a;

/// Solution planning state for a problem.
#[derive(Debug, Clone)]
pub struct PlanProblem {
    pub problem: Problem,
    pub annotated: bool,
    pub choice: ChoicePolicy,
    pub columns: Vec<Column>,
    /// Letter to the columns it appears in (each column listed once).
    pub let_cols: BTreeMap<u8, Vec<usize>>,
    pub known: BTreeSet<u8>,
    pub fixed_letters: BTreeMap<u8, u8>,
    pub fixed_values: Vec<bool>,
}

impl PlanProblem {
    /// Creates fresh planning state for a problem.
    pub fn new(problem: &Problem, annotated: bool) -> Self {
        let n = problem.num_columns();
        let mut columns = Vec::with_capacity(n);
        let mut let_cols: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
        for i in 0..n {
            let prior = if i + 1 < n { Some(i + 1) } else { None };
            let col = Column::new(i, problem.get_column(i), prior);
            for c in col.distinct_chars() {
                let_cols.entry(c).or_default().push(i);
            }
            columns.push(col);
        }
        Self {
            problem: problem.clone(),
            annotated,
            choice: ChoicePolicy::default(),
            columns,
            let_cols,
            known: BTreeSet::new(),
            fixed_letters: BTreeMap::new(),
            fixed_values: vec![false; problem.base as usize],
        }
    }

    pub fn with_choice(mut self, choice: ChoicePolicy) -> Self {
        self.choice = choice;
        self
    }

    pub fn base(&self) -> u8 {
        self.problem.base
    }

    pub fn is_known(&self, c: u8) -> bool {
        self.known.contains(&c)
    }

    /// The carry flowing into `col` from its prior column; the rightmost
    /// column has a constant zero carry in.
    pub fn carry_in(&self, col: usize) -> Carry {
        match self.columns[col].prior {
            Some(p) => self.columns[p].carry,
            None => Carry::Zero,
        }
    }

    /// Column label including what is known about its carry in.
    pub fn column_label(&self, col: usize) -> String {
        format!(
            "{} in:{}",
            self.columns[col].label(),
            self.carry_in(col).expr()
        )
    }

    fn mark_known(&mut self, c: u8) {
        self.known.insert(c);
        if let Some(cols) = self.let_cols.get(&c) {
            for &i in cols {
                let col = &mut self.columns[i];
                col.unknown -= 1;
                col.known += 1;
            }
        }
    }

    /// Fixes the value of a letter.
    pub fn fix(&mut self, gen: &mut dyn Generator, c: u8, v: u8) -> Result<(), PlanError> {
        gen.fix(self, c, v)?;
        self.fixed_letters.insert(c, v);
        self.fixed_values[v as usize] = true;
        self.mark_known(c);
        if let Some(cols) = self.let_cols.get(&c) {
            for &i in cols {
                self.columns[i].fixed += 1;
            }
        }
        Ok(())
    }

    /// Tries every value of a letter in `[min, max]`.
    pub fn choose_range(
        &mut self,
        gen: &mut dyn Generator,
        c: u8,
        min: u8,
        max: u8,
    ) -> Result<(), PlanError> {
        gen.choose_range(self, c, min, max)?;
        self.mark_known(c);
        Ok(())
    }

    /// Narrows `[min, max]` for letter `c` around fixed values; initial
    /// letters never take 0.
    pub fn fix_range(&self, min: u8, max: u8, c: u8) -> Result<(u8, u8), PlanError> {
        let (mut min, mut max) = (min, max);
        if min == 0 && (self.fixed_values[0] || self.problem.is_initial_letter(c)) {
            min = 1;
        }
        while max > 0 && self.fixed_values[max as usize] {
            max -= 1;
        }
        while min <= max && self.fixed_values[min as usize] {
            min += 1;
        }
        if min > max {
            return Err(PlanError::NoChoices { letter: c });
        }
        Ok((min, max))
    }

    /// Emits a check of the column unless it is already solved.
    pub fn check_column(&mut self, gen: &mut dyn Generator, col: usize) -> Result<bool, PlanError> {
        if !self.columns[col].solved {
            gen.check_column(self, col, None)?;
            let col = &mut self.columns[col];
            col.solved = true;
            col.carry = Carry::Computed;
        }
        Ok(true)
    }

    /// Emits code to solve the column if possible:
    /// - an already solved column is a noop
    /// - with no unknowns, the column is checked
    /// - a lone result letter in the leftmost column must be 1
    /// - with a known carry in, letters are chosen until one remains, which
    ///   is then computed
    ///
    /// Returns false when none of these apply, typically because the carry
    /// in is still unknown.
    pub fn may_solve_column(
        &mut self,
        gen: &mut dyn Generator,
        col: usize,
    ) -> Result<bool, PlanError> {
        let c = &self.columns[col];
        if c.solved {
            if c.unknown != 0 {
                return Err(PlanError::InvalidColumnState {
                    column: c.label(),
                });
            }
            return Ok(true);
        }

        if c.unknown == 0 {
            if self.carry_in(col) == Carry::Unknown {
                // the check needs the carry in; assume_carry_solve_column forks it
                return Ok(false);
            }
            return self.check_column(gen, col);
        }

        if c.have == 1 && self.solve_singular_column(gen, col)? {
            return Ok(true);
        }

        self.solve_column_from_prior(gen, col)
    }

    fn solve_singular_column(
        &mut self,
        gen: &mut dyn Generator,
        col: usize,
    ) -> Result<bool, PlanError> {
        let c = &self.columns[col];
        if c.have != 1 || c.unknown != 1 {
            return Ok(false);
        }

        let sum = c.chars[2];
        if c.index != 0 || sum == 0 {
            return Ok(false);
        }

        // carry + _ + _ = c, so c is the carry, which must be 1
        let prior = c.prior.ok_or_else(|| PlanError::InvalidColumnState {
            column: c.label(),
        })?;
        match self.columns[prior].carry {
            Carry::Unknown | Carry::One => {}
            // c is computed from the carry and checked like any other sum
            Carry::Zero | Carry::Computed => return Ok(false),
        }
        self.fix(gen, sum, 1)?;
        self.columns[col].solved = true;
        self.columns[prior].carry = Carry::One;
        Ok(true)
    }

    fn choose_one(&mut self, gen: &mut dyn Generator, col: usize) -> Result<bool, PlanError> {
        match self.choice {
            ChoicePolicy::First => self.choose_first(gen, col),
            ChoicePolicy::Best => self.choose_best(gen, col),
        }
    }

    fn choose_first(&mut self, gen: &mut dyn Generator, col: usize) -> Result<bool, PlanError> {
        let chars = self.columns[col].chars;
        for cc in chars {
            if cc == 0 || self.is_known(cc) {
                continue;
            }
            let (min, max) = self.fix_range(0, self.base() - 1, cc)?;
            if min == max {
                self.fix(gen, cc, min)?;
            } else {
                self.choose_range(gen, cc, min, max)?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn choose_best(&mut self, gen: &mut dyn Generator, col: usize) -> Result<bool, PlanError> {
        let chars = self.columns[col].chars;
        let mut best: Option<(u8, u8, u8)> = None;
        for cc in chars {
            if cc == 0 || self.is_known(cc) {
                continue;
            }
            let (min, max) = self.fix_range(0, self.base() - 1, cc)?;
            if min == max {
                self.fix(gen, cc, min)?;
                return Ok(true);
            }
            match best {
                Some((_, bmin, bmax)) if bmax - bmin <= max - min => {}
                _ => best = Some((cc, min, max)),
            }
        }
        match best {
            Some((cc, min, max)) => {
                self.choose_range(gen, cc, min, max)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn solve_column_from_prior(
        &mut self,
        gen: &mut dyn Generator,
        col: usize,
    ) -> Result<bool, PlanError> {
        if self.carry_in(col) == Carry::Unknown {
            // an unknown carry in needs assume_carry_solve_column
            return Ok(false);
        }
        if self.columns[col].unknown == 0 {
            return Ok(false);
        }

        if self.annotated {
            let msg = format!("solveFromPrior: {}", self.column_label(col));
            gen.logf(self, &msg);
        }

        while self.columns[col].unknown > 1 {
            if !self.choose_one(gen, col)? {
                break;
            }
        }
        if self.columns[col].unknown > 1 {
            return Ok(false);
        }

        let chars = self.columns[col].chars;
        let [a, b, c] = chars;
        let repeated = chars
            .iter()
            .find(|&&x| x != 0 && !self.is_known(x))
            .is_some_and(|&x| chars.iter().filter(|&&y| y == x).count() > 1);
        if repeated {
            // a letter on both sides of the sum is not determined by it
            if !self.choose_one(gen, col)? {
                return Ok(false);
            }
            return self.check_column(gen, col);
        }
        let target = if a != 0 && !self.is_known(a) {
            gen.compute_first_summand(self, col)?;
            a
        } else if b != 0 && !self.is_known(b) {
            gen.compute_second_summand(self, col)?;
            b
        } else if c != 0 && !self.is_known(c) {
            gen.compute_sum(self, col)?;
            c
        } else {
            return Err(PlanError::InvalidColumnState {
                column: self.columns[col].label(),
            });
        };
        self.columns[col].carry = Carry::Computed;
        self.mark_known(target);
        self.columns[col].solved = true;
        Ok(true)
    }

    /// Forks the plan on the carry into `col`: the alternate assumes 0, this
    /// plan assumes 1. Each side then solves the column and continues with
    /// `and_then` on the prior column; the alternate is planned first.
    pub fn assume_carry_solve_column(
        &mut self,
        gen: &mut dyn Generator,
        col: usize,
        and_then: &AndThen<'_>,
    ) -> Result<bool, PlanError> {
        let prior = self.columns[col]
            .prior
            .ok_or_else(|| PlanError::InvalidColumnState {
                column: self.columns[col].label(),
            })?;

        let mut label = String::new();
        if self.annotated {
            label = self.column_label(col);
            gen.logf(self, &format!("assumeCarrySolveColumn: {label}"));
            label = format!("assumeCarry({label})");
        }

        let mut alt_prob = self.clone();
        alt_prob.columns[prior].carry = Carry::Zero;
        self.columns[prior].carry = Carry::One;

        let (mut alt_label, mut cont_label) = (String::new(), String::new());
        if self.annotated {
            alt_label = format!("assumeCarry({})", alt_prob.column_label(col));
            cont_label = format!("assumeCarry({})", self.column_label(col));
        }
        let mut alt_gen = gen.fork(&alt_prob, &label, &alt_label, &cont_label)?;

        if !alt_prob.may_solve_column(alt_gen.as_mut(), col)?
            || !and_then(&mut alt_prob, alt_gen.as_mut(), prior)?
        {
            return Err(PlanError::UnsolvableColumn {
                column: alt_prob.column_label(col),
            });
        }
        drop(alt_gen);

        if !self.may_solve_column(gen, col)? || !and_then(self, gen, prior)? {
            return Err(PlanError::UnsolvableColumn {
                column: self.column_label(col),
            });
        }
        Ok(true)
    }
}
