//! Generator that assembles tiny machine programs.
//!
//! Letter values live in memory (see [`Layout`]); registers hold carries,
//! freshly computed letters and the used-flag index, and are handed out by
//! name through a [`RegisterAllocator`]. A column's carry is kept in the
//! register named `C{i}` for as long as the allocator lets it stay there,
//! and recomputed from memory otherwise.
//!
//! A fork writes `BRANCH` to the continuation followed by the alternate
//! path in line; the original generator resumes writing after the
//! alternate finishes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{PlanError, SolutionError, VerifyError};
use crate::opcode::assemble::{Assembler, Ref};
use crate::opcode::io::ByteOrder;
use crate::opcode::op::{Arg, Op};
use crate::opcode::plan::{
    sentinel, set_exit_code_op, ExitCodes, Layout, OpcodePlan, EXIT_ALREADY_USED,
    EXIT_CHECK_FAILED, EXIT_NORMAL, EXIT_VERIFY_DUPLICATE_LETTERS, EXIT_VERIFY_FINAL_CARRY,
    EXIT_VERIFY_INITIAL_LETTERS, EXIT_VERIFY_NEGATIVE_VALUE, OFF_EXIT,
};
use crate::opcode::reg_alloc::RegisterAllocator;
use crate::opcode::tiny_machine::NUM_REGISTERS;
use crate::runnable::Annotations;
use crate::search::SearchConfig;
use crate::word::generator::{FinalizeResult, Generator};
use crate::word::plan_problem::PlanProblem;
use crate::word::problem::Problem;

/// Largest op count limit a program can carry.
const MAX_OP_LIMIT: u64 = 0xffff;

/// State shared by a generator and all of its forks.
struct Shared {
    asm: Assembler,
    annotations: Option<Annotations>,
    codes: ExitCodes,
    /// Id of the only generator currently allowed to write.
    writer: usize,
    next_id: usize,
}

/// Where a forked generator hands control back to its parent.
struct ForkReturn {
    parent: usize,
    cont_label: String,
    cont: Ref,
}

/// Exit codes used by one verification pass.
#[derive(Clone, Copy)]
struct VerifyCodes {
    initial: u8,
    duplicate: u8,
    negative: u8,
    /// `None` defines a labelled code per column.
    column: Option<u8>,
    final_carry: u8,
}

/// Builds an opcode program from planning operations.
pub struct CodeGen {
    shared: Rc<RefCell<Shared>>,
    id: usize,
    regs: RegisterAllocator,
    layout: Layout,
    carry_regs: Vec<String>,
    annotated: bool,
    op_lim: Option<Ref>,
    finished: bool,
    fork_return: Option<ForkReturn>,
    config: SearchConfig,
}

fn letter_key(c: u8) -> String {
    char::from(c).to_string()
}

impl CodeGen {
    pub fn new(problem: &Problem, annotated: bool) -> Result<Self, PlanError> {
        Self::with_byte_order(problem, annotated, ByteOrder::native())
    }

    pub fn with_byte_order(
        problem: &Problem,
        annotated: bool,
        bo: ByteOrder,
    ) -> Result<Self, PlanError> {
        let layout = Layout::new(problem)?;
        let letters: usize = problem.words.iter().map(Vec::len).sum();
        let shared = Shared {
            // room for 50 wide ops per letter occurrence
            asm: Assembler::with_capacity(bo, letters * 50 * 7),
            annotations: annotated.then(Annotations::new),
            codes: ExitCodes::new(),
            writer: 0,
            next_id: 1,
        };
        Ok(Self {
            shared: Rc::new(RefCell::new(shared)),
            id: 0,
            regs: RegisterAllocator::new(NUM_REGISTERS as u8),
            layout,
            carry_regs: Vec::new(),
            annotated,
            op_lim: None,
            finished: false,
            fork_return: None,
            config: SearchConfig::default(),
        })
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Prints the program assembled so far.
    pub fn dump(&self, out: &mut dyn FnMut(&str)) {
        self.shared.borrow().asm.dump(out);
    }

    /// Bytes assembled so far.
    pub fn len(&self) -> usize {
        self.shared.borrow().asm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&mut self, op: Op) -> Result<(), PlanError> {
        let mut sh = self.shared.borrow_mut();
        if sh.writer != self.id {
            return Err(PlanError::ForkedParentWritten {
                written: op.encoded_size(),
            });
        }
        sh.asm.write_op(op)?;
        Ok(())
    }

    fn write_ref(&mut self, op: Op) -> Result<Ref, PlanError> {
        let mut sh = self.shared.borrow_mut();
        if sh.writer != self.id {
            return Err(PlanError::ForkedParentWritten {
                written: op.encoded_size(),
            });
        }
        Ok(sh.asm.write_op_ref(op)?)
    }

    fn patch_offset(&self, r: Ref, target: usize) -> Result<(), PlanError> {
        r.write_offset(&mut self.shared.borrow_mut().asm, target)?;
        Ok(())
    }

    fn annotate(&self, anno: impl FnOnce() -> String) {
        let mut sh = self.shared.borrow_mut();
        let offset = sh.asm.len();
        if let Some(annos) = sh.annotations.as_mut() {
            annos.entry(offset).or_default().push(anno());
        }
    }

    fn label(&self, name: impl FnOnce() -> String) {
        if self.annotated {
            self.annotate(|| format!(":{}", name()));
        }
    }

    fn code_for(&self, err: SolutionError) -> Result<u8, PlanError> {
        self.shared.borrow_mut().codes.code_for(err)
    }

    fn val(&self, c: u8) -> Result<Arg, PlanError> {
        self.layout
            .value_offset(c)
            .map(Arg::location)
            .ok_or(PlanError::UnknownLetter(c))
    }

    fn base(&self) -> Arg {
        Arg::immediate(u16::from(self.layout.base()))
    }

    /// Sets the exit code and halts.
    fn exit(&mut self, code: u8) -> Result<(), PlanError> {
        self.write(set_exit_code_op(code))?;
        self.write(Op::halt())
    }

    /// An argument holding the carry out of `col`; `None` is the zero carry
    /// into the rightmost column.
    fn carry_arg(&mut self, prob: &PlanProblem, col: Option<usize>) -> Result<Arg, PlanError> {
        let Some(ci) = col else {
            return Ok(Arg::immediate(0));
        };
        if let Some(r) = self.regs.get(&self.carry_regs[ci]) {
            return Ok(Arg::register(r));
        }
        if let Some(k) = prob.columns[ci].carry.fixed() {
            return Ok(Arg::immediate(u16::from(k)));
        }
        self.compute_carry(prob, ci)
    }

    /// A register to compute the carry out of `col` in, starting from the
    /// carry into it.
    fn setup_carry_compute(&mut self, prob: &PlanProblem, col: usize) -> Result<Arg, PlanError> {
        let prior = prob.columns[col].prior;
        let arg = self.carry_arg(prob, prior)?;
        if let (Some(pi), true) = (prior, arg.as_register() != 0) {
            self.regs.reassign(&self.carry_regs[pi], &self.carry_regs[col]);
            return Ok(arg);
        }
        let name = self.carry_regs[col].clone();
        let rc = Arg::register(self.regs.take(&name));
        self.annotate(|| format!("{name}={}", arg.val));
        self.write(Op::mov(rc, arg))?;
        Ok(rc)
    }

    fn compute_carry(&mut self, prob: &PlanProblem, col: usize) -> Result<Arg, PlanError> {
        let column = &prob.columns[col];
        let [a, b, _] = column.chars;
        for c in [a, b] {
            if c != 0 && !prob.is_known(c) {
                return Err(PlanError::UnresolvedCarry { column: col });
            }
        }
        self.label(|| format!("computeCarry({})", column.label()));

        if a == 0 && b == 0 {
            // a lone carry in never carries out
            let name = self.carry_regs[col].clone();
            let rc = Arg::register(self.regs.take(&name));
            self.annotate(|| format!("{name}=0"));
            self.write(Op::mov(rc, Arg::immediate(0)))?;
            return Ok(rc);
        }

        let rc = self.setup_carry_compute(prob, col)?;
        for c in [a, b] {
            if c != 0 {
                self.write(Op::add(rc, self.val(c)?))?;
            }
        }
        self.write(Op::div(rc, self.base()))?;
        Ok(rc)
    }

    /// Exits with "already used" if the digit in `rl` is taken; returns the
    /// used flag location for that digit.
    fn check_used(&mut self, rl: Arg) -> Result<Arg, PlanError> {
        let ri = self.regs.take("index");
        let use_loc = Arg::indexed(self.layout.used_offset(), ri);
        let ri = Arg::register(ri);
        self.write(Op::mov(ri, rl))?;
        self.write(Op::mul(ri, Arg::immediate(2)))?;
        self.write(Op::eq(use_loc, Arg::immediate(0)))?;
        self.write(Op::jumpt(OFF_EXIT))?;
        self.exit(EXIT_ALREADY_USED)?;
        Ok(use_loc)
    }

    /// Stores the digit in `rl` as the value of `c` and marks it used.
    fn store_letter(&mut self, c: u8, rl: Arg, use_loc: Arg) -> Result<(), PlanError> {
        self.write(Op::mov(self.val(c)?, rl))?;
        self.write(Op::mov(use_loc, Arg::immediate(1)))
    }

    fn check_after_compute(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        c: u8,
        rl: Arg,
        rc: Arg,
    ) -> Result<(), PlanError> {
        if prob.problem.is_initial_letter(c) {
            self.label(|| format!("checkInitialLetter({})", char::from(c)));
            self.write(Op::eq(rl, Arg::immediate(0)))?;
            self.write(Op::jumpf(OFF_EXIT))?;
            self.exit(EXIT_CHECK_FAILED)?;
        }
        self.check_fixed_carry(prob, col, rc)
    }

    /// Guards a carry out that planning assumed to be a constant.
    fn check_fixed_carry(&mut self, prob: &PlanProblem, col: usize, rc: Arg) -> Result<(), PlanError> {
        let column = &prob.columns[col];
        let Some(k) = column.carry.fixed() else {
            return Ok(());
        };
        self.label(|| format!("checkFixedCarry({})", column.label()));
        self.write(Op::eq(rc, Arg::immediate(u16::from(k))))?;
        self.write(Op::jumpt(OFF_EXIT))?;
        self.exit(EXIT_CHECK_FAILED)
    }

    fn compute_summand(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        a: u8,
        b: u8,
        c: u8,
    ) -> Result<(), PlanError> {
        self.label(|| {
            format!(
                "computeSummand({}, {})",
                char::from(a),
                prob.columns[col].label()
            )
        });

        // a = (c - b - carry + base) % base
        let rc = self.setup_carry_compute(prob, col)?;
        let rl = Arg::register(self.regs.take(&letter_key(a)));
        self.annotate(|| format!("{}={}", char::from(c), self.carry_regs[col]));
        self.write(Op::mov(rl, rc))?;
        self.write(Op::neg(rl))?;
        if c != 0 {
            self.write(Op::add(rl, self.val(c)?))?;
        }
        if b != 0 {
            self.write(Op::sub(rl, self.val(b)?))?;
        }
        self.write(Op::add(rl, self.base()))?;
        self.write(Op::modulo(rl, self.base()))?;

        let use_loc = self.check_used(rl)?;
        self.store_letter(a, rl, use_loc)?;

        // carry = (carry + a + b) / base
        if b != 0 {
            self.write(Op::add(rc, self.val(b)?))?;
        }
        self.write(Op::add(rc, rl))?;
        self.write(Op::div(rc, self.base()))?;

        self.check_after_compute(prob, col, a, rl, rc)
    }

    /// Checks `carry + a + b == c (mod base)` for a column, leaving its
    /// carry out in `C{col}`.
    fn check_column_code(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        code: u8,
        name: Option<&str>,
    ) -> Result<(), PlanError> {
        let column = &prob.columns[col];
        let [a, b, c] = column.chars;
        if let Some(name) = name {
            self.label(|| format!("{name}({})", column.label()));
        }

        let rc = self.setup_carry_compute(prob, col)?;
        let mut summands = 0;
        for x in [a, b] {
            if x != 0 {
                summands += 1;
                self.write(Op::add(rc, self.val(x)?))?;
            }
        }

        let rl = Arg::register(self.regs.take(&letter_key(c)));
        self.annotate(|| format!("{}={}", char::from(c), self.carry_regs[col]));
        self.write(Op::mov(rl, rc))?;
        if summands > 0 {
            self.write(Op::modulo(rl, self.base()))?;
        }

        self.write(Op::eq(rl, self.val(c)?))?;
        self.write(Op::jumpt(OFF_EXIT))?;
        self.exit(code)?;

        if summands > 0 {
            self.write(Op::div(rc, self.base()))?;
            self.check_fixed_carry(prob, col, rc)
        } else {
            self.annotate(|| format!("{}=0", self.carry_regs[col]));
            self.write(Op::mov(rc, Arg::immediate(0)))
        }
    }

    fn do_verify(
        &mut self,
        prob: &PlanProblem,
        name: &str,
        err: Option<SolutionError>,
    ) -> Result<(), PlanError> {
        let name = self.annotated.then_some(name);
        if let Some(name) = name {
            self.label(|| name.to_string());
        }
        let codes = match err {
            None => VerifyCodes {
                initial: EXIT_VERIFY_INITIAL_LETTERS,
                duplicate: EXIT_VERIFY_DUPLICATE_LETTERS,
                negative: EXIT_VERIFY_NEGATIVE_VALUE,
                column: None,
                final_carry: EXIT_VERIFY_FINAL_CARRY,
            },
            Some(err) => {
                let code = self.code_for(err)?;
                VerifyCodes {
                    initial: code,
                    duplicate: code,
                    negative: code,
                    column: Some(code),
                    final_carry: code,
                }
            }
        };
        let sub = |part: &str| name.map(|n| format!("{n}:{part}"));

        if let Some(l) = sub("initialLetters") {
            self.label(|| l);
        }
        for word in &prob.problem.words {
            if let Some(&c) = word.first() {
                self.write(Op::eq(self.val(c)?, Arg::immediate(0)))?;
                self.write(Op::jumpf(OFF_EXIT))?;
                self.exit(codes.initial)?;
            }
        }

        if let Some(l) = sub("duplicateLetters") {
            self.label(|| l);
        }
        let known: Vec<u8> = prob.known.iter().copied().collect();
        for (i, &c) in known.iter().enumerate() {
            for &d in &known[i + 1..] {
                self.write(Op::eq(self.val(c)?, self.val(d)?))?;
                self.write(Op::jumpf(OFF_EXIT))?;
                self.exit(codes.duplicate)?;
            }
        }

        if let Some(l) = sub("allLettersNonNegative") {
            self.label(|| l);
        }
        for &c in &known {
            self.write(Op::lt(self.val(c)?, Arg::immediate(0)))?;
            self.write(Op::jumpf(OFF_EXIT))?;
            self.exit(codes.negative)?;
        }

        for i in (0..prob.columns.len()).rev() {
            if prob.columns[i].unknown > 0 {
                break;
            }
            let code = match codes.column {
                Some(code) => code,
                None => self.code_for(VerifyError::Column(Some(prob.columns[i].label())).into())?,
            };
            self.check_column_code(prob, i, code, name)?;
        }

        if let Some(l) = sub("finalCarry") {
            self.label(|| l);
        }
        self.verify_final_carry(prob, codes.final_carry)
    }

    fn verify_final_carry(&mut self, prob: &PlanProblem, code: u8) -> Result<(), PlanError> {
        if prob.columns.is_empty() {
            return Ok(());
        }
        let rc = self.carry_arg(prob, Some(0))?;
        if rc.code.is_value() {
            return match rc.val {
                0 => Ok(()),
                k => Err(PlanError::BrokenFinalCarry(i32::from(k))),
            };
        }
        self.write(Op::eq(rc, Arg::immediate(0)))?;
        self.write(Op::jumpt(OFF_EXIT))?;
        self.exit(code)
    }
}

impl Generator for CodeGen {
    fn init(&mut self, prob: &PlanProblem, desc: &str) -> Result<(), PlanError> {
        log::debug!("opcode plan for {} ({desc})", prob.problem);
        self.carry_regs = (0..prob.columns.len()).map(|i| format!("C{i}")).collect();
        self.op_lim = Some(self.write_ref(Op::op_lim(0))?);
        let letters = self.layout.letters().to_vec();
        for c in letters {
            self.write(Op::mov(self.val(c)?, Arg::immediate(sentinel(c))))?;
        }
        Ok(())
    }

    fn fork(
        &mut self,
        _prob: &PlanProblem,
        name: &str,
        alt: &str,
        cont: &str,
    ) -> Result<Box<dyn Generator>, PlanError> {
        if !alt.is_empty() {
            self.label(|| alt.to_string());
        }
        let id = {
            let mut sh = self.shared.borrow_mut();
            if sh.writer != self.id {
                return Err(PlanError::ForkedParentWritten { written: 0 });
            }
            let id = sh.next_id;
            sh.next_id += 1;
            sh.writer = id;
            id
        };
        log::trace!("fork {name}: generator {} -> {id}", self.id);

        let mut gen = CodeGen {
            shared: self.shared.clone(),
            id,
            regs: self.regs.clone(),
            layout: self.layout.clone(),
            carry_regs: self.carry_regs.clone(),
            annotated: self.annotated,
            op_lim: None,
            finished: false,
            fork_return: None,
            config: self.config.clone(),
        };
        let cont_ref = gen.write_ref(Op::branch(0))?;
        gen.fork_return = Some(ForkReturn {
            parent: self.id,
            cont_label: cont.to_string(),
            cont: cont_ref,
        });
        Ok(Box::new(gen))
    }

    fn fix(&mut self, _prob: &PlanProblem, c: u8, v: u8) -> Result<(), PlanError> {
        self.label(|| format!("fix({})", char::from(c)));
        let used = Arg::location(self.layout.used_offset_of(v));
        self.write(Op::eq(used, Arg::immediate(0)))?;
        self.write(Op::jumpt(OFF_EXIT))?;
        self.exit(EXIT_ALREADY_USED)?;
        self.write(Op::mov(self.val(c)?, Arg::immediate(u16::from(v))))?;
        self.write(Op::mov(used, Arg::immediate(1)))
    }

    fn compute_sum(&mut self, prob: &PlanProblem, col: usize) -> Result<(), PlanError> {
        let column = &prob.columns[col];
        let [a, b, c] = column.chars;
        self.label(|| format!("computeSum({})", column.label()));

        // c = (carry + a + b) % base
        let rc = self.setup_carry_compute(prob, col)?;
        for x in [a, b] {
            if x != 0 {
                self.write(Op::add(rc, self.val(x)?))?;
            }
        }
        let rl = Arg::register(self.regs.take(&letter_key(c)));
        self.annotate(|| format!("{}={}", char::from(c), self.carry_regs[col]));
        self.write(Op::mov(rl, rc))?;
        self.write(Op::modulo(rl, self.base()))?;

        let use_loc = self.check_used(rl)?;
        self.store_letter(c, rl, use_loc)?;

        self.write(Op::div(rc, self.base()))?;
        self.check_after_compute(prob, col, c, rl, rc)
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
        let label = format!("choose({}, {min}, {max})", char::from(c));
        self.label(|| label.clone());

        let rl = Arg::register(self.regs.take(&letter_key(c)));
        let ri = self.regs.take("index");
        let use_loc = Arg::indexed(self.layout.used_offset(), ri);
        let ri = Arg::register(ri);

        self.write(Op::mov(rl, Arg::immediate(u16::from(min))))?;

        if min >= max {
            self.write(Op::mov(ri, rl))?;
            self.write(Op::mul(ri, Arg::immediate(2)))?;
            self.write(Op::eq(use_loc, Arg::immediate(0)))?;
            self.write(Op::jumpt(OFF_EXIT))?;
            self.exit(EXIT_ALREADY_USED)?;
        } else {
            let body = self.len();
            self.label(|| format!("{label}:body"));
            self.write(Op::mov(ri, rl))?;
            self.write(Op::mul(ri, Arg::immediate(2)))?;
            self.write(Op::eq(use_loc, Arg::immediate(0)))?;
            // the parent takes the digit, the copy tries the next one
            let bref = self.write_ref(Op::brancht(0))?;
            self.write(Op::add(rl, Arg::immediate(1)))?;
            self.write(Op::lt(rl, Arg::immediate(u16::from(max))))?;
            let jref = self.write_ref(Op::jumpt(0))?;
            self.write(Op::mov(ri, rl))?;
            self.write(Op::mul(ri, Arg::immediate(2)))?;
            self.write(Op::eq(use_loc, Arg::immediate(0)))?;
            self.write(Op::jumpt(OFF_EXIT))?;
            self.exit(EXIT_ALREADY_USED)?;

            let cont = self.len();
            self.label(|| format!("{label}:cont"));
            self.patch_offset(bref, cont)?;
            self.patch_offset(jref, body)?;
        }

        self.store_letter(c, rl, use_loc)
    }

    fn check_column(
        &mut self,
        prob: &PlanProblem,
        col: usize,
        err: Option<SolutionError>,
    ) -> Result<(), PlanError> {
        let code = self.code_for(err.unwrap_or(SolutionError::CheckFailed))?;
        let name = self.annotated.then_some("checkColumn");
        self.check_column_code(prob, col, code, name)
    }

    fn check(&mut self, prob: &PlanProblem, err: SolutionError) -> Result<(), PlanError> {
        self.do_verify(prob, "check", Some(err))
    }

    fn verify(&mut self, prob: &PlanProblem) -> Result<(), PlanError> {
        self.do_verify(prob, "verify", None)
    }

    fn finish(&mut self, _prob: &PlanProblem) -> Result<(), PlanError> {
        if self.finished {
            return Err(PlanError::DoubleFinish);
        }
        self.finished = true;
        self.label(|| "finish".to_string());
        self.exit(EXIT_NORMAL)?;

        if let Some(ret) = self.fork_return.take() {
            if !ret.cont_label.is_empty() {
                self.label(|| ret.cont_label.clone());
            }
            let end = self.len();
            self.patch_offset(ret.cont, end)?;
            self.shared.borrow_mut().writer = ret.parent;
        }
        Ok(())
    }

    fn finalize(&mut self, prob: &PlanProblem) -> FinalizeResult {
        if self.id != 0 {
            return Err(PlanError::FinalizeFork);
        }
        let mut sh = self.shared.borrow_mut();

        // every op of every brute force candidate
        let op_count = sh.asm.op_count() as u64;
        let budget = prob.problem.falling_factorial().saturating_mul(op_count);
        if let Some(r) = self.op_lim {
            r.write_value1(&mut sh.asm, budget.clamp(1, MAX_OP_LIMIT) as u16)?;
        }

        let bo = sh.asm.byte_order();
        let program = sh.asm.bytes().to_vec();
        let annotations = sh.annotations.take();
        let codes = sh.codes.clone();
        drop(sh);

        log::debug!(
            "opcode program: {} bytes, {op_count} ops, budget {budget}",
            program.len()
        );
        let plan = OpcodePlan::new(
            prob.problem.clone(),
            self.layout.clone(),
            codes,
            bo,
            program,
            annotations,
        )?
        .with_config(self.config.clone())
        .with_budget(budget);
        Ok(Some(Box::new(plan)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::code::OpCode;
    use crate::opcode::io::decode_all;
    use crate::word::plan::Plan;
    use crate::word::solution::{solution_mapping, Solution};
    use crate::word::strategy::Strategy;

    fn to_go_out() -> Problem {
        Problem::setup("to", "go", "out").unwrap()
    }

    fn ops(gen: &CodeGen) -> Vec<Op> {
        let sh = gen.shared.borrow();
        decode_all(sh.asm.byte_order(), sh.asm.bytes())
            .unwrap()
            .into_iter()
            .map(|(_, op)| op)
            .collect()
    }

    fn plan(strategy: Strategy, annotated: bool) -> Box<dyn Plan> {
        let problem = to_go_out();
        let mut prob = PlanProblem::new(&problem, annotated);
        let mut gen = CodeGen::new(&problem, annotated).unwrap();
        strategy.plan(&mut prob, &mut gen, false).unwrap().unwrap()
    }

    fn solutions(plan: &dyn Plan) -> Vec<String> {
        let mut found = Vec::new();
        let mut res = |sol: &dyn Solution| {
            if sol.check().is_ok() {
                found.push(solution_mapping(sol));
            }
            false
        };
        plan.run(&mut res).unwrap();
        found
    }

    #[test]
    fn test_init_writes_sentinels() {
        let problem = to_go_out();
        let prob = PlanProblem::new(&problem, false);
        let mut gen = CodeGen::new(&problem, false).unwrap();
        gen.init(&prob, "test").unwrap();
        let ops = ops(&gen);
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[0], Op::op_lim(0));
        assert_eq!(
            ops[1],
            Op::mov(Arg::location(1), Arg::immediate(sentinel(b'g')))
        );
        assert_eq!(gen.carry_regs, vec!["C0", "C1", "C2"]);
    }

    #[test]
    fn test_fix_marks_used() {
        let problem = to_go_out();
        let prob = PlanProblem::new(&problem, false);
        let mut gen = CodeGen::new(&problem, false).unwrap();
        gen.fix(&prob, b'o', 1).unwrap();
        assert_eq!(
            ops(&gen),
            vec![
                Op::eq(Arg::location(11), Arg::immediate(0)),
                Op::jumpt(OFF_EXIT),
                set_exit_code_op(EXIT_ALREADY_USED),
                Op::halt(),
                Op::mov(Arg::location(3), Arg::immediate(1)),
                Op::mov(Arg::location(11), Arg::immediate(1)),
            ]
        );
    }

    #[test]
    fn test_fix_rejects_taken_digit() {
        // u is chosen from 0..=1, then o is fixed to 1
        let problem = to_go_out();
        let prob = PlanProblem::new(&problem, false);
        let mut gen = CodeGen::new(&problem, false).unwrap();
        gen.init(&prob, "test").unwrap();
        gen.choose_range(&prob, b'u', 0, 1).unwrap();
        gen.fix(&prob, b'o', 1).unwrap();
        gen.finish(&prob).unwrap();
        let plan = gen.finalize(&prob).unwrap().unwrap();

        let mut values = Vec::new();
        let mut failures = 0;
        let mut res = |sol: &dyn Solution| {
            match sol.check() {
                Ok(()) => values.push(solution_mapping(sol)),
                Err(_) => failures += 1,
            }
            false
        };
        plan.run(&mut res).unwrap();
        assert_eq!(values, vec!["o:1 u:0"]);
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_single_value_range_has_no_loop() {
        let problem = to_go_out();
        let prob = PlanProblem::new(&problem, false);
        let mut gen = CodeGen::new(&problem, false).unwrap();
        gen.choose_range(&prob, b't', 4, 4).unwrap();
        let ops = ops(&gen);
        assert!(ops.iter().all(|op| op.code != OpCode::BRANCHT));
        assert_eq!(ops[0], Op::mov(Arg::register(1), Arg::immediate(4)));

        let mut gen = CodeGen::new(&problem, false).unwrap();
        gen.choose_range(&prob, b't', 1, 9).unwrap();
        assert_eq!(ops_of(&gen, OpCode::BRANCHT), 1);
    }

    fn ops_of(gen: &CodeGen, code: OpCode) -> usize {
        ops(gen).iter().filter(|op| op.code == code).count()
    }

    #[test]
    fn test_double_finish() {
        let problem = to_go_out();
        let prob = PlanProblem::new(&problem, false);
        let mut gen = CodeGen::new(&problem, false).unwrap();
        gen.finish(&prob).unwrap();
        assert_eq!(gen.finish(&prob), Err(PlanError::DoubleFinish));
    }

    #[test]
    fn test_fork_guards_parent() {
        let problem = to_go_out();
        let prob = PlanProblem::new(&problem, true);
        let mut gen = CodeGen::new(&problem, true).unwrap();
        let mut alt = gen.fork(&prob, "f", "alt", "cont").unwrap();
        assert_eq!(
            gen.fix(&prob, b'o', 1),
            Err(PlanError::ForkedParentWritten { written: 7 })
        );
        assert!(matches!(alt.finalize(&prob), Err(PlanError::FinalizeFork)));
        alt.fix(&prob, b'o', 1).unwrap();
        alt.finish(&prob).unwrap();
        gen.fix(&prob, b'o', 1).unwrap();

        let ops = ops(&gen);
        // BRANCH, the alternate's fix and exit, then the parent's fix
        assert_eq!(ops[0].code, OpCode::BRANCH);
        assert_eq!(ops.len(), 15);
        let sh = gen.shared.borrow();
        let annos = sh.annotations.as_ref().unwrap();
        assert_eq!(annos.get(&0), Some(&vec![":alt".to_string()]));
        // the BRANCH lands on the continuation
        let fix = 7 + 4 + 7 + 1 + 7 + 7;
        let cont = 4 + fix + 7 + 1;
        assert_eq!(
            annos.get(&cont),
            Some(&vec![":cont".to_string(), ":fix(o)".to_string()])
        );
    }

    #[test]
    fn test_every_strategy_finds_to_go_out() {
        for strategy in Strategy::ALL {
            let plan = plan(strategy, false);
            assert_eq!(
                solutions(plan.as_ref()),
                vec!["g:8 o:1 t:2 u:0"],
                "strategy {strategy}"
            );
        }
    }

    #[test]
    fn test_annotated_dump() {
        let plan = plan(Strategy::BottomUp, true);
        let mut lines = Vec::new();
        plan.dump(&mut |l| lines.push(l.to_string()));
        assert!(lines[0].starts_with("0000: OPLIM "));
        assert!(lines.iter().any(|l| l.contains(":choose(")));
        assert!(lines.iter().any(|l| l.contains("HALT")));
        assert!(lines.iter().any(|l| l.contains(":finish")));
        assert_eq!(solutions(plan.as_ref()), vec!["g:8 o:1 t:2 u:0"]);
    }
}
