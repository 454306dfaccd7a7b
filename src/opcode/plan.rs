//! Runnable opcode plans: the memory layout and exit codes shared with the
//! code generator, and the adapter that presents machines as solutions.

use std::fmt;
use std::rc::Rc;

use crate::error::{MachineError, PlanError, SearchError, SolutionError, VerifyError};
use crate::log::{elided, prefixed};
use crate::opcode::code::OpCode;
use crate::opcode::io::{decode_all, ByteOrder};
use crate::opcode::machine::{dump_memory, run_all, ForkKind, Machine, Tracer};
use crate::opcode::op::{Arg, Op};
use crate::opcode::tiny_machine::TinyMachine;
use crate::runnable::Annotations;
use crate::search::{SearchConfig, SearchReport};
use crate::word::plan::{Delivery, Plan, Resultor, StateId, Watcher};
use crate::word::problem::Problem;
use crate::word::solution::Solution;

pub const EXIT_NORMAL: u8 = 0;
pub const EXIT_ALREADY_USED: u8 = 1;
pub const EXIT_CHECK_FAILED: u8 = 2;
pub const EXIT_NO_CHOICES: u8 = 3;
pub const EXIT_VERIFY_INITIAL_LETTERS: u8 = 4;
pub const EXIT_VERIFY_DUPLICATE_LETTERS: u8 = 5;
pub const EXIT_VERIFY_NEGATIVE_VALUE: u8 = 6;
pub const EXIT_VERIFY_COLUMN: u8 = 7;
pub const EXIT_VERIFY_FINAL_CARRY: u8 = 8;
/// Flags a code defined by the program rather than built in.
pub const EXIT_CUSTOM: u8 = 0x80;
pub const EXIT_CUSTOM_MASK: u8 = 0x7f;

/// Writes the exit code into memory cell 0.
pub fn set_exit_code_op(code: u8) -> Op {
    Op::movl(Arg::location(0), Arg::immediate(u16::from(code)))
}

/// Jump distance that skips one exit sequence (set code, halt).
pub const OFF_EXIT: i16 = 8;

/// Maps solution errors to machine exit codes and back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitCodes {
    custom: Vec<SolutionError>,
}

impl ExitCodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed code of a builtin error.
    pub fn builtin(err: &SolutionError) -> Option<u8> {
        let code = match err {
            SolutionError::AlreadyUsed => EXIT_ALREADY_USED,
            SolutionError::CheckFailed => EXIT_CHECK_FAILED,
            SolutionError::NoChoices => EXIT_NO_CHOICES,
            SolutionError::Verify(VerifyError::InitialLetters) => EXIT_VERIFY_INITIAL_LETTERS,
            SolutionError::Verify(VerifyError::DuplicateLetters) => EXIT_VERIFY_DUPLICATE_LETTERS,
            SolutionError::Verify(VerifyError::NegativeValue) => EXIT_VERIFY_NEGATIVE_VALUE,
            SolutionError::Verify(VerifyError::Column(None)) => EXIT_VERIFY_COLUMN,
            SolutionError::Verify(VerifyError::FinalCarry) => EXIT_VERIFY_FINAL_CARRY,
            _ => return None,
        };
        Some(code)
    }

    /// Defines `err` as a custom code, or returns the code it already has.
    pub fn define_error(&mut self, err: SolutionError) -> Result<u8, PlanError> {
        if let Some(i) = self.custom.iter().position(|e| *e == err) {
            return Ok(EXIT_CUSTOM | i as u8);
        }
        let limit = usize::from(EXIT_CUSTOM_MASK) + 1;
        if self.custom.len() >= limit {
            return Err(PlanError::ExitCodeOverflow(limit));
        }
        self.custom.push(err);
        Ok(EXIT_CUSTOM | (self.custom.len() - 1) as u8)
    }

    /// The code for `err`: builtin if it is one, custom otherwise.
    pub fn code_for(&mut self, err: SolutionError) -> Result<u8, PlanError> {
        match Self::builtin(&err) {
            Some(code) => Ok(code),
            None => self.define_error(err),
        }
    }

    /// The outcome a machine exit code stands for.
    pub fn error_for(&self, code: u8) -> Result<(), SolutionError> {
        let err = match code {
            EXIT_NORMAL => return Ok(()),
            EXIT_ALREADY_USED => SolutionError::AlreadyUsed,
            EXIT_CHECK_FAILED => SolutionError::CheckFailed,
            EXIT_NO_CHOICES => SolutionError::NoChoices,
            EXIT_VERIFY_INITIAL_LETTERS => VerifyError::InitialLetters.into(),
            EXIT_VERIFY_DUPLICATE_LETTERS => VerifyError::DuplicateLetters.into(),
            EXIT_VERIFY_NEGATIVE_VALUE => VerifyError::NegativeValue.into(),
            EXIT_VERIFY_COLUMN => VerifyError::Column(None).into(),
            EXIT_VERIFY_FINAL_CARRY => VerifyError::FinalCarry.into(),
            code if code & EXIT_CUSTOM != 0 => self
                .custom
                .get(usize::from(code & EXIT_CUSTOM_MASK))
                .cloned()
                .unwrap_or(SolutionError::UnknownExitCode(code)),
            code => SolutionError::UnknownExitCode(code),
        };
        Err(err)
    }

    /// Number of custom codes defined.
    pub fn custom_len(&self) -> usize {
        self.custom.len()
    }
}

/// Most letters, and largest base, the layout has room for.
pub const MAX_LAYOUT: usize = 50;

/// Where letter values and used-digit flags live in machine memory.
///
/// Memory cell 0 holds the exit code; each letter (in sorted order) then
/// gets a 16 bit cell, followed by one 16 bit "used" flag per digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    letters: Vec<u8>,
    base: u8,
}

impl Layout {
    pub fn new(problem: &Problem) -> Result<Self, PlanError> {
        let letters = problem.sorted_letters();
        if letters.len() > MAX_LAYOUT || usize::from(problem.base) > MAX_LAYOUT {
            return Err(PlanError::LayoutOverflow {
                letters: letters.len(),
                base: problem.base,
            });
        }
        Ok(Self {
            letters,
            base: problem.base,
        })
    }

    pub fn letters(&self) -> &[u8] {
        &self.letters
    }

    pub fn base(&self) -> u8 {
        self.base
    }

    /// Address of the value cell of `c`.
    pub fn value_offset(&self, c: u8) -> Option<u16> {
        let i = self.letters.iter().position(|&l| l == c)?;
        Some(1 + 2 * i as u16)
    }

    /// Address of the used flag for digit 0.
    pub fn used_offset(&self) -> u16 {
        1 + 2 * self.letters.len() as u16
    }

    /// Address of the used flag for digit `v`.
    pub fn used_offset_of(&self, v: u8) -> u16 {
        self.used_offset() + 2 * u16::from(v)
    }
}

/// The value cell contents of a letter that has not been set.
pub fn sentinel(c: u8) -> u16 {
    (c as i16).wrapping_neg() as u16
}

/// A letter's value cell as read back from a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LetterValue {
    pub letter: u8,
    pub val: u16,
    pub known: bool,
    pub valid: bool,
}

impl fmt::Display for LetterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = char::from(self.letter);
        if !self.valid {
            write!(f, "INVALID({c}={:04x})", self.val)
        } else if !self.known {
            write!(f, "UNKNOWN({c}={:04x})", self.val)
        } else {
            write!(f, "{c}={}", self.val)
        }
    }
}

/// An assembled program loaded into a machine, ready to run.
pub struct OpcodePlan {
    problem: Problem,
    layout: Layout,
    codes: ExitCodes,
    machine: TinyMachine,
    annotations: Option<Annotations>,
    config: SearchConfig,
    budget: u64,
}

impl OpcodePlan {
    /// Loads `program`, validating it unless annotations are present.
    pub fn new(
        problem: Problem,
        layout: Layout,
        codes: ExitCodes,
        bo: ByteOrder,
        program: Vec<u8>,
        annotations: Option<Annotations>,
    ) -> Result<Self, PlanError> {
        let assume_valid = annotations.is_none();
        let program: Rc<[u8]> = program.into();
        let machine = TinyMachine::with_program(bo, program, assume_valid)?;
        Ok(Self {
            problem,
            layout,
            codes,
            machine,
            annotations,
            config: SearchConfig::default(),
            budget: u64::MAX,
        })
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = budget;
        self
    }

    pub fn machine(&self) -> &TinyMachine {
        &self.machine
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn codes(&self) -> &ExitCodes {
        &self.codes
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    fn letter_value(&self, mach: &dyn Machine, c: u8) -> Option<LetterValue> {
        let off = self.layout.value_offset(c)?;
        let mut buf = [0u8; 2];
        if mach.copy_memory(usize::from(off), &mut buf) != 2 {
            return None;
        }
        let val = mach.byte_order().from_bytes(buf);
        let known = val != sentinel(c);
        Some(LetterValue {
            letter: c,
            val,
            known,
            valid: !known || val < u16::from(self.layout.base),
        })
    }

    /// `[c=1 d=2 UNKNOWN(e=ff9b)]`, listing known and invalid letters.
    fn letter_values(&self, mach: &dyn Machine) -> String {
        let parts: Vec<String> = self
            .layout
            .letters()
            .iter()
            .filter_map(|&c| self.letter_value(mach, c))
            .filter(|lv| lv.known || !lv.valid)
            .map(|lv| lv.to_string())
            .collect();
        format!("[{}]", parts.join(" "))
    }

    fn outcome(&self, mach: &dyn Machine) -> Result<(), SolutionError> {
        match mach.check() {
            Ok(()) => Ok(()),
            Err(MachineError::NonZeroHalt(code)) => self.codes.error_for(code),
            Err(err) => Err(SolutionError::Machine(err)),
        }
    }
}

impl Plan for OpcodePlan {
    fn problem(&self) -> &Problem {
        &self.problem
    }

    fn run_watched(
        &self,
        res: &mut dyn Resultor,
        watcher: Option<&mut dyn Watcher>,
    ) -> Result<SearchReport, SearchError> {
        let mut delivery = Delivery::new(res, watcher);
        let mut tracer = PlanTracer {
            plan: self,
            delivery: &mut delivery,
            fault: None,
        };
        let report = run_all(
            self.machine.clone(),
            self.config.clone(),
            self.budget,
            &mut tracer,
        )?;
        if let Some(err) = tracer.fault {
            return Err(SearchError::Machine(err));
        }
        log::debug!("opcode plan run:\n{}", report.statistics.format_summary());
        Ok(report)
    }

    fn dump(&self, out: &mut dyn FnMut(&str)) {
        let program = self.machine.program();
        let ops = match decode_all(self.machine.byte_order(), program) {
            Ok(ops) => ops,
            Err(err) => {
                out(&format!("undecodable program: {err}"));
                return;
            }
        };
        for (i, op) in ops {
            match self.annotations.as_ref().and_then(|a| a.get(&i)) {
                Some(annos) if !annos.is_empty() => {
                    out(&format!("{i:04x}: {op} // {}", annos.join(" ")))
                }
                _ => out(&format!("{i:04x}: {op}")),
            }
        }
    }

    fn decorate(&self, sol: &dyn Solution) -> Vec<String> {
        let Some(annos) = &self.annotations else {
            return Vec::new();
        };
        sol.position()
            .and_then(|pi| annos.get(&pi))
            .cloned()
            .unwrap_or_default()
    }
}

/// Which event a machine is being presented for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
    Deferred(ForkKind),
    Result,
}

/// A machine of a running plan seen as a [`Solution`].
pub struct MachineView<'a> {
    plan: &'a OpcodePlan,
    mach: &'a dyn Machine,
    phase: Phase,
}

impl<'a> MachineView<'a> {
    pub fn new(plan: &'a OpcodePlan, mach: &'a dyn Machine, phase: Phase) -> Self {
        Self { plan, mach, phase }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn machine(&self) -> &dyn Machine {
        self.mach
    }

    fn dump_memory(&self, out: &mut dyn FnMut(&str)) {
        let cont = elided("memory:");
        let prefixes = ["memory:", cont.as_str()];
        let mut out = prefixed(out, &prefixes);
        dump_memory(self.mach, &mut out);
    }
}

impl Solution for MachineView<'_> {
    fn problem(&self) -> &Problem {
        &self.plan.problem
    }

    fn value_of(&self, c: u8) -> (i32, bool) {
        match self.plan.letter_value(self.mach, c) {
            Some(lv) => (i32::from(lv.val as i16), lv.known),
            None => (0, false),
        }
    }

    fn check(&self) -> Result<(), SolutionError> {
        self.plan.outcome(self.mach)
    }

    fn dump(&self, out: &mut dyn FnMut(&str)) {
        let state = self.mach.state();
        let next = || {
            self.mach
                .next_op()
                .map_or_else(|| "END".to_string(), |op| op.to_string())
        };
        match self.phase {
            Phase::Before => out(&format!("state: {state} // before: {}", next())),
            Phase::After => {
                let op = self.mach.last_op();
                out(&format!("state: {state} // after: {op}"));
                let is_move = matches!(op.code, OpCode::MOVE | OpCode::MOVEL | OpCode::MOVEH);
                if is_move && op.arg1.code.is_indirect() {
                    out(&format!("mapping: {}", self.plan.letter_values(self.mach)));
                    self.dump_memory(out);
                }
            }
            Phase::Deferred(kind) => {
                out(&format!("defer {kind}: {state} // deferred: {}", next()))
            }
            Phase::Result => {
                let err = match self.check() {
                    Ok(()) => "none".to_string(),
                    Err(err) => err.to_string(),
                };
                out(&format!("final state: {state} err={err}"));
                out(&format!(
                    "final mapping: {}",
                    self.plan.letter_values(self.mach)
                ));
                self.dump_memory(out);
            }
        }
    }

    fn position(&self) -> Option<usize> {
        match self.phase {
            Phase::Before | Phase::Deferred(_) => Some(self.mach.pi()),
            Phase::After | Phase::Result => Some(self.mach.last_pi()),
        }
    }
}

/// Routes machine events of a plan run to a [`Delivery`], remembering the
/// first machine fault.
struct PlanTracer<'p, 'd, 'r, 'w> {
    plan: &'p OpcodePlan,
    delivery: &'d mut Delivery<'r, 'w>,
    fault: Option<MachineError>,
}

impl Tracer for PlanTracer<'_, '_, '_, '_> {
    fn before(&mut self, id: StateId, mach: &dyn Machine) {
        let view = MachineView::new(self.plan, mach, Phase::Before);
        self.delivery.before(id, &view);
    }

    fn after(&mut self, id: StateId, mach: &dyn Machine) {
        let view = MachineView::new(self.plan, mach, Phase::After);
        self.delivery.after(id, &view);
    }

    fn emit(&mut self, kind: ForkKind, parent: Option<StateId>, child: StateId, mach: &dyn Machine) {
        let view = MachineView::new(self.plan, mach, Phase::Deferred(kind));
        self.delivery.fork(parent, child, &view);
    }

    fn result(&mut self, id: StateId, mach: &dyn Machine) -> bool {
        let view = MachineView::new(self.plan, mach, Phase::Result);
        let stop = self.delivery.result(id, &view);
        match mach.check() {
            Ok(()) | Err(MachineError::NonZeroHalt(_)) => stop,
            Err(err) => {
                log::warn!("machine {id} faulted: {err}");
                self.fault = Some(err);
                true
            }
        }
    }

    fn observes_steps(&self) -> bool {
        self.delivery.is_watched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::io::encode_all;
    use crate::word::solution::solution_mapping;

    const BO: ByteOrder = ByteOrder::Little;

    fn to_go_out() -> Problem {
        Problem::setup("to", "go", "out").unwrap()
    }

    /// Sets every letter to the given values, then exits with `code`.
    fn fixed_program(layout: &Layout, values: &[(u8, u16)], code: u8) -> Vec<u8> {
        let mut ops = Vec::new();
        for &c in layout.letters() {
            let off = layout.value_offset(c).unwrap();
            ops.push(Op::mov(Arg::location(off), Arg::immediate(sentinel(c))));
        }
        for &(c, v) in values {
            let off = layout.value_offset(c).unwrap();
            ops.push(Op::mov(Arg::location(off), Arg::immediate(v)));
        }
        ops.push(set_exit_code_op(code));
        ops.push(Op::halt());
        encode_all(BO, &ops)
    }

    fn plan_with(values: &[(u8, u16)], code: u8, codes: ExitCodes) -> OpcodePlan {
        let problem = to_go_out();
        let layout = Layout::new(&problem).unwrap();
        let program = fixed_program(&layout, values, code);
        OpcodePlan::new(problem, layout, codes, BO, program, None).unwrap()
    }

    fn results(plan: &OpcodePlan) -> Vec<(String, Result<(), SolutionError>)> {
        let mut found = Vec::new();
        let mut res = |sol: &dyn Solution| {
            found.push((solution_mapping(sol), sol.check()));
            false
        };
        plan.run(&mut res).unwrap();
        found
    }

    #[test]
    fn test_exit_codes() {
        let mut codes = ExitCodes::new();
        assert_eq!(codes.code_for(SolutionError::CheckFailed), Ok(EXIT_CHECK_FAILED));
        assert_eq!(
            codes.code_for(VerifyError::Column(None).into()),
            Ok(EXIT_VERIFY_COLUMN)
        );
        let custom = SolutionError::Custom("nope".into());
        assert_eq!(codes.define_error(custom.clone()), Ok(0x80));
        assert_eq!(codes.define_error(custom.clone()), Ok(0x80));
        let labelled: SolutionError = VerifyError::Column(Some("[0]".into())).into();
        assert_eq!(codes.code_for(labelled.clone()), Ok(0x81));
        assert_eq!(codes.custom_len(), 2);

        assert_eq!(codes.error_for(0), Ok(()));
        assert_eq!(codes.error_for(1), Err(SolutionError::AlreadyUsed));
        assert_eq!(codes.error_for(0x80), Err(custom));
        assert_eq!(codes.error_for(0x81), Err(labelled));
        assert_eq!(codes.error_for(0x82), Err(SolutionError::UnknownExitCode(0x82)));
        assert_eq!(codes.error_for(0x42), Err(SolutionError::UnknownExitCode(0x42)));
    }

    #[test]
    fn test_exit_code_overflow() {
        let mut codes = ExitCodes::new();
        for i in 0..128 {
            codes.define_error(SolutionError::Custom(i.to_string())).unwrap();
        }
        assert_eq!(
            codes.define_error(SolutionError::Custom("one more".into())),
            Err(PlanError::ExitCodeOverflow(128))
        );
    }

    #[test]
    fn test_layout() {
        let layout = Layout::new(&to_go_out()).unwrap();
        assert_eq!(layout.letters(), b"gotu");
        assert_eq!(layout.value_offset(b'g'), Some(1));
        assert_eq!(layout.value_offset(b'u'), Some(7));
        assert_eq!(layout.value_offset(b'z'), None);
        assert_eq!(layout.used_offset(), 9);
        assert_eq!(layout.used_offset_of(9), 27);
        assert_eq!(sentinel(b'a'), 0xff9f);
    }

    #[test]
    fn test_letter_value_display() {
        let lv = LetterValue {
            letter: b'e',
            val: sentinel(b'e'),
            known: false,
            valid: true,
        };
        assert_eq!(lv.to_string(), "UNKNOWN(e=ff9b)");
        let lv = LetterValue {
            val: 12,
            known: true,
            valid: false,
            ..lv
        };
        assert_eq!(lv.to_string(), "INVALID(e=000c)");
        let lv = LetterValue { valid: true, ..lv };
        assert_eq!(lv.to_string(), "e=12");
    }

    #[test]
    fn test_run_reads_mapping() {
        let values = [(b'g', 8), (b'o', 1), (b't', 2), (b'u', 0)];
        let plan = plan_with(&values, EXIT_NORMAL, ExitCodes::new());
        assert_eq!(results(&plan), vec![("g:8 o:1 t:2 u:0".to_string(), Ok(()))]);
    }

    #[test]
    fn test_run_maps_exit_codes() {
        let plan = plan_with(&[(b'g', 8)], EXIT_CHECK_FAILED, ExitCodes::new());
        assert_eq!(
            results(&plan),
            vec![("g:8".to_string(), Err(SolutionError::CheckFailed))]
        );

        let mut codes = ExitCodes::new();
        let code = codes.define_error(SolutionError::Custom("odd".into())).unwrap();
        let plan = plan_with(&[], code, codes);
        assert_eq!(
            results(&plan),
            vec![(String::new(), Err(SolutionError::Custom("odd".into())))]
        );
    }

    #[test]
    fn test_run_stops_on_fault() {
        let problem = to_go_out();
        let layout = Layout::new(&problem).unwrap();
        let program = encode_all(
            BO,
            &[
                Op::mov(Arg::register(1), Arg::immediate(0)),
                Op::div(Arg::register(1), Arg::immediate(0)),
                Op::halt(),
            ],
        );
        let plan = OpcodePlan::new(problem, layout, ExitCodes::new(), BO, program, None).unwrap();
        let mut seen = 0;
        let mut res = |_: &dyn Solution| {
            seen += 1;
            false
        };
        assert_eq!(
            plan.run(&mut res).unwrap_err(),
            SearchError::Machine(MachineError::DivideByZero)
        );
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_dump_with_annotations() {
        let problem = to_go_out();
        let layout = Layout::new(&problem).unwrap();
        let program = encode_all(BO, &[set_exit_code_op(0), Op::halt()]);
        let mut annos = Annotations::new();
        annos.insert(7, vec![":finish".to_string()]);
        let plan =
            OpcodePlan::new(problem, layout, ExitCodes::new(), BO, program, Some(annos)).unwrap();
        let mut lines = Vec::new();
        plan.dump(&mut |l| lines.push(l.to_string()));
        assert_eq!(lines, vec!["0000: MOVEL @0000 0", "0007: HALT // :finish"]);
    }
}
