//! Error types for problem setup, planning, and search.
//!
//! Errors fall into a few families:
//!
//! - [`SetupError`]: the three words do not describe a solvable problem.
//! - [`PlanError`]: a strategy or backend could not produce a runnable plan.
//!   These are bugs or unsupported shapes, never normal outcomes.
//! - [`SolutionError`]: the terminal error of one finished search state.
//!   These are normal: most states of a search end in one of them, and only
//!   states whose `check()` returns `Ok(())` are solutions.
//! - [`SearchError`]: the search engine itself had to stop early.

use thiserror::Error;

fn letter_char(c: &u8) -> char {
    char::from(*c)
}

fn label_suffix(label: &Option<String>) -> String {
    label
        .as_ref()
        .map(|l| format!(" ({l})"))
        .unwrap_or_default()
}

/// Errors returned by [`Problem::setup`](crate::word::Problem::setup).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// The result word must be as wide as the widest argument, or one wider.
    #[error("invalid result width {w3}, must be equal to or only one greater than the widest argument ({w1}, {w2})")]
    InvalidResultWidth { w1: usize, w2: usize, w3: usize },

    /// More distinct letters than digits in the base.
    #[error("too many letters: {letters} distinct letters do not fit in base {base}")]
    TooManyLetters { letters: usize, base: u8 },

    /// Bases outside 2..=50 cannot be planned.
    #[error("unsupported base {0}")]
    UnsupportedBase(u8),

    /// Every word needs at least one letter.
    #[error("word {0} is empty")]
    EmptyWord(usize),
}

impl SetupError {
    /// Stable short code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            SetupError::InvalidResultWidth { .. } => "S001",
            SetupError::TooManyLetters { .. } => "S002",
            SetupError::UnsupportedBase(_) => "S003",
            SetupError::EmptyWord(_) => "S004",
        }
    }

    /// Optional hint for the user.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            SetupError::InvalidResultWidth { .. } => {
                Some("the sum of two N digit numbers has N or N + 1 digits")
            }
            SetupError::TooManyLetters { .. } => {
                Some("each letter needs its own digit; use fewer distinct letters")
            }
            _ => None,
        }
    }
}

/// Errors raised while planning or compiling a runnable plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Every digit in the letter's range is already taken by a fixed letter.
    #[error("no choices possible for letter {}", letter_char(.letter))]
    NoChoices { letter: u8 },

    /// A strategy could not find a way to solve a column.
    #[error("cannot solve column {column}")]
    UnsolvableColumn { column: String },

    /// The top down strategy could not plan every path.
    #[error("unable to plan top down")]
    TopDownFailed,

    /// A column reached an impossible planning state.
    #[error("invalid column state: {column}")]
    InvalidColumnState { column: String },

    /// A carry is needed before it can be computed.
    #[error("unable to compute carry for column {column}")]
    UnresolvedCarry { column: usize },

    /// `finish` was called twice on the same generator.
    #[error("generator already finished")]
    DoubleFinish,

    /// A forked parent emitted code while its alternate was still open.
    #[error("forked parent wrote {written} bytes before the alternate finished")]
    ForkedParentWritten { written: usize },

    /// The final carry was a non-zero constant by construction.
    #[error("broken final carry constant {0}")]
    BrokenFinalCarry(i32),

    /// A composed generator did not produce any runnable plan.
    #[error("no concrete plan produced")]
    NoConcretePlan,

    /// A composed generator produced more than one runnable plan.
    #[error("more than one concrete plan")]
    MultipleConcretePlans,

    /// The opcode memory layout cannot hold this many letters or digits.
    #[error("memory layout overflow: {letters} letters in base {base} (at most 50 each)")]
    LayoutOverflow { letters: usize, base: u8 },

    /// Macro expansion produced steps at an unexpected address.
    #[error("expansion mismatch at step {addr}: off by {off_by}")]
    ExpansionMismatch { addr: usize, off_by: isize },

    /// A step references a label that was never defined.
    #[error("unresolved label {0:?}")]
    UnresolvedLabel(String),

    /// A compiled jump or fork leads outside the program.
    #[error("step {addr} targets {target}, outside the program")]
    InvalidTarget { addr: usize, target: isize },

    /// A macro step survived compilation.
    #[error("unexpanded macro step at {0}")]
    UnexpandedMacro(usize),

    /// A letter that is not part of the problem reached the code generator.
    #[error("letter {} is not part of the problem", letter_char(.0))]
    UnknownLetter(u8),

    /// More custom exit codes than fit beside the builtin ones.
    #[error("more than {0} custom exit codes")]
    ExitCodeOverflow(usize),

    /// Only a root generator can produce a runnable plan.
    #[error("cannot finalize a forked generator")]
    FinalizeFork,

    /// The opcode assembler failed.
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    /// The assembled program failed to load.
    #[error("load failed: {0}")]
    Load(#[from] MachineError),
}

/// Errors that fail the final verification of a solution mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("verify failed: initial letter cannot be zero")]
    InitialLetters,

    #[error("verify failed: duplicate valued character")]
    DuplicateLetters,

    #[error("verify failed: negative valued character")]
    NegativeValue,

    /// A column addition does not hold; carries the column label when known.
    #[error("verify failed: column addition failed{}", label_suffix(.0))]
    Column(Option<String>),

    #[error("verify failed: final carry must be 0")]
    FinalCarry,
}

/// Errors of the tiny register machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("invalid program index")]
    InvalidPi,

    #[error("machine not halted")]
    NotHalted,

    #[error("op count limit exceeded ({count} >= {limit})")]
    OpLimitExceeded { count: u16, limit: u16 },

    #[error("op count limit can only be lowered")]
    OpLimitRaised,

    #[error("non-zero halt code {0:#04x}")]
    NonZeroHalt(u8),

    #[error("segmentation fault at {addr:#06x}")]
    Segfault { addr: usize },

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("null register access")]
    NullRegister,

    #[error("division by zero")]
    DivideByZero,

    #[error(transparent)]
    InvalidOp(#[from] OpError),

    #[error("program too long: {0} bytes")]
    ProgramTooLong(usize),
}

/// An op that does not pass validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid op {op}: {desc}")]
pub struct OpError {
    pub op: String,
    pub desc: String,
}

impl OpError {
    pub fn new(op: impl ToString, desc: impl Into<String>) -> Self {
        Self {
            op: op.to_string(),
            desc: desc.into(),
        }
    }
}

/// Errors raised by the opcode assembler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("program would exceed {limit} bytes (needs {len})")]
    Overflow { len: usize, limit: usize },

    #[error("op has no immediate argument to patch")]
    NoImmediate,

    #[error("offset {0} does not fit in 16 bits")]
    OffsetOutOfRange(isize),

    #[error("cannot encode invalid op: {0}")]
    Invalid(#[from] OpError),
}

/// The terminal error of a finished search state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolutionError {
    #[error("solution not complete")]
    NotDone,

    #[error("value already used")]
    AlreadyUsed,

    #[error("check failed")]
    CheckFailed,

    #[error("no choices left")]
    NoChoices,

    #[error("dead fork")]
    DeadFork,

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("machine error: {0}")]
    Machine(#[from] MachineError),

    #[error("unresolved label {0:?}")]
    UnresolvedLabel(String),

    #[error("unexpanded macro step {0}")]
    UnexpandedMacro(String),

    #[error("unknown exit code {0:#04x}")]
    UnknownExitCode(u8),

    #[error("{0}")]
    Custom(String),
}

impl SolutionError {
    /// True for failures of the final verification pass.
    pub fn is_verify(&self) -> bool {
        matches!(self, SolutionError::Verify(_))
    }
}

/// Errors that stop a search run before the frontier is drained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("step budget exhausted after {steps} steps (limit {limit})")]
    BudgetExhausted { steps: u64, limit: u64 },

    #[error("machine fault: {0}")]
    Machine(#[from] MachineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_codes() {
        let err = SetupError::InvalidResultWidth { w1: 4, w2: 4, w3: 6 };
        assert_eq!(err.code(), "S001");
        assert!(err.help().is_some());
        assert!(err.to_string().contains("invalid result width"));
        assert_eq!(SetupError::UnsupportedBase(99).help(), None);
    }

    #[test]
    fn test_verify_column_label() {
        assert_eq!(
            VerifyError::Column(None).to_string(),
            "verify failed: column addition failed"
        );
        let labelled = VerifyError::Column(Some("col".to_string()));
        assert_eq!(
            labelled.to_string(),
            "verify failed: column addition failed (col)"
        );
    }

    #[test]
    fn test_solution_error_from_verify() {
        let err: SolutionError = VerifyError::FinalCarry.into();
        assert!(err.is_verify());
        assert!(!SolutionError::AlreadyUsed.is_verify());
    }

    #[test]
    fn test_op_error_display() {
        let err = OpError::new("MOVE $0001 %1", "destination cannot be an immediate");
        assert_eq!(
            err.to_string(),
            "invalid op MOVE $0001 %1: destination cannot be an immediate"
        );
    }
}
