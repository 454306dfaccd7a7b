//! The step instruction set.
//!
//! Steps come in three kinds:
//!
//! - primitive steps the interpreter runs directly
//! - label-carrying steps (`Label`, `LabelJmp`, ...) that [`compile`]
//!   resolves into absolute addresses
//! - macro steps (`Range`, `Finish`, `ForkAlt`) that [`compile`] expands
//!   into primitive steps
//!
//! Comparisons on any register, and `used?` lookups, write their 0/1
//! result to `ra`. Arithmetic writes to the register it names.
//!
//! [`compile`]: crate::runnable::compile

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::SolutionError;

/// One of the three step registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    A,
    B,
    C,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::A => write!(f, "ra"),
            Reg::B => write!(f, "rb"),
            Reg::C => write!(f, "rc"),
        }
    }
}

/// Comparison of a register against a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmp {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
}

impl Cmp {
    pub fn test(self, a: i32, b: i32) -> bool {
        match self {
            Cmp::Lt => a < b,
            Cmp::Lte => a <= b,
            Cmp::Eq => a == b,
            Cmp::Gte => a >= b,
            Cmp::Gt => a > b,
        }
    }
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cmp::Lt => write!(f, "lt"),
            Cmp::Lte => write!(f, "lte"),
            Cmp::Eq => write!(f, "eq"),
            Cmp::Gte => write!(f, "gte"),
            Cmp::Gt => write!(f, "gt"),
        }
    }
}

/// An alternate path of execution embedded in its parent's step list.
///
/// Expands to a fork over the alternate steps followed by a dead fork
/// exit; the continuation label lands right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkAlt {
    pub name: String,
    pub alt_label: String,
    pub cont_label: String,
    /// Shared with the generator still writing the alternate path.
    pub steps: Rc<RefCell<Vec<Step>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `dst = src`
    Move { dst: Reg, src: Reg },
    /// `reg = value`
    Set(Reg, i32),
    /// `ra = reg <cmp> value`
    Compare(Cmp, Reg, i32),
    Neg(Reg),
    AddReg(Reg, Reg),
    SubReg(Reg, Reg),
    /// `reg += values[letter]`
    AddValue(Reg, u8),
    SubValue(Reg, u8),
    Add(Reg, i32),
    Sub(Reg, i32),
    /// Floor modulus by a positive constant.
    Mod(Reg, i32),
    /// Floor division by a positive constant.
    Div(Reg, i32),
    Exit(Option<SolutionError>),
    /// `ra = used[reg]`
    Used(Reg),
    /// `values[letter] = reg; used[reg] = true`
    Store(u8, Reg),
    Load(Reg, u8),

    Jmp(usize),
    Jz(usize),
    Jnz(usize),
    RelJmp(isize),
    RelJz(isize),
    RelJnz(isize),
    /// Child starts at the target; this state continues.
    Fork(usize),
    RelFork(isize),
    /// Child continues here; this state moves to the target.
    Branch(usize),
    RelBranch(isize),
    /// Conditional fork/branch on `ra == 0` or `ra != 0`.
    RelFz(isize),
    RelFnz(isize),
    RelBz(isize),
    RelBnz(isize),
    /// `rb += 1; if rb < max { jump by offset }`
    LoopB { offset: isize, max: i32 },

    Label(String),
    LabelJmp(String),
    LabelJz(String),
    LabelJnz(String),
    LabelFork(String),
    LabelBranch(String),

    /// Normal exit, labelled.
    Finish(String),
    /// Try every unused digit in `[min, max]` with `rb`.
    Range { label: String, min: i32, max: i32 },
    ForkAlt(Rc<ForkAlt>),
}

/// Steps emitted for `Range { min, max }`.
pub fn range_len(min: i32, max: i32) -> usize {
    if min < max {
        7
    } else {
        4
    }
}

impl Step {
    /// The label a step defines at its own address, if any.
    pub fn label_name(&self) -> Option<&str> {
        match self {
            Step::Label(name) | Step::Finish(name) => Some(name.as_str()),
            Step::Range { label, .. } => Some(label.as_str()),
            Step::ForkAlt(alt) => Some(alt.name.as_str()),
            _ => None,
        }
    }

    /// The label a step jumps to that is still unresolved.
    pub fn label_target(&self) -> Option<&str> {
        match self {
            Step::LabelJmp(l)
            | Step::LabelJz(l)
            | Step::LabelJnz(l)
            | Step::LabelFork(l)
            | Step::LabelBranch(l) => Some(l.as_str()),
            _ => None,
        }
    }

    pub fn is_macro(&self) -> bool {
        matches!(
            self,
            Step::Label(_) | Step::Finish(_) | Step::Range { .. } | Step::ForkAlt(_)
        )
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Step::Store(..))
    }

    /// Number of steps this step turns into once expanded.
    pub fn expanded_len(&self) -> usize {
        match self {
            Step::Label(_) => 0,
            Step::Finish(_) => 1,
            Step::Range { min, max, .. } => range_len(*min, *max),
            Step::ForkAlt(alt) => {
                2 + alt
                    .steps
                    .borrow()
                    .iter()
                    .map(Step::expanded_len)
                    .sum::<usize>()
            }
            _ => 1,
        }
    }

    /// Annotation describing where a label-carrying jump goes.
    pub fn annotation(&self) -> Option<String> {
        match self {
            Step::LabelJmp(l) => Some(format!("-> :{l}")),
            Step::LabelJz(l) | Step::LabelJnz(l) => Some(format!("?-> :{l}")),
            Step::LabelFork(l) => Some(format!("*-> :{l}")),
            Step::LabelBranch(l) => Some(format!("/-> :{l}")),
            _ => None,
        }
    }

    /// The absolute form of a label-carrying jump.
    pub fn resolved(&self, addr: usize) -> Option<Step> {
        match self {
            Step::LabelJmp(_) => Some(Step::Jmp(addr)),
            Step::LabelJz(_) => Some(Step::Jz(addr)),
            Step::LabelJnz(_) => Some(Step::Jnz(addr)),
            Step::LabelFork(_) => Some(Step::Fork(addr)),
            Step::LabelBranch(_) => Some(Step::Branch(addr)),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Move { dst, src } => write!(f, "{dst} = {src}"),
            Step::Set(r, v) => write!(f, "{r} = {v}"),
            Step::Compare(cmp, r, v) => write!(f, "{cmp} {r}, {v}"),
            Step::Neg(r) => write!(f, "negate {r}"),
            Step::AddReg(r, s) => write!(f, "add {r}, {s}"),
            Step::SubReg(r, s) => write!(f, "sub {r}, {s}"),
            Step::AddValue(r, c) => write!(f, "add {r}, ${}", char::from(*c)),
            Step::SubValue(r, c) => write!(f, "sub {r}, ${}", char::from(*c)),
            Step::Add(r, v) => write!(f, "add {r}, {v:+}"),
            Step::Sub(r, v) => write!(f, "sub {r}, {v:+}"),
            Step::Mod(r, v) => write!(f, "mod {r}, {v}"),
            Step::Div(r, v) => write!(f, "div {r}, {v}"),
            Step::Exit(None) => write!(f, "exit"),
            Step::Exit(Some(err)) => write!(f, "exit({err})"),
            Step::Used(r) => write!(f, "used? {r}"),
            Step::Store(c, r) => write!(f, "store {}, {r}", char::from(*c)),
            Step::Load(r, c) => write!(f, "load {r}, {}", char::from(*c)),
            Step::Jmp(a) => write!(f, "jmp @{a}"),
            Step::Jz(a) => write!(f, "jz @{a}"),
            Step::Jnz(a) => write!(f, "jnz @{a}"),
            Step::RelJmp(o) => write!(f, "jmp {o:+}"),
            Step::RelJz(o) => write!(f, "jz {o:+}"),
            Step::RelJnz(o) => write!(f, "jnz {o:+}"),
            Step::Fork(a) => write!(f, "fork @{a}"),
            Step::RelFork(o) => write!(f, "fork {o:+}"),
            Step::Branch(a) => write!(f, "branch @{a}"),
            Step::RelBranch(o) => write!(f, "branch {o:+}"),
            Step::RelFz(o) => write!(f, "fz {o:+}"),
            Step::RelFnz(o) => write!(f, "fnz {o:+}"),
            Step::RelBz(o) => write!(f, "bz {o:+}"),
            Step::RelBnz(o) => write!(f, "bnz {o:+}"),
            Step::LoopB { offset, max } => write!(f, "loop {offset:+} rb < {max}"),
            Step::Label(name) => write!(f, ":{name}"),
            Step::LabelJmp(l) => write!(f, "jmp :{l}"),
            Step::LabelJz(l) => write!(f, "jz :{l}"),
            Step::LabelJnz(l) => write!(f, "jnz :{l}"),
            Step::LabelFork(l) => write!(f, "fork :{l}"),
            Step::LabelBranch(l) => write!(f, "branch :{l}"),
            Step::Finish(name) => write!(f, "HALT :{name}"),
            Step::Range { label, min, max } if label.is_empty() => {
                write!(f, "range [{min}, {max}]")
            }
            Step::Range { label, min, max } => write!(f, ":{label} range [{min}, {max}]"),
            Step::ForkAlt(alt) if alt.name.is_empty() => write!(f, "forkAlt UNNAMED"),
            Step::ForkAlt(alt) => write!(f, "forkAlt :{}", alt.name),
        }
    }
}
