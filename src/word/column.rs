//! Per-column planning state.

use std::fmt;

/// What the planner knows about the carry into a column from its prior
/// (right hand) neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Carry {
    #[default]
    Unknown,
    /// Fixed to 0.
    Zero,
    /// Fixed to 1.
    One,
    /// Will be computed at run time by already generated code.
    Computed,
}

impl Carry {
    /// Single character description of the carry.
    pub fn expr(self) -> &'static str {
        match self {
            Carry::Unknown => "?",
            Carry::Zero => "0",
            Carry::One => "1",
            Carry::Computed => "C",
        }
    }

    /// The fixed carry digit, if any.
    pub fn fixed(self) -> Option<u8> {
        match self {
            Carry::Zero => Some(0),
            Carry::One => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for Carry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr())
    }
}

/// One column of the sum, 0 being the leftmost.
///
/// `carry` is the carry *out* of this column into its more significant
/// neighbour; column 0 therefore starts out as `Carry::Zero`. `prior` is
/// the less significant neighbour to the right, whose carry flows in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub index: usize,
    pub prior: Option<usize>,
    pub chars: [u8; 3],
    pub have: u8,
    pub known: u8,
    pub unknown: u8,
    pub fixed: u8,
    pub solved: bool,
    pub carry: Carry,
}

impl Column {
    pub(crate) fn new(index: usize, chars: [u8; 3], prior: Option<usize>) -> Self {
        let [a, b, c] = chars;
        let mut have = 0;
        let mut unknown = 0;
        if a != 0 {
            have += 1;
            unknown += 1;
        }
        if b != 0 {
            have += 1;
            if b != a {
                unknown += 1;
            }
        }
        if c != 0 {
            have += 1;
            if c != a && c != b {
                unknown += 1;
            }
        }
        Self {
            index,
            prior,
            chars,
            have,
            known: 0,
            unknown,
            fixed: 0,
            solved: false,
            carry: if index == 0 { Carry::Zero } else { Carry::Unknown },
        }
    }

    /// The distinct, present characters of the column in order.
    pub fn distinct_chars(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::with_capacity(3);
        for &c in &self.chars {
            if c != 0 && !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }

    /// A short human readable description like `[1] s + m = o carry:?`.
    pub fn label(&self) -> String {
        let ch = |c: u8| if c == 0 { '_' } else { char::from(c) };
        let [a, b, c] = self.chars;
        format!(
            "[{}] {} + {} = {} carry:{}",
            self.index,
            ch(a),
            ch(b),
            ch(c),
            self.carry.expr()
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
