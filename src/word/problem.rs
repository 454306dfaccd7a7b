//! The word-sum problem: three words, their letters, and a base.

use crate::error::SetupError;
use std::collections::BTreeSet;
use std::fmt;

/// Default radix of a problem.
pub const DEFAULT_BASE: u8 = 10;

/// Largest radix the backends can lay out.
pub const MAX_BASE: u8 = 50;

/// A word triple `w1 + w2 = w3` to solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub words: [Vec<u8>; 3],
    pub letters: BTreeSet<u8>,
    pub base: u8,
}

impl Problem {
    /// Sets up the problem for three given words in base 10.
    pub fn setup(w1: &str, w2: &str, w3: &str) -> Result<Self, SetupError> {
        Self::setup_with_base(w1, w2, w3, DEFAULT_BASE)
    }

    /// Sets up the problem for three given words; any error returned
    /// indicates that the words cannot be solved.
    pub fn setup_with_base(w1: &str, w2: &str, w3: &str, base: u8) -> Result<Self, SetupError> {
        if !(2..=MAX_BASE).contains(&base) {
            return Err(SetupError::UnsupportedBase(base));
        }
        for (i, word) in [w1, w2, w3].iter().enumerate() {
            if word.is_empty() {
                return Err(SetupError::EmptyWord(i));
            }
        }

        let arg_width = w1.len().max(w2.len());
        let diff = w3.len() as isize - arg_width as isize;
        if diff != 0 && diff != 1 {
            return Err(SetupError::InvalidResultWidth {
                w1: w1.len(),
                w2: w2.len(),
                w3: w3.len(),
            });
        }

        let words = [
            w1.as_bytes().to_vec(),
            w2.as_bytes().to_vec(),
            w3.as_bytes().to_vec(),
        ];
        let letters: BTreeSet<u8> = words.iter().flatten().copied().collect();
        if letters.len() > base as usize {
            return Err(SetupError::TooManyLetters {
                letters: letters.len(),
                base,
            });
        }

        Ok(Self {
            words,
            letters,
            base,
        })
    }

    /// The distinct letters in ascending byte order.
    pub fn sorted_letters(&self) -> Vec<u8> {
        self.letters.iter().copied().collect()
    }

    pub fn num_columns(&self) -> usize {
        self.words[2].len()
    }

    /// The right-aligned characters of column `k` (0 is leftmost); absent
    /// characters are 0.
    pub fn get_column(&self, k: usize) -> [u8; 3] {
        let w = self.words[2].len() as isize;
        let mut cx = [0u8; 3];
        for (x, word) in self.words[..2].iter().enumerate() {
            let i = word.len() as isize - w + k as isize;
            if i >= 0 {
                cx[x] = word[i as usize];
            }
        }
        cx[2] = self.words[2][k];
        cx
    }

    /// True if `c` starts any of the three words.
    pub fn is_initial_letter(&self, c: u8) -> bool {
        self.words.iter().any(|w| w.first() == Some(&c))
    }

    /// The words as strings.
    pub fn words(&self) -> [String; 3] {
        [
            String::from_utf8_lossy(&self.words[0]).into_owned(),
            String::from_utf8_lossy(&self.words[1]).into_owned(),
            String::from_utf8_lossy(&self.words[2]).into_owned(),
        ]
    }

    /// Product `base * (base - 1) * ...` over the number of letters: the
    /// number of distinct letter assignments.
    pub fn falling_factorial(&self) -> u64 {
        let b = self.base as u64;
        (0..self.letters.len() as u64).fold(1u64, |acc, i| acc.saturating_mul(b - i))
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [w1, w2, w3] = self.words();
        write!(f, "{w1} + {w2} = {w3}")
    }
}
