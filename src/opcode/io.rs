//! Byte encoding of ops.
//!
//! An op encodes as its code byte, then (for each argument up to its
//! arity) one argument code byte, then the 16 bit immediates of any
//! immediate arguments in argument order.

use std::fmt;
use std::str::FromStr;

use crate::error::OpError;
use crate::opcode::code::{ArgCode, OpCode};
use crate::opcode::op::Op;

/// Byte order of encoded immediates and of 16 bit machine memory cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// The host's byte order.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn to_bytes(self, v: u16) -> [u8; 2] {
        match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        }
    }

    pub fn from_bytes(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Big => u16::from_be_bytes(b),
            ByteOrder::Little => u16::from_le_bytes(b),
        }
    }

    /// Reads a value at `i`; `None` if fewer than two bytes remain.
    pub fn get_u16(self, buf: &[u8], i: usize) -> Option<u16> {
        let b = buf.get(i..i.checked_add(2)?)?;
        Some(self.from_bytes([b[0], b[1]]))
    }

    /// Writes a value at `i`; false if fewer than two bytes remain.
    pub fn put_u16(self, buf: &mut [u8], i: usize, v: u16) -> bool {
        match i.checked_add(2).and_then(|j| buf.get_mut(i..j)) {
            Some(b) => {
                b.copy_from_slice(&self.to_bytes(v));
                true
            }
            None => false,
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Big => write!(f, "big"),
            ByteOrder::Little => write!(f, "little"),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "big" | "be" => Ok(ByteOrder::Big),
            "little" | "le" => Ok(ByteOrder::Little),
            "native" => Ok(ByteOrder::native()),
            _ => Err(format!(
                "Unknown byte order: '{}'. Valid options: big, little, native",
                s
            )),
        }
    }
}

impl Op {
    /// How many bytes the op encodes to.
    pub fn encoded_size(&self) -> usize {
        let mut size = 1;
        let arity = self.code.arity();
        if arity > 0 {
            size += 1;
            if self.arg1.code.is_immediate() {
                size += 2;
            }
            if arity > 1 {
                size += 1;
                if self.arg2.code.is_immediate() {
                    size += 2;
                }
            }
        }
        size
    }

    /// Appends the encoded op to `buf`.
    pub fn encode(&self, bo: ByteOrder, buf: &mut Vec<u8>) {
        buf.push(self.code.0);
        let arity = self.code.arity();
        if arity == 0 {
            return;
        }
        buf.push(self.arg1.code.0);
        if arity > 1 {
            buf.push(self.arg2.code.0);
        }
        if self.arg1.code.is_immediate() {
            buf.extend_from_slice(&bo.to_bytes(self.arg1.val));
        }
        if arity > 1 && self.arg2.code.is_immediate() {
            buf.extend_from_slice(&bo.to_bytes(self.arg2.val));
        }
    }
}

fn truncated(i: usize) -> OpError {
    OpError::new(format!("@{i:04x}"), "truncated operation")
}

/// Decodes the op at `i`, returning it and the index after it.
pub fn decode_op(bo: ByteOrder, buf: &[u8], i: usize) -> Result<(Op, usize), OpError> {
    let byte = |j: usize| buf.get(j).copied().ok_or_else(|| truncated(i));
    let word = |j: usize| bo.get_u16(buf, j).ok_or_else(|| truncated(i));

    let mut op = Op {
        code: OpCode(byte(i)?),
        ..Op::default()
    };
    let mut j = i + 1;
    let arity = op.code.arity();
    if arity > 0 {
        op.arg1.code = ArgCode(byte(j)?);
        j += 1;
    }
    if arity > 1 {
        op.arg2.code = ArgCode(byte(j)?);
        j += 1;
    }
    for arg in [&mut op.arg1, &mut op.arg2] {
        if arg.code.is_immediate() {
            arg.val = word(j)?;
            j += 2;
        }
    }
    Ok((op, j))
}

/// Decodes a whole program into `(offset, op)` pairs.
pub fn decode_all(bo: ByteOrder, buf: &[u8]) -> Result<Vec<(usize, Op)>, OpError> {
    let mut ops = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        let (op, j) = decode_op(bo, buf, i)?;
        ops.push((i, op));
        i = j;
    }
    Ok(ops)
}

/// Encodes a sequence of ops back to back.
pub fn encode_all(bo: ByteOrder, ops: &[Op]) -> Vec<u8> {
    let mut buf = Vec::new();
    for op in ops {
        op.encode(bo, &mut buf);
    }
    buf
}
