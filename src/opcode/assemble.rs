//! Append-only assembler with patchable references to immediate arguments.

use crate::error::AssembleError;
use crate::opcode::io::{decode_op, ByteOrder};
use crate::opcode::op::Op;

/// Largest program the tiny machine accepts.
pub const MAX_PROGRAM_SIZE: usize = 0xffff;

/// Builds a buffer of encoded ops.
#[derive(Debug, Clone)]
pub struct Assembler {
    buf: Vec<u8>,
    bo: ByteOrder,
    op_count: usize,
}

/// Location of an assembled op, so that its immediate arguments can be
/// filled in once later code exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ref {
    offset: usize,
    arg1: Option<usize>,
    arg2: Option<usize>,
    end: usize,
}

impl Ref {
    /// Offset of the referenced op.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset just after the referenced op.
    pub fn end_offset(&self) -> usize {
        self.end
    }

    /// Offset of the immediate value of arg1, if it has one.
    pub fn arg1_offset(&self) -> Option<usize> {
        self.arg1
    }

    pub fn arg2_offset(&self) -> Option<usize> {
        self.arg2
    }

    pub fn write_value1(&self, asm: &mut Assembler, val: u16) -> Result<(), AssembleError> {
        let at = self.arg1.ok_or(AssembleError::NoImmediate)?;
        asm.patch(at, val)
    }

    pub fn write_value2(&self, asm: &mut Assembler, val: u16) -> Result<(), AssembleError> {
        let at = self.arg2.ok_or(AssembleError::NoImmediate)?;
        asm.patch(at, val)
    }

    /// Writes arg1 as the signed distance from the end of the op to
    /// `target`.
    pub fn write_offset(&self, asm: &mut Assembler, target: usize) -> Result<(), AssembleError> {
        let delta = target as isize - self.end as isize;
        let delta = i16::try_from(delta).map_err(|_| AssembleError::OffsetOutOfRange(delta))?;
        self.write_value1(asm, delta as u16)
    }

    /// `@0012 JUMP +0004`
    pub fn describe(&self, asm: &Assembler) -> String {
        match decode_op(asm.bo, &asm.buf, self.offset) {
            Ok((op, _)) => format!("@{:04x} {}", self.offset, op),
            Err(err) => format!("@{:04x} {}", self.offset, err),
        }
    }
}

impl Assembler {
    pub fn new(bo: ByteOrder) -> Self {
        Self::with_capacity(bo, 4096)
    }

    pub fn with_capacity(bo: ByteOrder, n: usize) -> Self {
        Self {
            buf: Vec::with_capacity(n.min(MAX_PROGRAM_SIZE)),
            bo,
            op_count: 0,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.bo
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of ops written so far.
    pub fn op_count(&self) -> usize {
        self.op_count
    }

    /// Encodes `op` at the end of the buffer, returning the new length.
    pub fn write_op(&mut self, op: Op) -> Result<usize, AssembleError> {
        op.validate()?;
        let len = self.buf.len() + op.encoded_size();
        if len > MAX_PROGRAM_SIZE {
            return Err(AssembleError::Overflow {
                len,
                limit: MAX_PROGRAM_SIZE,
            });
        }
        op.encode(self.bo, &mut self.buf);
        self.op_count += 1;
        Ok(self.buf.len())
    }

    /// Encodes `op` and returns a reference to patch its immediates later;
    /// the op must have at least one immediate argument.
    pub fn write_op_ref(&mut self, op: Op) -> Result<Ref, AssembleError> {
        let (imm1, imm2) = (op.arg1.code.is_immediate(), op.arg2.code.is_immediate());
        if !imm1 && !imm2 {
            return Err(AssembleError::NoImmediate);
        }
        let offset = self.buf.len();
        let end = self.write_op(op)?;
        let (arg1, arg2) = match (imm1, imm2) {
            (true, true) => (Some(end - 4), Some(end - 2)),
            (true, false) => (Some(end - 2), None),
            _ => (None, Some(end - 2)),
        };
        Ok(Ref {
            offset,
            arg1,
            arg2,
            end,
        })
    }

    fn patch(&mut self, at: usize, val: u16) -> Result<(), AssembleError> {
        if self.bo.put_u16(&mut self.buf, at, val) {
            Ok(())
        } else {
            Err(AssembleError::NoImmediate)
        }
    }

    /// Prints each op as `offset: op`.
    pub fn dump(&self, out: &mut dyn FnMut(&str)) {
        let mut i = 0;
        while i < self.buf.len() {
            match decode_op(self.bo, &self.buf, i) {
                Ok((op, j)) => {
                    out(&format!("{i:04x}: {op}"));
                    i = j;
                }
                Err(err) => {
                    out(&format!("{i:04x}: {err}"));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::op::Arg;

    #[test]
    fn test_write_op_counts() {
        let mut asm = Assembler::new(ByteOrder::Little);
        assert!(asm.is_empty());
        assert_eq!(asm.write_op(Op::halt()).unwrap(), 1);
        assert_eq!(asm.write_op(Op::jump(2)).unwrap(), 5);
        assert_eq!(asm.op_count(), 2);
        assert_eq!(asm.bytes(), &[0x00, 0x06, 0x80, 0x02, 0x00]);
    }

    #[test]
    fn test_write_op_rejects_invalid() {
        let mut asm = Assembler::new(ByteOrder::Little);
        let op = Op::mov(Arg::immediate(1), Arg::immediate(2));
        assert!(matches!(asm.write_op(op), Err(AssembleError::Invalid(_))));
        assert!(asm.is_empty());
    }

    #[test]
    fn test_ref_offsets() {
        let mut asm = Assembler::new(ByteOrder::Big);
        asm.write_op(Op::halt()).unwrap();
        let r = asm
            .write_op_ref(Op::eq(Arg::location(3), Arg::immediate(0)))
            .unwrap();
        assert_eq!(r.offset(), 1);
        assert_eq!(r.end_offset(), 8);
        assert_eq!(r.arg1_offset(), Some(4));
        assert_eq!(r.arg2_offset(), Some(6));

        r.write_value2(&mut asm, 0x0102).unwrap();
        assert_eq!(&asm.bytes()[6..8], &[0x01, 0x02]);
        assert_eq!(r.describe(&asm), "@0001 EQ @0003 258");

        assert_eq!(
            asm.write_op_ref(Op::halt()),
            Err(AssembleError::NoImmediate)
        );
    }

    #[test]
    fn test_write_offset_backwards() {
        let mut asm = Assembler::new(ByteOrder::Little);
        asm.write_op(Op::mov(Arg::register(1), Arg::immediate(0)))
            .unwrap();
        let r = asm.write_op_ref(Op::jump(0)).unwrap();
        r.write_offset(&mut asm, 0).unwrap();
        let mut lines = Vec::new();
        asm.dump(&mut |l| lines.push(l.to_string()));
        assert_eq!(lines, vec!["0000: MOVE %1 0", "0005: JUMP -0009"]);
    }

    #[test]
    fn test_write_offset_out_of_range() {
        let mut asm = Assembler::new(ByteOrder::Little);
        let r = asm.write_op_ref(Op::fork(0)).unwrap();
        assert_eq!(
            r.write_offset(&mut asm, 40_000),
            Err(AssembleError::OffsetOutOfRange(40_000 - 4))
        );
    }
}
