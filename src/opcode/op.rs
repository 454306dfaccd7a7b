//! Machine instructions and their operands.

use std::fmt;

use crate::opcode::code::{ArgCode, OpCode};

/// An operand: an argument code plus an immediate value (if flagged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Arg {
    pub code: ArgCode,
    pub val: u16,
}

impl Arg {
    /// "No argument".
    pub const NONE: Arg = Arg {
        code: ArgCode::NONE,
        val: 0,
    };

    /// A numbered register.
    pub fn register(reg: u8) -> Self {
        Self {
            code: ArgCode(reg & ArgCode::REG_MASK),
            val: 0,
        }
    }

    pub fn immediate(val: u16) -> Self {
        Self {
            code: ArgCode(ArgCode::IMM),
            val,
        }
    }

    /// The memory location held in a register.
    pub fn indirect(reg: u8) -> Self {
        Self {
            code: ArgCode(ArgCode::IND | (reg & ArgCode::REG_MASK)),
            val: 0,
        }
    }

    /// A fixed memory location.
    pub fn location(addr: u16) -> Self {
        Self {
            code: ArgCode(ArgCode::IMM | ArgCode::IND),
            val: addr,
        }
    }

    /// The memory location `addr` plus the value of a register.
    pub fn indexed(addr: u16, reg: u8) -> Self {
        Self {
            code: ArgCode(ArgCode::IMM | ArgCode::IND | (reg & ArgCode::REG_MASK)),
            val: addr,
        }
    }

    pub fn is_none(&self) -> bool {
        self.code == ArgCode::NONE
    }

    /// Register number for plain register arguments, 0 otherwise.
    pub fn as_register(&self) -> u8 {
        if self.code.is_immediate() || self.code.is_indirect() {
            0
        } else {
            self.code.register()
        }
    }
}

/// One machine instruction with up to two operands.
///
/// The zero value is `HALT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Op {
    pub code: OpCode,
    pub arg1: Arg,
    pub arg2: Arg,
}

impl Op {
    pub fn new(code: OpCode, arg1: Arg, arg2: Arg) -> Self {
        Self { code, arg1, arg2 }
    }

    fn unary(code: OpCode, arg1: Arg) -> Self {
        Self::new(code, arg1, Arg::NONE)
    }

    fn offset(code: OpCode, offset: i16) -> Self {
        Self::unary(code, Arg::immediate(offset as u16))
    }

    pub fn halt() -> Self {
        Self::default()
    }

    pub fn op_lim(limit: u16) -> Self {
        Self::unary(OpCode::OPLIM, Arg::immediate(limit))
    }

    pub fn mov(dst: Arg, src: Arg) -> Self {
        Self::new(OpCode::MOVE, dst, src)
    }

    pub fn movl(dst: Arg, src: Arg) -> Self {
        Self::new(OpCode::MOVEL, dst, src)
    }

    pub fn movh(dst: Arg, src: Arg) -> Self {
        Self::new(OpCode::MOVEH, dst, src)
    }

    pub fn swap(a: u8, b: u8) -> Self {
        Self::new(OpCode::SWAP, Arg::register(a), Arg::register(b))
    }

    pub fn jump(offset: i16) -> Self {
        Self::offset(OpCode::JUMP, offset)
    }

    pub fn jumpf(offset: i16) -> Self {
        Self::offset(OpCode::JUMPF, offset)
    }

    pub fn jumpt(offset: i16) -> Self {
        Self::offset(OpCode::JUMPT, offset)
    }

    pub fn fork(offset: i16) -> Self {
        Self::offset(OpCode::FORK, offset)
    }

    pub fn forkf(offset: i16) -> Self {
        Self::offset(OpCode::FORKF, offset)
    }

    pub fn forkt(offset: i16) -> Self {
        Self::offset(OpCode::FORKT, offset)
    }

    pub fn branch(offset: i16) -> Self {
        Self::offset(OpCode::BRANCH, offset)
    }

    pub fn branchf(offset: i16) -> Self {
        Self::offset(OpCode::BRANCHF, offset)
    }

    pub fn brancht(offset: i16) -> Self {
        Self::offset(OpCode::BRANCHT, offset)
    }

    pub fn lt(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::LT, a, b)
    }

    pub fn lte(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::LTE, a, b)
    }

    pub fn eq(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::EQ, a, b)
    }

    pub fn gte(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::GTE, a, b)
    }

    pub fn gt(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::GT, a, b)
    }

    pub fn neg(a: Arg) -> Self {
        Self::unary(OpCode::NEG, a)
    }

    pub fn sub(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::SUB, a, b)
    }

    pub fn add(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::ADD, a, b)
    }

    pub fn mul(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::MUL, a, b)
    }

    pub fn div(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::DIV, a, b)
    }

    pub fn modulo(a: Arg, b: Arg) -> Self {
        Self::new(OpCode::MOD, a, b)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.code
                .format(self.arg1.code, self.arg2.code, self.arg1.val, self.arg2.val)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halt_is_zero_value() {
        assert_eq!(Op::halt(), Op::default());
        assert_eq!(Op::halt().to_string(), "HALT");
    }

    #[test]
    fn test_op_display() {
        assert_eq!(Op::jump(0).to_string(), "JUMP +0000");
        assert_eq!(Op::jumpt(-18).to_string(), "JUMPT -0012");
        assert_eq!(
            Op::mov(Arg::location(0x2a), Arg::register(1)).to_string(),
            "MOVE @002a %1"
        );
        assert_eq!(
            Op::mov(Arg::location(0x20), Arg::NONE).to_string(),
            "MOVE @0020 MISSING($value)"
        );
        assert_eq!(
            Op::eq(Arg::indexed(0x20, 2), Arg::immediate(0)).to_string(),
            "EQ @(0020 + %2) 0"
        );
        assert_eq!(Op::op_lim(100).to_string(), "OPLIM 100");
        assert_eq!(Op::neg(Arg::indirect(3)).to_string(), "NEG @%3");
    }

    #[test]
    fn test_register_masks_flags() {
        let arg = Arg::register(0xff);
        assert_eq!(arg.code, ArgCode(0x3f));
        assert_eq!(arg.as_register(), 0x3f);
        assert_eq!(Arg::location(4).as_register(), 0);
        assert!(Arg::NONE.is_none());
    }
}
