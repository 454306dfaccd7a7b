//! Operation and argument byte codes of the tiny machine.

use std::fmt;

/// How an immediate argument value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The argument should not be immediate at all.
    Invalid,
    Value,
    Offset,
    Address,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Role::Invalid => "INVALID",
            Role::Value => "$value",
            Role::Offset => "+offset",
            Role::Address => "@address",
        }
    }

    fn format(self, val: u16) -> Option<String> {
        match self {
            Role::Value => Some(val.to_string()),
            Role::Offset => Some(signed_hex(val as i16)),
            Role::Address => Some(format!("@{val:04x}")),
            Role::Invalid => None,
        }
    }
}

/// `+0010`, `-0008`: sign and at least four hex digits.
fn signed_hex(v: i16) -> String {
    let sign = if v < 0 { '-' } else { '+' };
    format!("{sign}{:04x}", i32::from(v).unsigned_abs())
}

struct Meta {
    arity: usize,
    name: &'static str,
    role1: Role,
    role2: Role,
}

const fn meta(arity: usize, name: &'static str, role1: Role, role2: Role) -> Meta {
    Meta {
        arity,
        name,
        role1,
        role2,
    }
}

use self::Role::{Invalid as NO, Offset as OFF, Value as VAL};

const META: [Meta; 26] = [
    meta(0, "HALT", NO, NO),
    meta(1, "OPLIM", VAL, NO),
    meta(2, "MOVE", NO, VAL),
    meta(2, "MOVEL", NO, VAL),
    meta(2, "MOVEH", NO, VAL),
    meta(2, "SWAP", NO, NO),
    meta(1, "JUMP", OFF, NO),
    meta(1, "JUMPF", OFF, NO),
    meta(1, "JUMPT", OFF, NO),
    meta(1, "FORK", OFF, NO),
    meta(1, "FORKF", OFF, NO),
    meta(1, "FORKT", OFF, NO),
    meta(1, "BRANCH", OFF, NO),
    meta(1, "BRANCHF", OFF, NO),
    meta(1, "BRANCHT", OFF, NO),
    meta(2, "LT", VAL, VAL),
    meta(2, "LTE", VAL, VAL),
    meta(2, "EQ", VAL, VAL),
    meta(2, "GTE", VAL, VAL),
    meta(2, "GT", VAL, VAL),
    meta(1, "NEG", NO, NO),
    meta(2, "SUB", NO, VAL),
    meta(2, "ADD", NO, VAL),
    meta(2, "MUL", NO, VAL),
    meta(2, "DIV", NO, VAL),
    meta(2, "MOD", NO, VAL),
];

/// An operation byte code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpCode(pub u8);

impl OpCode {
    /// Terminates the machine.
    pub const HALT: OpCode = OpCode(0);
    /// Lowers the operation count limit.
    pub const OPLIM: OpCode = OpCode(1);
    /// Copies two bytes from src to dst.
    pub const MOVE: OpCode = OpCode(2);
    /// Copies the low byte of src to dst.
    pub const MOVEL: OpCode = OpCode(3);
    /// Copies the high byte of src to dst.
    pub const MOVEH: OpCode = OpCode(4);
    pub const SWAP: OpCode = OpCode(5);
    /// Advances pi by an offset.
    pub const JUMP: OpCode = OpCode(6);
    pub const JUMPF: OpCode = OpCode(7);
    pub const JUMPT: OpCode = OpCode(8);
    /// Defers a copy of the machine whose pi is advanced by an offset.
    pub const FORK: OpCode = OpCode(9);
    pub const FORKF: OpCode = OpCode(10);
    pub const FORKT: OpCode = OpCode(11);
    /// Defers a copy of the machine, then advances pi by an offset.
    pub const BRANCH: OpCode = OpCode(12);
    pub const BRANCHF: OpCode = OpCode(13);
    pub const BRANCHT: OpCode = OpCode(14);
    pub const LT: OpCode = OpCode(15);
    pub const LTE: OpCode = OpCode(16);
    pub const EQ: OpCode = OpCode(17);
    pub const GTE: OpCode = OpCode(18);
    pub const GT: OpCode = OpCode(19);
    pub const NEG: OpCode = OpCode(20);
    pub const SUB: OpCode = OpCode(21);
    pub const ADD: OpCode = OpCode(22);
    pub const MUL: OpCode = OpCode(23);
    pub const DIV: OpCode = OpCode(24);
    pub const MOD: OpCode = OpCode(25);

    fn meta(self) -> Option<&'static Meta> {
        META.get(usize::from(self.0))
    }

    pub fn is_valid(self) -> bool {
        self.meta().is_some()
    }

    pub fn name(self) -> &'static str {
        self.meta().map_or("INVALID", |m| m.name)
    }

    /// How many arguments the operation takes; 0 for invalid codes.
    pub fn arity(self) -> usize {
        self.meta().map_or(0, |m| m.arity)
    }

    /// True for FORK, FORKF and FORKT.
    pub fn is_fork(self) -> bool {
        matches!(self, OpCode::FORK | OpCode::FORKF | OpCode::FORKT)
    }

    /// Renders the operation with concrete arguments.
    pub fn format(self, a1: ArgCode, a2: ArgCode, v1: u16, v2: u16) -> String {
        let Some(m) = self.meta() else {
            return format!("INVALID({:02x}, {:02x}, {:02x})", self.0, a1.0, a2.0);
        };

        let mut parts: [String; 3] = Default::default();
        let mut k = 1;
        parts[0] = m.name.to_string();
        if m.arity > 0 {
            parts[1] = a1.format(v1, m.role1);
            k = 2;
            if m.arity > 1 {
                parts[2] = a2.format(v2, m.role2);
                k = 3;
            }
        }
        if m.arity < 1 && a1 != ArgCode::NONE {
            parts[1] = format!("EXTRA({:02x}, {})", a1.0, v1);
            k = 2;
        }
        if m.arity < 2 && a2 != ArgCode::NONE {
            parts[2] = format!("EXTRA({:02x}, {})", a2.0, v2);
            k = 3;
        }
        parts[..k].join(" ")
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.meta() {
            Some(m) => write!(f, "{}", m.name),
            None => write!(f, "INVALID({:02x})", self.0),
        }
    }
}

/// An argument byte code: two flag bits and a 6 bit register number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArgCode(pub u8);

impl ArgCode {
    /// No argument.
    pub const NONE: ArgCode = ArgCode(0x00);
    /// Has an immediate 16 bit value.
    pub const IMM: u8 = 0x80;
    /// Addresses memory.
    pub const IND: u8 = 0x40;
    pub const REG_MASK: u8 = 0x3f;

    pub fn is_immediate(self) -> bool {
        self.0 & Self::IMM != 0
    }

    pub fn is_indirect(self) -> bool {
        self.0 & Self::IND != 0
    }

    /// Register number, 0 meaning none.
    pub fn register(self) -> u8 {
        self.0 & Self::REG_MASK
    }

    /// True for a plain immediate value, which cannot be written to.
    pub fn is_value(self) -> bool {
        self.is_immediate() && !self.is_indirect()
    }

    /// Renders the argument with a concrete immediate value.
    pub fn format(self, val: u16, role: Role) -> String {
        if self == ArgCode::NONE {
            if role != Role::Invalid {
                return format!("MISSING({})", role.name());
            }
            return "MISSING".to_string();
        }
        let reg = self.register();
        if self.is_indirect() {
            return match (self.is_immediate(), reg) {
                (true, 0) => format!("@{val:04x}"),
                (true, r) => format!("@({val:04x} + %{r})"),
                (false, 0) => "@!0000".to_string(),
                (false, r) => format!("@%{r}"),
            };
        }
        if self.is_immediate() {
            return role
                .format(val)
                .unwrap_or_else(|| format!("UNKNOWN({:?}, {val})", role.name()));
        }
        format!("%{reg}")
    }
}

impl fmt::Display for ArgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = self.register();
        match (self.is_indirect(), self.is_immediate()) {
            (true, true) => write!(f, "@($IMMED + %{reg})"),
            (true, false) => write!(f, "@%{reg}"),
            (false, true) => write!(f, "$IMMED"),
            (false, false) => write!(f, "%{reg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_names() {
        assert_eq!(OpCode::HALT.name(), "HALT");
        assert_eq!(OpCode::MOD.name(), "MOD");
        assert_eq!(OpCode::BRANCHT.to_string(), "BRANCHT");
        assert_eq!(OpCode(26).to_string(), "INVALID(1a)");
        assert_eq!(OpCode(26).name(), "INVALID");
        assert!(!OpCode(200).is_valid());
    }

    #[test]
    fn test_opcode_arity() {
        assert_eq!(OpCode::HALT.arity(), 0);
        assert_eq!(OpCode::JUMP.arity(), 1);
        assert_eq!(OpCode::NEG.arity(), 1);
        assert_eq!(OpCode::MOVE.arity(), 2);
        assert_eq!(OpCode(99).arity(), 0);
    }

    #[test]
    fn test_arg_code_flags() {
        let code = ArgCode(ArgCode::IMM | ArgCode::IND | 3);
        assert!(code.is_immediate());
        assert!(code.is_indirect());
        assert_eq!(code.register(), 3);
        assert!(!code.is_value());
        assert!(ArgCode(ArgCode::IMM).is_value());
        assert_eq!(code.to_string(), "@($IMMED + %3)");
        assert_eq!(ArgCode(2).to_string(), "%2");
    }

    #[test]
    fn test_arg_format() {
        let imm = ArgCode(ArgCode::IMM);
        assert_eq!(imm.format(42, Role::Value), "42");
        assert_eq!(imm.format(0, Role::Offset), "+0000");
        assert_eq!(imm.format((-8i16) as u16, Role::Offset), "-0008");
        assert_eq!(imm.format(0x2a, Role::Address), "@002a");
        assert_eq!(imm.format(5, Role::Invalid), "UNKNOWN(\"INVALID\", 5)");
        assert_eq!(ArgCode::NONE.format(0, Role::Value), "MISSING($value)");
        assert_eq!(ArgCode::NONE.format(0, Role::Invalid), "MISSING");
        let loc = ArgCode(ArgCode::IMM | ArgCode::IND);
        assert_eq!(loc.format(0x20, Role::Invalid), "@0020");
        let indexed = ArgCode(ArgCode::IMM | ArgCode::IND | 2);
        assert_eq!(indexed.format(0x20, Role::Invalid), "@(0020 + %2)");
        assert_eq!(ArgCode(ArgCode::IND | 1).format(0, Role::Value), "@%1");
    }

    #[test]
    fn test_opcode_format_extra() {
        let s = OpCode::HALT.format(ArgCode(1), ArgCode::NONE, 0, 0);
        assert_eq!(s, "HALT EXTRA(01, 0)");
        let s = OpCode(77).format(ArgCode(1), ArgCode(2), 0, 0);
        assert_eq!(s, "INVALID(4d, 01, 02)");
    }
}
