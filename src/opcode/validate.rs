//! Static shape checks of ops.

use crate::error::OpError;
use crate::opcode::code::OpCode;
use crate::opcode::op::Op;

impl Op {
    /// Checks the op code and that the argument kinds fit it.
    pub fn validate(&self) -> Result<(), OpError> {
        let err = |desc: &str| Err(OpError::new(self, desc));
        let (a1, a2) = (self.arg1.code, self.arg2.code);

        match self.code {
            OpCode::HALT => {
                if !self.arg1.is_none() || !self.arg2.is_none() {
                    return err("expected no arguments");
                }
            }

            OpCode::OPLIM => {
                if !a1.is_value() {
                    return err("expected immediate arg1");
                }
                if !self.arg2.is_none() {
                    return err("expected no arg2");
                }
            }

            OpCode::MOVE | OpCode::MOVEL | OpCode::MOVEH => {
                if a1.is_value() || self.arg1.is_none() {
                    return err("expected arg1 to be register or memory");
                }
                if self.arg2.is_none() {
                    return err("missing arg2");
                }
            }

            OpCode::SWAP => {
                if a1.is_value() || self.arg1.is_none() {
                    return err("expected arg1 to be register or memory");
                }
                if a2.is_value() || self.arg2.is_none() {
                    return err("expected arg2 to be register or memory");
                }
            }

            OpCode::JUMP
            | OpCode::JUMPF
            | OpCode::JUMPT
            | OpCode::FORK
            | OpCode::FORKF
            | OpCode::FORKT
            | OpCode::BRANCH
            | OpCode::BRANCHF
            | OpCode::BRANCHT => {
                if !a1.is_value() {
                    return err("expected arg1 offset");
                }
                if !self.arg2.is_none() {
                    return err("expected no arg2");
                }
            }

            OpCode::LT | OpCode::LTE | OpCode::EQ | OpCode::GTE | OpCode::GT => {
                if self.arg1.is_none() {
                    return err("missing arg1");
                }
                if self.arg2.is_none() {
                    return err("missing arg2");
                }
            }

            OpCode::NEG => {
                if a1.is_value() || self.arg1.is_none() {
                    return err("expected arg1 to be register or memory");
                }
                if !self.arg2.is_none() {
                    return err("expected no arg2");
                }
            }

            OpCode::SUB | OpCode::ADD | OpCode::MUL | OpCode::DIV | OpCode::MOD => {
                if a1.is_value() || self.arg1.is_none() {
                    return err("expected arg1 to be register or memory");
                }
                if self.arg2.is_none() {
                    return err("missing arg2");
                }
            }

            _ => return err("invalid opcode"),
        }

        for code in [a1, a2] {
            if code.is_value() && code.register() != 0 {
                return err("immediate value with a register number");
            }
        }
        Ok(())
    }
}
