//! A small register machine with 5 registers and 256 bytes of memory.
//!
//! Memory cells are 16 bit values in the machine's byte order; the exit
//! code is the single byte at address 0. Comparisons set the `t` flag,
//! which conditional jumps, forks and branches consult.

use std::fmt;
use std::rc::Rc;

use crate::error::{MachineError, OpError};
use crate::opcode::assemble::MAX_PROGRAM_SIZE;
use crate::opcode::code::OpCode;
use crate::opcode::io::{decode_all, decode_op, ByteOrder};
use crate::opcode::machine::{Machine, MachineState};
use crate::opcode::op::{Arg, Op};
use crate::search::{Emitter, SearchState};

pub const MEMORY_SIZE: usize = 256;
pub const NUM_REGISTERS: usize = 5;

#[derive(Debug, Clone, Copy)]
enum Loc {
    Reg(usize),
    Mem(usize),
}

#[derive(Debug, Clone)]
pub struct TinyMachine {
    bo: ByteOrder,
    program: Rc<[u8]>,
    pi: u16,
    op_pi: u16,
    op: Op,
    h: bool,
    t: bool,
    regs: [u16; NUM_REGISTERS],
    ol: u16,
    oc: u16,
    mem: [u8; MEMORY_SIZE],
    fault: Option<MachineError>,
}

impl TinyMachine {
    pub fn new(bo: ByteOrder) -> Self {
        Self {
            bo,
            program: Rc::from(Vec::new()),
            pi: 0,
            op_pi: 0,
            op: Op::halt(),
            h: false,
            t: false,
            regs: [0; NUM_REGISTERS],
            ol: 0,
            oc: 0,
            mem: [0; MEMORY_SIZE],
            fault: None,
        }
    }

    /// A machine with `program` loaded.
    pub fn with_program(
        bo: ByteOrder,
        program: impl Into<Rc<[u8]>>,
        assume_valid: bool,
    ) -> Result<Self, MachineError> {
        let mut mach = Self::new(bo);
        mach.load(program.into(), assume_valid)?;
        Ok(mach)
    }

    pub fn registers(&self) -> [u16; NUM_REGISTERS] {
        self.regs
    }

    pub fn memory(&self) -> &[u8] {
        &self.mem
    }

    pub fn truth(&self) -> bool {
        self.t
    }

    /// The fault that stopped the machine, if any.
    pub fn fault(&self) -> Option<&MachineError> {
        self.fault.as_ref()
    }

    fn invalid(&self, desc: &str) -> MachineError {
        MachineError::InvalidOp(OpError::new(self.op, desc))
    }

    fn reg_index(&self, r: u8) -> Result<usize, MachineError> {
        match usize::from(r) {
            0 => Err(MachineError::NullRegister),
            r if r <= NUM_REGISTERS => Ok(r - 1),
            _ => Err(self.invalid("invalid register number")),
        }
    }

    fn address(&self, arg: Arg) -> Result<usize, MachineError> {
        let mut addr = if arg.code.is_immediate() { arg.val } else { 0 };
        let r = arg.code.register();
        if r != 0 {
            addr = addr.wrapping_add(self.regs[self.reg_index(r)?]);
        }
        Ok(usize::from(addr))
    }

    fn loc(&self, arg: Arg) -> Result<Loc, MachineError> {
        if arg.code.is_indirect() {
            return Ok(Loc::Mem(self.address(arg)?));
        }
        if arg.code.is_immediate() {
            return Err(self.invalid("cannot write to an immediate"));
        }
        Ok(Loc::Reg(self.reg_index(arg.code.register())?))
    }

    fn get(&self, loc: Loc) -> Result<u16, MachineError> {
        match loc {
            Loc::Reg(i) => Ok(self.regs[i]),
            Loc::Mem(addr) => self
                .bo
                .get_u16(&self.mem, addr)
                .ok_or(MachineError::Segfault { addr }),
        }
    }

    fn put(&mut self, loc: Loc, val: u16) -> Result<(), MachineError> {
        match loc {
            Loc::Reg(i) => {
                self.regs[i] = val;
                Ok(())
            }
            Loc::Mem(addr) => {
                if self.bo.put_u16(&mut self.mem, addr, val) {
                    Ok(())
                } else {
                    Err(MachineError::Segfault { addr })
                }
            }
        }
    }

    /// Replaces the low (`high == false`) or high byte of a register with
    /// the same byte of `val`, or stores that byte alone into memory.
    fn put_byte(&mut self, loc: Loc, val: u16, high: bool) -> Result<(), MachineError> {
        let byte = if high { val >> 8 } else { val & 0x00ff };
        match loc {
            Loc::Reg(i) => {
                self.regs[i] = if high {
                    (self.regs[i] & 0x00ff) | (byte << 8)
                } else {
                    (self.regs[i] & 0xff00) | byte
                };
                Ok(())
            }
            Loc::Mem(addr) => match self.mem.get_mut(addr) {
                Some(cell) => {
                    *cell = byte as u8;
                    Ok(())
                }
                None => Err(MachineError::Segfault { addr }),
            },
        }
    }

    fn read(&self, arg: Arg) -> Result<u16, MachineError> {
        if arg.code.is_indirect() {
            return self.get(Loc::Mem(self.address(arg)?));
        }
        if arg.code.is_immediate() {
            if arg.code.register() != 0 {
                return Err(self.invalid("immediate value with a register number"));
            }
            return Ok(arg.val);
        }
        Ok(self.regs[self.reg_index(arg.code.register())?])
    }

    /// Applies `f` to the value at arg1 and the value of arg2.
    fn binary(&mut self, f: impl Fn(u16, u16) -> Result<u16, MachineError>) -> Result<(), MachineError> {
        let loc = self.loc(self.op.arg1)?;
        let a = self.get(loc)?;
        let b = self.read(self.op.arg2)?;
        self.put(loc, f(a, b)?)
    }

    fn compare(&mut self, f: impl Fn(i16, i16) -> bool) -> Result<(), MachineError> {
        let a = self.read(self.op.arg1)? as i16;
        let b = self.read(self.op.arg2)? as i16;
        self.t = f(a, b);
        Ok(())
    }

    fn exec(&mut self, emit: &mut Emitter<'_, Self>) -> Result<(), MachineError> {
        if self.h {
            return Ok(());
        }
        let (op, next) = decode_op(self.bo, &self.program, usize::from(self.pi))?;
        self.op = op;
        self.op_pi = self.pi;
        self.pi = u16::try_from(next).map_err(|_| MachineError::InvalidPi)?;

        if self.ol != 0 {
            self.oc = self.oc.saturating_add(1);
            if self.oc >= self.ol {
                self.h = true;
                return Ok(());
            }
        }

        match op.code {
            OpCode::HALT => {
                self.h = true;
                self.pi = self.op_pi;
            }

            OpCode::OPLIM => {
                let limit = self.read(op.arg1)?;
                if self.ol != 0 && limit >= self.ol {
                    return Err(MachineError::OpLimitRaised);
                }
                self.ol = limit;
            }

            OpCode::MOVE => {
                let val = self.read(op.arg2)?;
                let loc = self.loc(op.arg1)?;
                self.put(loc, val)?;
            }

            OpCode::MOVEL | OpCode::MOVEH => {
                let val = self.read(op.arg2)?;
                let loc = self.loc(op.arg1)?;
                self.put_byte(loc, val, op.code == OpCode::MOVEH)?;
            }

            OpCode::SWAP => {
                let (l1, l2) = (self.loc(op.arg1)?, self.loc(op.arg2)?);
                let (v1, v2) = (self.get(l1)?, self.get(l2)?);
                self.put(l1, v2)?;
                self.put(l2, v1)?;
            }

            OpCode::JUMP | OpCode::JUMPF | OpCode::JUMPT => {
                let off = self.read(op.arg1)?;
                if self.takes(op.code, OpCode::JUMP) {
                    self.pi = self.pi.wrapping_add(off);
                }
            }

            OpCode::FORK | OpCode::FORKF | OpCode::FORKT => {
                let off = self.read(op.arg1)?;
                if self.takes(op.code, OpCode::FORK) {
                    let mut child = emit.copy_of(self);
                    child.pi = child.pi.wrapping_add(off);
                    emit.emit(child);
                }
            }

            OpCode::BRANCH | OpCode::BRANCHF | OpCode::BRANCHT => {
                let off = self.read(op.arg1)?;
                if self.takes(op.code, OpCode::BRANCH) {
                    let child = emit.copy_of(self);
                    emit.emit(child);
                    self.pi = self.pi.wrapping_add(off);
                }
            }

            OpCode::LT => self.compare(|a, b| a < b)?,
            OpCode::LTE => self.compare(|a, b| a <= b)?,
            OpCode::EQ => {
                let (a, b) = (self.read(op.arg1)?, self.read(op.arg2)?);
                self.t = a == b;
            }
            OpCode::GTE => self.compare(|a, b| a >= b)?,
            OpCode::GT => self.compare(|a, b| a > b)?,

            OpCode::NEG => {
                let loc = self.loc(op.arg1)?;
                let val = self.get(loc)?;
                self.put(loc, val.wrapping_neg())?;
            }
            OpCode::SUB => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            OpCode::ADD => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            OpCode::MUL => self.binary(|a, b| Ok((a as i16).wrapping_mul(b as i16) as u16))?,
            OpCode::DIV => self.binary(|a, b| match b {
                0 => Err(MachineError::DivideByZero),
                _ => Ok((a as i16).wrapping_div(b as i16) as u16),
            })?,
            OpCode::MOD => self.binary(|a, b| match b {
                0 => Err(MachineError::DivideByZero),
                _ => Ok((a as i16).wrapping_rem(b as i16) as u16),
            })?,

            _ => return Err(self.invalid("invalid opcode")),
        }
        Ok(())
    }

    /// Whether a jump, fork or branch of the family starting at `base`
    /// (unconditional, then on false, then on true) is taken.
    fn takes(&self, code: OpCode, base: OpCode) -> bool {
        match code.0 - base.0 {
            0 => true,
            1 => !self.t,
            _ => self.t,
        }
    }

    fn validate_program(&self, program: &[u8]) -> Result<(), MachineError> {
        for (_, op) in decode_all(self.bo, program)? {
            op.validate()?;
            for (name, arg) in [("arg1", op.arg1), ("arg2", op.arg2)] {
                if usize::from(arg.code.register()) > NUM_REGISTERS {
                    return Err(MachineError::InvalidOp(OpError::new(
                        op,
                        format!("invalid {name} register, max is {NUM_REGISTERS}"),
                    )));
                }
                if arg.code.is_immediate()
                    && arg.code.is_indirect()
                    && usize::from(arg.val) > MEMORY_SIZE - 2
                {
                    return Err(MachineError::InvalidOp(OpError::new(
                        op,
                        format!("invalid {name} memory address, max is {}", MEMORY_SIZE - 2),
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Machine for TinyMachine {
    fn byte_order(&self) -> ByteOrder {
        self.bo
    }

    fn reset(&mut self) {
        self.pi = 0;
        self.op_pi = 0;
        self.op = Op::halt();
        self.h = false;
        self.t = false;
        self.regs = [0; NUM_REGISTERS];
        self.ol = 0;
        self.oc = 0;
        self.mem = [0; MEMORY_SIZE];
        self.fault = None;
    }

    fn load(&mut self, program: Rc<[u8]>, assume_valid: bool) -> Result<(), MachineError> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(MachineError::ProgramTooLong(program.len()));
        }
        if !assume_valid {
            self.validate_program(&program)?;
        }
        self.program = program;
        self.reset();
        Ok(())
    }

    fn program(&self) -> &[u8] {
        &self.program
    }

    fn pi(&self) -> usize {
        usize::from(self.pi)
    }

    fn last_pi(&self) -> usize {
        usize::from(self.op_pi)
    }

    fn last_op(&self) -> Op {
        self.op
    }

    fn next_op(&self) -> Option<Op> {
        decode_op(self.bo, &self.program, usize::from(self.pi))
            .ok()
            .map(|(op, _)| op)
    }

    fn state(&self) -> MachineState {
        MachineState {
            pi: self.pi,
            h: self.h,
            t: self.t,
            regs: self.regs.to_vec(),
            oc: self.oc,
            ol: self.ol,
        }
    }

    fn copy_memory(&self, offset: usize, buf: &mut [u8]) -> usize {
        let Some(src) = self.mem.get(offset..) else {
            return 0;
        };
        let n = src.len().min(buf.len());
        buf[..n].copy_from_slice(&src[..n]);
        n
    }

    fn check_state(&self) -> Result<(), MachineError> {
        if let Some(err) = &self.fault {
            return Err(err.clone());
        }
        if usize::from(self.pi) > self.program.len() {
            return Err(MachineError::InvalidPi);
        }
        if !self.h {
            return Err(MachineError::NotHalted);
        }
        if self.ol != 0 && self.oc >= self.ol {
            return Err(MachineError::OpLimitExceeded {
                count: self.oc,
                limit: self.ol,
            });
        }
        Ok(())
    }
}

impl SearchState for TinyMachine {
    fn step(&mut self, emit: &mut Emitter<'_, Self>) {
        if let Err(err) = self.exec(emit) {
            log::trace!("machine fault at @{:04x}: {err}", self.op_pi);
            self.fault = Some(err);
            self.h = true;
        }
    }

    fn is_halted(&self) -> bool {
        self.h || usize::from(self.pi) >= self.program.len()
    }
}

impl fmt::Display for TinyMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TinyMachine({})", self.state())
    }
}
