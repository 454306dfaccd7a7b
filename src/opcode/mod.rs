//! Opcode backend: a byte encoded instruction set, an assembler with
//! patchable references, a register allocator, a tiny register machine,
//! and a generator that assembles plans for it.

pub mod assemble;
pub mod code;
pub mod gen;
pub mod io;
pub mod machine;
pub mod op;
pub mod plan;
pub mod reg_alloc;
pub mod tiny_machine;
mod validate;

pub use assemble::{Assembler, Ref, MAX_PROGRAM_SIZE};
pub use code::{ArgCode, OpCode, Role};
pub use gen::CodeGen;
pub use io::{decode_all, decode_op, encode_all, ByteOrder};
pub use machine::{
    dump_memory, run_all, ForkKind, Machine, MachineState, MultiTracer, TracePrinter, Tracer,
};
pub use op::{Arg, Op};
pub use plan::{ExitCodes, Layout, LetterValue, MachineView, OpcodePlan, Phase};
pub use reg_alloc::RegisterAllocator;
pub use tiny_machine::{TinyMachine, MEMORY_SIZE, NUM_REGISTERS};
