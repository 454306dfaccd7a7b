//! The machine abstraction, state snapshots and machine level tracing.

use std::fmt;
use std::rc::Rc;

use crate::error::{MachineError, SearchError};
use crate::log::{debug_sink, LogSink};
use crate::opcode::io::ByteOrder;
use crate::opcode::op::Op;
use crate::search::{Search, SearchConfig, SearchHooks, SearchReport, SearchState};
use crate::word::StateId;

/// An opcode machine.
pub trait Machine {
    /// Order of 16 bit values in the program and in memory.
    fn byte_order(&self) -> ByteOrder;

    /// Clears registers, flags, counters and memory.
    fn reset(&mut self);

    /// Loads a program, validating every op unless `assume_valid`.
    fn load(&mut self, program: Rc<[u8]>, assume_valid: bool) -> Result<(), MachineError>;

    fn program(&self) -> &[u8];

    /// Offset of the next op to run.
    fn pi(&self) -> usize;

    /// Offset of the op that ran last.
    fn last_pi(&self) -> usize;

    fn last_op(&self) -> Op;

    /// The op at `pi`, if one decodes there.
    fn next_op(&self) -> Option<Op>;

    fn state(&self) -> MachineState;

    /// Copies memory from `offset` into `buf`, returning how many bytes were
    /// copied (0 past the end of memory).
    fn copy_memory(&self, offset: usize, buf: &mut [u8]) -> usize;

    /// Everything but the exit code: faults, halting and the op limit.
    fn check_state(&self) -> Result<(), MachineError>;

    /// `Ok(())` only for a machine that halted with exit code 0.
    fn check(&self) -> Result<(), MachineError> {
        self.check_state()?;
        let mut code = [0u8; 1];
        self.copy_memory(0, &mut code);
        match code[0] {
            0 => Ok(()),
            code => Err(MachineError::NonZeroHalt(code)),
        }
    }
}

/// A snapshot of a machine's registers and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    pub pi: u16,
    pub h: bool,
    pub t: bool,
    pub regs: Vec<u16>,
    pub oc: u16,
    pub ol: u16,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ol != 0 || self.oc != 0 {
            write!(f, "({}/{}) ", self.oc, self.ol)?;
        }
        write!(f, "@{:04x} h={} t={}", self.pi, self.h, self.t)?;
        for (i, r) in self.regs.iter().enumerate() {
            write!(f, " r{}={}", i + 1, r)?;
        }
        Ok(())
    }
}

/// Hex dump of a machine's memory, sixteen bytes per line.
pub fn dump_memory(mach: &dyn Machine, out: &mut dyn FnMut(&str)) {
    let mut buf = [0u8; 16];
    let mut offset = 0;
    loop {
        let n = mach.copy_memory(offset, &mut buf);
        if n == 0 {
            return;
        }
        let groups: Vec<String> = buf[..n]
            .chunks(2)
            .map(|pair| pair.iter().map(|b| format!("{b:02x}")).collect())
            .collect();
        out(&format!("{offset:04x}: {}", groups.join(" ")));
        offset += n;
    }
}

/// How a state came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkKind {
    Root,
    Fork,
    Branch,
}

impl fmt::Display for ForkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForkKind::Root => write!(f, "ROOT"),
            ForkKind::Fork => write!(f, "FORK"),
            ForkKind::Branch => write!(f, "BRANCH"),
        }
    }
}

/// Observes raw machine execution.
pub trait Tracer {
    fn before(&mut self, _id: StateId, _mach: &dyn Machine) {}

    fn after(&mut self, _id: StateId, _mach: &dyn Machine) {}

    /// A machine was deferred; `parent` is `None` for the root.
    fn emit(
        &mut self,
        _kind: ForkKind,
        _parent: Option<StateId>,
        _child: StateId,
        _mach: &dyn Machine,
    ) {
    }

    /// A machine finished; returns true to stop.
    fn result(&mut self, id: StateId, mach: &dyn Machine) -> bool;

    /// Whether `before`/`after` are wanted.
    fn observes_steps(&self) -> bool {
        true
    }
}

impl<F> Tracer for F
where
    F: FnMut(StateId, &dyn Machine) -> bool,
{
    fn result(&mut self, id: StateId, mach: &dyn Machine) -> bool {
        self(id, mach)
    }

    fn observes_steps(&self) -> bool {
        false
    }
}

/// Dispatches to several tracers; stops if any of them says so.
#[derive(Default)]
pub struct MultiTracer {
    tracers: Vec<Box<dyn Tracer>>,
}

impl MultiTracer {
    pub fn new(tracers: Vec<Box<dyn Tracer>>) -> Self {
        Self { tracers }
    }

    pub fn push(&mut self, tracer: Box<dyn Tracer>) {
        self.tracers.push(tracer);
    }
}

impl Tracer for MultiTracer {
    fn before(&mut self, id: StateId, mach: &dyn Machine) {
        for t in &mut self.tracers {
            t.before(id, mach);
        }
    }

    fn after(&mut self, id: StateId, mach: &dyn Machine) {
        for t in &mut self.tracers {
            t.after(id, mach);
        }
    }

    fn emit(&mut self, kind: ForkKind, parent: Option<StateId>, child: StateId, mach: &dyn Machine) {
        for t in &mut self.tracers {
            t.emit(kind, parent, child, mach);
        }
    }

    fn result(&mut self, id: StateId, mach: &dyn Machine) -> bool {
        let mut stop = false;
        for t in &mut self.tracers {
            stop = t.result(id, mach) || stop;
        }
        stop
    }

    fn observes_steps(&self) -> bool {
        self.tracers.iter().any(|t| t.observes_steps())
    }
}

fn next_op_string(mach: &dyn Machine) -> String {
    mach.next_op()
        .map_or_else(|| "END".to_string(), |op| op.to_string())
}

/// Prints every step, deferral and result of a machine run.
pub struct TracePrinter {
    sink: LogSink,
}

impl TracePrinter {
    pub fn new() -> Self {
        Self::with_sink(debug_sink())
    }

    pub fn with_sink(sink: LogSink) -> Self {
        Self { sink }
    }
}

impl Default for TracePrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for TracePrinter {
    fn before(&mut self, id: StateId, mach: &dyn Machine) {
        let state = mach.state().to_string();
        (self.sink)(&format!(
            "[{id:>3}]--> {state:<50} // NEXT: {}",
            next_op_string(mach)
        ));
    }

    fn after(&mut self, id: StateId, mach: &dyn Machine) {
        let state = mach.state().to_string();
        (self.sink)(&format!("[{id:>3}]  = {state:<50} // LAST: {}", mach.last_op()));
    }

    fn emit(&mut self, kind: ForkKind, _parent: Option<StateId>, child: StateId, mach: &dyn Machine) {
        let state = mach.state().to_string();
        (self.sink)(&format!(
            "[{child:>3}]  X {state:<50} // {kind} NEXT: {}",
            next_op_string(mach)
        ));
    }

    fn result(&mut self, id: StateId, mach: &dyn Machine) -> bool {
        if let Err(err) = mach.check() {
            (self.sink)(&format!("[{id:>3}]  ! ERROR: {err}"));
        }
        (self.sink)(&format!("[{id:>3}]  = done: {}", mach.state()));
        let sink = self.sink.clone();
        dump_memory(mach, &mut |line| sink(&format!("         {line}")));
        false
    }
}

struct TracerHooks<'t> {
    tracer: &'t mut dyn Tracer,
}

impl<M: Machine + SearchState> SearchHooks<M> for TracerHooks<'_> {
    fn before(&mut self, id: StateId, state: &M) {
        self.tracer.before(id, state);
    }

    fn after(&mut self, id: StateId, state: &M) {
        self.tracer.after(id, state);
    }

    fn fork(&mut self, parent: Option<StateId>, child: StateId, state: &M) {
        let kind = match parent {
            None => ForkKind::Root,
            Some(_) if state.last_op().code.is_fork() => ForkKind::Fork,
            Some(_) => ForkKind::Branch,
        };
        self.tracer.emit(kind, parent, child, state);
    }

    fn result(&mut self, id: StateId, state: &M) -> bool {
        self.tracer.result(id, state)
    }

    fn observes_steps(&self) -> bool {
        self.tracer.observes_steps()
    }
}

/// Runs `root` and every machine it defers, handing each finished machine
/// to `tracer` until none are left or the tracer says stop.
pub fn run_all<M>(
    root: M,
    config: SearchConfig,
    budget: u64,
    tracer: &mut dyn Tracer,
) -> Result<SearchReport, SearchError>
where
    M: Machine + SearchState,
{
    let mut hooks = TracerHooks { tracer };
    Search::new(config).run(root, budget, &mut hooks)
}
