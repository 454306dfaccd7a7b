//! Turns a generated step list into a runnable program.
//!
//! Compilation is three passes:
//!
//! 1. expand: macro steps are replaced by primitive steps, and every label
//!    is bound to the address it lands on
//! 2. resolve: label-carrying jumps become absolute jumps
//! 3. check: no label or macro step is left and every jump stays inside
//!    the program

use std::collections::BTreeMap;

use crate::error::{PlanError, SolutionError};
use crate::runnable::step::{range_len, Reg, Step};

/// Free form notes per program address.
pub type Annotations = BTreeMap<usize, Vec<String>>;

/// Label name to program address.
pub type Labels = BTreeMap<String, usize>;

/// A compiled step program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compiled {
    pub steps: Vec<Step>,
    pub labels: Labels,
    pub annotations: Annotations,
}

struct Expander {
    out: Vec<Step>,
    labels: Labels,
    annotations: Option<Annotations>,
}

impl Expander {
    fn annotate(&mut self, addr: usize, note: String) {
        if let Some(annos) = self.annotations.as_mut() {
            annos.entry(addr).or_default().push(note);
        }
    }

    fn define(&mut self, name: &str, addr: usize) {
        if !name.is_empty() {
            self.labels.insert(name.to_string(), addr);
        }
    }

    fn expand(&mut self, steps: &[Step]) -> Result<(), PlanError> {
        for step in steps {
            let addr = self.out.len();
            if let Some(name) = step.label_name() {
                self.define(name, addr);
            }
            if !step.is_macro() {
                if let Some(note) = step.annotation() {
                    self.annotate(addr, note);
                }
                self.out.push(step.clone());
                continue;
            }

            self.expand_macro(step)?;
            let off_by = (self.out.len() - addr) as isize - step.expanded_len() as isize;
            if off_by != 0 {
                return Err(PlanError::ExpansionMismatch { addr, off_by });
            }
        }
        Ok(())
    }

    fn expand_macro(&mut self, step: &Step) -> Result<(), PlanError> {
        let addr = self.out.len();
        match step {
            Step::Label(name) => {
                if !name.is_empty() {
                    self.annotate(addr, format!(":{name}"));
                }
            }

            Step::Finish(name) => {
                if !name.is_empty() {
                    self.annotate(addr, format!(":{name}"));
                }
                self.annotate(addr, "Normal Exit".to_string());
                self.out.push(Step::Exit(None));
            }

            Step::Range { label, min, max } => {
                let (min, max) = (*min, *max);
                if !label.is_empty() {
                    self.annotate(addr, format!(":{label}"));
                    self.annotate(addr, format!("range:[{min}, {max}]"));
                    self.annotate(addr + 1, format!(":{label}:body"));
                    self.annotate(addr + range_len(min, max), format!(":{label}:cont"));
                }
                if min < max {
                    self.out.extend([
                        Step::Set(Reg::B, min),
                        Step::Used(Reg::B),
                        Step::RelBz(4),
                        Step::LoopB { offset: -3, max },
                        Step::Used(Reg::B),
                        Step::RelJz(1),
                        Step::Exit(Some(SolutionError::AlreadyUsed)),
                    ]);
                } else {
                    self.out.extend([
                        Step::Set(Reg::B, min),
                        Step::Used(Reg::B),
                        Step::RelJz(1),
                        Step::Exit(Some(SolutionError::AlreadyUsed)),
                    ]);
                }
            }

            Step::ForkAlt(alt) => {
                // fork to :cont; the alternate runs inline up to its own
                // exit, guarded by a dead fork exit
                self.annotate(addr, format!("*-> :{}", alt.cont_label));
                self.out.push(Step::RelFork(0));

                let alt_addr = self.out.len();
                self.define(&alt.alt_label, alt_addr);
                if !alt.alt_label.is_empty() {
                    self.annotate(alt_addr, format!(":{}", alt.alt_label));
                }
                let alt_steps = alt.steps.borrow().clone();
                self.expand(&alt_steps)?;
                self.out.push(Step::Exit(Some(SolutionError::DeadFork)));

                let cont = self.out.len();
                self.out[addr] = Step::RelFork((cont - alt_addr) as isize);
                self.define(&alt.cont_label, cont);
                if !alt.cont_label.is_empty() {
                    self.annotate(cont, format!(":{}", alt.cont_label));
                }
            }

            other => self.out.push(other.clone()),
        }
        Ok(())
    }
}

/// Expands every macro step, binding labels to their addresses.
///
/// Annotations are only collected when `annotated` is set.
pub fn expand(steps: &[Step], annotated: bool) -> Result<Compiled, PlanError> {
    let mut ex = Expander {
        out: Vec::with_capacity(steps.len() * 2),
        labels: Labels::new(),
        annotations: annotated.then(Annotations::new),
    };
    ex.expand(steps)?;
    Ok(Compiled {
        steps: ex.out,
        labels: ex.labels,
        annotations: ex.annotations.unwrap_or_default(),
    })
}

/// Collects the labels defined by label-bearing steps still in `steps`,
/// on top of `labels`.
pub fn extract_labels(steps: &[Step], labels: &Labels) -> Labels {
    let mut out = labels.clone();
    for (addr, step) in steps.iter().enumerate() {
        if let Some(name) = step.label_name() {
            if !name.is_empty() {
                out.insert(name.to_string(), addr);
            }
        }
    }
    out
}

/// Replaces every label-carrying jump whose label is known by its absolute
/// form; returns how many were left unresolved.
pub fn resolve_labels(steps: &mut [Step], labels: &Labels) -> usize {
    let mut unresolved = 0;
    for step in steps.iter_mut() {
        let Some(target) = step.label_target() else {
            continue;
        };
        match labels.get(target).and_then(|&addr| step.resolved(addr)) {
            Some(resolved) => *step = resolved,
            None => unresolved += 1,
        }
    }
    unresolved
}

fn jump_target(addr: usize, step: &Step) -> Option<isize> {
    let next = addr as isize + 1;
    match *step {
        Step::Jmp(a) | Step::Jz(a) | Step::Jnz(a) | Step::Fork(a) | Step::Branch(a) => {
            Some(a as isize)
        }
        Step::RelJmp(o)
        | Step::RelJz(o)
        | Step::RelJnz(o)
        | Step::RelFork(o)
        | Step::RelBranch(o)
        | Step::RelFz(o)
        | Step::RelFnz(o)
        | Step::RelBz(o)
        | Step::RelBnz(o) => Some(next + o),
        Step::LoopB { offset, .. } => Some(next + offset),
        _ => None,
    }
}

/// Expands, resolves and checks `steps`.
pub fn compile(steps: &[Step], annotated: bool) -> Result<Compiled, PlanError> {
    let mut compiled = expand(steps, annotated)?;
    let labels = extract_labels(&compiled.steps, &compiled.labels);
    resolve_labels(&mut compiled.steps, &labels);
    compiled.labels = labels;

    let len = compiled.steps.len() as isize;
    for (addr, step) in compiled.steps.iter().enumerate() {
        if let Some(label) = step.label_target() {
            return Err(PlanError::UnresolvedLabel(label.to_string()));
        }
        if step.is_macro() {
            return Err(PlanError::UnexpandedMacro(addr));
        }
        if let Some(target) = jump_target(addr, step) {
            if target < 0 || target >= len {
                return Err(PlanError::InvalidTarget { addr, target });
            }
        }
    }
    log::debug!(
        "compiled {} steps into {} ({} labels)",
        steps.len(),
        compiled.steps.len(),
        compiled.labels.len()
    );
    Ok(compiled)
}
