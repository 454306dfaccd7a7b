//! A watcher that logs every search event with a state dump.

use std::collections::HashMap;
use std::fmt;

use crate::log::{debug_sink, elided, prefixed, LogSink};
use crate::word::plan::{Plan, StateId, Watcher};
use crate::word::solution::Solution;

/// Names a state by its root lineage, its parent and itself, as
/// `root:parent:id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugId {
    pub root: u64,
    pub parent: u64,
    pub id: u64,
}

impl DebugId {
    pub fn root(id: u64) -> Self {
        Self {
            root: id,
            parent: 0,
            id,
        }
    }

    pub fn sub(&self, id: u64) -> Self {
        Self {
            root: self.root,
            parent: self.id,
            id,
        }
    }
}

impl fmt::Display for DebugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.root, self.parent, self.id)
    }
}

/// Logs `+++` forks, `-->` before, `<--` after and `===` results.
///
/// With a plan attached, any annotations at the state's position are
/// logged after its dump.
pub struct DebugWatcher<'p> {
    sink: LogSink,
    plan: Option<&'p dyn Plan>,
    next: u64,
    ids: HashMap<StateId, DebugId>,
}

impl Default for DebugWatcher<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> DebugWatcher<'p> {
    pub fn new() -> Self {
        Self::with_sink(debug_sink())
    }

    pub fn with_sink(sink: LogSink) -> Self {
        Self {
            sink,
            plan: None,
            next: 0,
            ids: HashMap::new(),
        }
    }

    pub fn with_plan(mut self, plan: &'p dyn Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Number of states currently being tracked.
    pub fn live(&self) -> usize {
        self.ids.len()
    }

    fn id_of(&mut self, parent: Option<StateId>, child: StateId) -> DebugId {
        if let Some(&id) = self.ids.get(&child) {
            return id;
        }
        let id = match parent {
            None => {
                self.next += 1;
                DebugId::root(self.next)
            }
            Some(parent) => {
                let par = self.id_of(None, parent);
                self.next += 1;
                par.sub(self.next)
            }
        };
        self.ids.insert(child, id);
        id
    }

    fn log(&self, mark: &str, id: DebugId, sol: &dyn Solution) {
        let first = format!("{mark} {id}");
        let rest = format!("{} {id}", elided(mark));
        let sink = self.sink.clone();
        let mut out = |line: &str| sink(line);
        let pfx = [first.as_str(), rest.as_str()];
        let mut out = prefixed(&mut out, &pfx);
        sol.dump(&mut out);
        if let Some(plan) = self.plan {
            let annos = plan.decorate(sol);
            if !annos.is_empty() {
                out(&format!("// {}", annos.join(" ")));
            }
        }
    }
}

impl Watcher for DebugWatcher<'_> {
    fn before(&mut self, id: StateId, sol: &dyn Solution) {
        let id = self.id_of(None, id);
        self.log("-->", id, sol);
    }

    fn after(&mut self, id: StateId, sol: &dyn Solution) {
        let id = self.id_of(None, id);
        self.log("<--", id, sol);
    }

    fn fork(&mut self, parent: Option<StateId>, child: StateId, sol: &dyn Solution) {
        let id = self.id_of(parent, child);
        self.log("+++", id, sol);
    }

    fn result(&mut self, id: StateId, sol: &dyn Solution) -> bool {
        let did = self.id_of(None, id);
        self.log("===", did, sol);
        self.ids.remove(&id);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolutionError;
    use crate::word::problem::Problem;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Stub {
        problem: Problem,
    }

    impl Solution for Stub {
        fn problem(&self) -> &Problem {
            &self.problem
        }

        fn value_of(&self, _c: u8) -> (i32, bool) {
            (0, false)
        }

        fn check(&self) -> Result<(), SolutionError> {
            Ok(())
        }

        fn dump(&self, out: &mut dyn FnMut(&str)) {
            out("one");
            out("two");
        }
    }

    fn capture() -> (LogSink, Rc<RefCell<Vec<String>>>) {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let inner = lines.clone();
        let sink: LogSink = Rc::new(move |s: &str| inner.borrow_mut().push(s.to_string()));
        (sink, lines)
    }

    #[test]
    fn test_debug_id_display() {
        let root = DebugId::root(1);
        assert_eq!(root.to_string(), "1:0:1");
        assert_eq!(root.sub(4).to_string(), "1:1:4");
        assert_eq!(root.sub(4).sub(7).to_string(), "1:4:7");
    }

    #[test]
    fn test_debug_watcher_logs_events() {
        let (sink, lines) = capture();
        let sol = Stub {
            problem: Problem::setup("a", "b", "c").unwrap(),
        };
        let mut dbg = DebugWatcher::with_sink(sink);
        dbg.fork(None, 1, &sol);
        dbg.before(1, &sol);
        dbg.fork(Some(1), 2, &sol);
        dbg.after(1, &sol);
        assert!(!dbg.result(1, &sol));
        assert_eq!(dbg.live(), 1);
        assert_eq!(
            *lines.borrow(),
            vec![
                "+++ 1:0:1 one",
                "... 1:0:1 two",
                "--> 1:0:1 one",
                "... 1:0:1 two",
                "+++ 1:1:2 one",
                "... 1:1:2 two",
                "<-- 1:0:1 one",
                "... 1:0:1 two",
                "=== 1:0:1 one",
                "... 1:0:1 two",
            ]
        );
    }
}
