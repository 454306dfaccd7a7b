//! Least recently used register allocation by name.

use std::collections::BTreeMap;

/// Assigns names to the registers `1..=n`, stealing the least recently
/// used assignment once every register is taken.
#[derive(Debug, Clone, Default)]
pub struct RegisterAllocator {
    max: u8,
    assign: BTreeMap<String, u8>,
    /// Oldest first.
    order: Vec<String>,
}

impl RegisterAllocator {
    pub fn new(n: u8) -> Self {
        Self {
            max: n,
            assign: BTreeMap::new(),
            order: Vec::with_capacity(usize::from(n)),
        }
    }

    /// The name assigned to register `r`, if any.
    pub fn label_of(&self, r: u8) -> Option<&str> {
        self.assign
            .iter()
            .find(|(_, &reg)| reg == r)
            .map(|(key, _)| key.as_str())
    }

    pub fn assigned(&self, r: u8) -> bool {
        self.assign.values().any(|&reg| reg == r)
    }

    /// The register assigned to `key`, freshening it.
    pub fn get(&mut self, key: &str) -> Option<u8> {
        let r = self.assign.get(key).copied()?;
        self.touch(key);
        Some(r)
    }

    /// The register for `key`: its current one, a free one, or the least
    /// recently used one, in that order of preference.
    pub fn take(&mut self, key: &str) -> u8 {
        if let Some(r) = self.get(key) {
            return r;
        }
        if self.assign.len() >= usize::from(self.max) {
            return self.steal(key);
        }
        match (1..=self.max).find(|&r| !self.assigned(r)) {
            Some(r) => {
                self.bind(key, r);
                r
            }
            None => self.steal(key),
        }
    }

    /// Renames the assignment of `old` to `new`, freshening it; takes a
    /// register for `new` if `old` has none.
    pub fn reassign(&mut self, old: &str, new: &str) -> u8 {
        match self.free(old) {
            Some(r) => {
                self.free(new);
                self.bind(new, r);
                r
            }
            None => self.take(new),
        }
    }

    /// Releases the assignment of `key`, returning its register.
    pub fn free(&mut self, key: &str) -> Option<u8> {
        let r = self.assign.remove(key)?;
        self.order.retain(|k| k != key);
        Some(r)
    }

    fn bind(&mut self, key: &str, r: u8) {
        self.assign.insert(key.to_string(), r);
        self.order.push(key.to_string());
    }

    fn touch(&mut self, key: &str) {
        if let Some(i) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(i);
            self.order.push(k);
        }
    }

    fn steal(&mut self, key: &str) -> u8 {
        let Some(old) = (!self.order.is_empty()).then(|| self.order.remove(0)) else {
            // no registers at all
            return 0;
        };
        let r = self.assign.remove(&old).unwrap_or(0);
        log::trace!("register %{r} stolen from {old} for {key}");
        self.bind(key, r);
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_is_stable() {
        let mut ra = RegisterAllocator::new(3);
        let r = ra.take("a");
        assert_eq!(r, 1);
        assert_eq!(ra.take("a"), r);
        assert_eq!(ra.label_of(1), Some("a"));
        assert!(ra.assigned(1));
        assert!(!ra.assigned(2));
    }

    #[test]
    fn test_free_then_take_reuses() {
        let mut ra = RegisterAllocator::new(5);
        let a = ra.take("a");
        let b = ra.take("b");
        assert_eq!(ra.free("a"), Some(a));
        let c = ra.take("c");
        assert_eq!(c, a);
        assert_eq!(ra.get("b"), Some(b));
        assert_eq!(ra.get("a"), None);
    }

    #[test]
    fn test_steal_oldest() {
        let mut ra = RegisterAllocator::new(2);
        ra.take("a");
        ra.take("b");
        // freshen a, so b is the oldest
        ra.get("a");
        let r = ra.take("c");
        assert_eq!(r, 2);
        assert_eq!(ra.get("b"), None);
        assert_eq!(ra.label_of(2), Some("c"));
    }

    #[test]
    fn test_reassign() {
        let mut ra = RegisterAllocator::new(2);
        let r = ra.take("C3");
        ra.take("x");
        assert_eq!(ra.reassign("C3", "C2"), r);
        assert_eq!(ra.get("C3"), None);
        // C2 is now the most recent, so x gets stolen
        assert_eq!(ra.take("y"), 2);
        assert_eq!(ra.get("C2"), Some(r));

        // nothing to rename
        let mut ra = RegisterAllocator::new(2);
        assert_eq!(ra.reassign("missing", "new"), 1);
    }

    #[test]
    fn test_copies_are_independent() {
        let mut ra = RegisterAllocator::new(2);
        ra.take("a");
        let mut alt = ra.clone();
        alt.take("b");
        assert!(alt.assigned(2));
        assert!(!ra.assigned(2));
    }
}
