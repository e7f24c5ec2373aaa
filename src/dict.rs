//! Namespaced key map.
//!
//! A [`Dict`] maps `(key, namespace) → u64`.  Namespaces keep unrelated key
//! kinds apart in a single map: resource lookups use namespace `0` for
//! namespace names and the generated namespace ids for properties; the
//! variable dictionary uses one namespace each for variables, active section
//! tags, iteration bindings, and host parameters.

use std::collections::HashMap;

/// Keyed map with a `u64` namespace per entry.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    map: HashMap<u64, HashMap<String, u64>>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key` in `namespace`.
    pub fn find(&self, key: &str, namespace: u64) -> Option<u64> {
        self.map.get(&namespace)?.get(key).copied()
    }

    /// Insert or overwrite `(key, namespace) → value`.
    pub fn write(&mut self, key: impl Into<String>, namespace: u64, value: u64) {
        self.map.entry(namespace).or_default().insert(key.into(), value);
    }

    /// Remove an entry.  Returns `true` if it existed.
    pub fn erase(&mut self, key: &str, namespace: u64) -> bool {
        self.map
            .get_mut(&namespace)
            .is_some_and(|ns| ns.remove(key).is_some())
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_find() {
        let mut dict = Dict::new();
        dict.write("key", 0, 7);
        assert_eq!(dict.find("key", 0), Some(7));
    }

    #[test]
    fn namespaces_are_disjoint() {
        let mut dict = Dict::new();
        dict.write("key", 0, 1);
        dict.write("key", 1, 2);
        assert_eq!(dict.find("key", 0), Some(1));
        assert_eq!(dict.find("key", 1), Some(2));
        assert_eq!(dict.find("key", 2), None);
    }

    #[test]
    fn overwrite() {
        let mut dict = Dict::new();
        dict.write("key", 3, 10);
        dict.write("key", 3, 20);
        assert_eq!(dict.find("key", 3), Some(20));
    }

    #[test]
    fn erase() {
        let mut dict = Dict::new();
        dict.write("gone", 0, 1);
        assert!(dict.erase("gone", 0));
        assert_eq!(dict.find("gone", 0), None);
        assert!(!dict.erase("gone", 0));
    }

    #[test]
    fn missing_returns_none() {
        let dict = Dict::new();
        assert_eq!(dict.find("nope", 0), None);
    }

    #[test]
    fn clear() {
        let mut dict = Dict::new();
        dict.write("a", 0, 1);
        dict.write("b", 9, 2);
        dict.clear();
        assert_eq!(dict.find("a", 0), None);
        assert_eq!(dict.find("b", 9), None);
    }
}
