//! # Token-keyed, insertion-ordered callback store.
//!
//! [`HandlerRegistry`] backs both handler lists of the state machine
//! (progress observers and completion observers). Each inserted value gets an
//! opaque [`HandlerToken`] for later removal.
//!
//! ## Rules
//! - Iteration yields values in insertion order.
//! - `insert` is O(1) amortized; `remove` is O(n).
//! - Removing an unknown or already-removed token is a no-op, not an error.
//! - **Not internally synchronized** — the owning machine guards all access
//!   with its own lock. Callers drain before dispatching; removal during
//!   iteration is not supported by design.

/// Opaque identifier of one registered handler.
///
/// Monotonically increasing within a single registry; uniqueness holds only
/// for that registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(u64);

/// Insertion-ordered collection of values keyed by [`HandlerToken`].
#[derive(Debug)]
pub struct HandlerRegistry<T> {
    next: u64,
    entries: Vec<(HandlerToken, T)>,
}

impl<T> HandlerRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }

    /// Appends a value, returning its token.
    pub fn insert(&mut self, value: T) -> HandlerToken {
        let token = HandlerToken(self.next);
        self.next += 1;
        self.entries.push((token, value));
        token
    }

    /// Removes the value registered under `token`.
    ///
    /// Returns `None` when the token is unknown or was already removed.
    pub fn remove(&mut self, token: HandlerToken) -> Option<T> {
        let idx = self.entries.iter().position(|(t, _)| *t == token)?;
        Some(self.entries.remove(idx).1)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Takes every entry out, in insertion order, leaving the registry empty.
    ///
    /// Token allocation continues where it left off.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    /// Iterates over values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Number of registered values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut reg = HandlerRegistry::new();
        reg.insert("a");
        reg.insert("b");
        reg.insert("c");
        let seen: Vec<_> = reg.iter().copied().collect();
        assert_eq!(seen, ["a", "b", "c"]);
    }

    #[test]
    fn test_remove_by_token() {
        let mut reg = HandlerRegistry::new();
        let ta = reg.insert("a");
        let tb = reg.insert("b");
        assert_eq!(reg.remove(ta), Some("a"));
        // Double removal is a no-op.
        assert_eq!(reg.remove(ta), None);
        assert_eq!(reg.remove(tb), Some("b"));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_tokens_unique_across_removals() {
        let mut reg = HandlerRegistry::new();
        let ta = reg.insert(1);
        reg.remove(ta);
        let tb = reg.insert(2);
        assert_ne!(ta, tb);
    }

    #[test]
    fn test_drain_empties_in_order() {
        let mut reg = HandlerRegistry::new();
        reg.insert(1);
        reg.insert(2);
        assert_eq!(reg.drain(), vec![1, 2]);
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn test_clear() {
        let mut reg = HandlerRegistry::new();
        let t = reg.insert(1);
        reg.clear();
        assert_eq!(reg.remove(t), None);
    }
}
