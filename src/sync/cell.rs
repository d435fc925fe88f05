//! # Lock-protected single-value holder.
//!
//! [`AtomicCell`] serializes every access to one value under one
//! [`parking_lot::Mutex`]. It exists for the compound read-transform-write
//! operations ([`update`](AtomicCell::update), [`update_if`](AtomicCell::update_if),
//! [`modify`](AtomicCell::modify)) that plain atomics cannot express for
//! arbitrary payload types.
//!
//! ## Rules
//! - Every operation holds the lock for its full critical section; none blocks
//!   beyond lock contention.
//! - Closures run **under the lock** — keep them short and never call back
//!   into the same cell from inside one.
//!
//! ## Example
//! ```
//! use taskchain::AtomicCell;
//!
//! let cell = AtomicCell::new(10);
//! assert_eq!(cell.update(|n| n + 1), 11);
//! assert_eq!(cell.update_if(|n| (*n > 100).then(|| n - 100)), None);
//! assert_eq!(cell.read(), 11);
//! ```

use parking_lot::Mutex;

/// Single value guarded by an exclusive lock.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug, Default)]
pub struct AtomicCell<T> {
    slot: Mutex<T>,
}

impl<T> AtomicCell<T> {
    /// Creates a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(value),
        }
    }

    /// Replaces the value, returning the previous one.
    pub fn swap(&self, value: T) -> T {
        std::mem::replace(&mut self.slot.lock(), value)
    }

    /// Overwrites the value.
    pub fn write(&self, value: T) {
        *self.slot.lock() = value;
    }

    /// Applies `f` to the current value and stores the result.
    ///
    /// Returns the newly stored value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> T
    where
        T: Clone,
    {
        let mut guard = self.slot.lock();
        let next = f(&guard);
        *guard = next.clone();
        next
    }

    /// Applies `f` only if it produces a replacement.
    ///
    /// When `f` returns `None` the value is left untouched and `None` is
    /// returned; otherwise the produced value is stored and returned.
    pub fn update_if(&self, f: impl FnOnce(&T) -> Option<T>) -> Option<T>
    where
        T: Clone,
    {
        let mut guard = self.slot.lock();
        let next = f(&guard)?;
        *guard = next.clone();
        Some(next)
    }

    /// Atomic read-transform-write with an out-value.
    ///
    /// `f` receives exclusive access and may both mutate the value and return
    /// a result; `None` means "no-op" by convention of the caller.
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> Option<R>) -> Option<R> {
        f(&mut self.slot.lock())
    }

    /// Consumes the cell, returning the value.
    pub fn into_inner(self) -> T {
        self.slot.into_inner()
    }
}

impl<T: Clone> AtomicCell<T> {
    /// Returns a clone of the current value.
    pub fn read(&self) -> T {
        self.slot.lock().clone()
    }
}

impl<T> AtomicCell<Option<T>> {
    /// Takes the value out of an optional cell, leaving `None`.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_read_write_swap() {
        let cell = AtomicCell::new(1);
        cell.write(2);
        assert_eq!(cell.read(), 2);
        assert_eq!(cell.swap(3), 2);
        assert_eq!(cell.read(), 3);
    }

    #[test]
    fn test_update_returns_new_value() {
        let cell = AtomicCell::new(String::from("a"));
        let out = cell.update(|s| format!("{s}b"));
        assert_eq!(out, "ab");
        assert_eq!(cell.read(), "ab");
    }

    #[test]
    fn test_update_if_noop_keeps_value() {
        let cell = AtomicCell::new(5);
        assert_eq!(cell.update_if(|n| (*n > 10).then(|| n * 2)), None);
        assert_eq!(cell.read(), 5);
        assert_eq!(cell.update_if(|n| (*n > 2).then(|| n * 2)), Some(10));
        assert_eq!(cell.read(), 10);
    }

    #[test]
    fn test_modify_mutates_and_returns() {
        let cell = AtomicCell::new(vec![1, 2, 3]);
        let popped = cell.modify(|v| v.pop());
        assert_eq!(popped, Some(3));
        assert_eq!(cell.read(), vec![1, 2]);
    }

    #[test]
    fn test_take_from_optional() {
        let cell = AtomicCell::new(Some(7));
        assert_eq!(cell.take(), Some(7));
        assert_eq!(cell.take(), None);
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_increments() {
        let cell = Arc::new(AtomicCell::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = Arc::clone(&cell);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    cell.update(|n| n + 1);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cell.read(), 8000);
    }
}
