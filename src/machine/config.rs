//! # Producer-registered lifecycle hooks.
//!
//! [`Configuration`] is the record a producer closure fills to cooperate with
//! controller calls. The machine invokes the hooks at well-defined points:
//!
//! | Hook     | Fires                                               | Times |
//! |----------|-----------------------------------------------------|-------|
//! | `pause`  | on every effective `Running → Paused` transition    | 0..n  |
//! | `resume` | on every effective `Paused → Running` transition    | 0..n  |
//! | `cancel` | once, on the first non-fulfilling terminal path     | 0..1  |
//! | `finish` | once, at the terminal transition (any outcome)      | 1     |
//!
//! The `cancel` hook fires on rejection as well as on explicit cancellation,
//! so producer-side cleanup runs uniformly on every non-fulfilling path.
//!
//! ## Example
//! ```
//! use taskchain::{Configuration, Task};
//! use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
//!
//! let cancelled = Arc::new(AtomicBool::new(false));
//! let seen = Arc::clone(&cancelled);
//! let task: Task<(), i32, String> = Task::new(move |_emitter, cfg| {
//!     let seen = Arc::clone(&seen);
//!     cfg.on_cancel(move || seen.store(true, Ordering::SeqCst));
//! });
//! task.cancel();
//! assert!(cancelled.load(Ordering::SeqCst));
//! ```

use std::sync::Arc;

type RepeatHook = Arc<dyn Fn() + Send + Sync>;
type OnceHook = Box<dyn FnOnce() + Send>;

/// Lifecycle hooks supplied by a task's producer.
///
/// All hooks are optional except `finish`, which the machine synthesizes as a
/// no-op when absent so it can still account for the exactly-once guarantee.
#[derive(Default)]
pub struct Configuration {
    pause: Option<RepeatHook>,
    resume: Option<RepeatHook>,
    cancel: Option<OnceHook>,
    finish: Option<OnceHook>,
}

impl Configuration {
    /// Creates an empty configuration (no hooks).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the hook invoked on every effective pause.
    pub fn on_pause(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.pause = Some(Arc::new(f));
    }

    /// Registers the hook invoked on every effective resume.
    pub fn on_resume(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.resume = Some(Arc::new(f));
    }

    /// Registers the hook invoked once on the first non-fulfilling terminal
    /// transition (cancellation **or** rejection).
    pub fn on_cancel(&mut self, f: impl FnOnce() + Send + 'static) {
        self.cancel = Some(Box::new(f));
    }

    /// Registers the hook invoked exactly once at the terminal transition,
    /// whatever the outcome.
    pub fn on_finish(&mut self, f: impl FnOnce() + Send + 'static) {
        self.finish = Some(Box::new(f));
    }

    /// Clones out the pause hook for invocation outside the state borrow.
    pub(crate) fn pause_hook(&self) -> Option<RepeatHook> {
        self.pause.clone()
    }

    /// Clones out the resume hook for invocation outside the state borrow.
    pub(crate) fn resume_hook(&self) -> Option<RepeatHook> {
        self.resume.clone()
    }

    /// Takes the cancel hook; subsequent calls return `None`.
    pub(crate) fn take_cancel(&mut self) -> Option<OnceHook> {
        self.cancel.take()
    }

    /// Takes the finish hook; subsequent calls return `None`.
    pub(crate) fn take_finish(&mut self) -> Option<OnceHook> {
        self.finish.take()
    }

    /// Overlays producer-supplied hooks onto this configuration.
    ///
    /// Hooks present in `supplied` replace the defaults (chain tasks pre-wire
    /// parent forwarding; a producer that registers its own hook intercepts
    /// the corresponding controller call).
    pub(crate) fn absorb(&mut self, supplied: Configuration) {
        if supplied.pause.is_some() {
            self.pause = supplied.pause;
        }
        if supplied.resume.is_some() {
            self.resume = supplied.resume;
        }
        if supplied.cancel.is_some() {
            self.cancel = supplied.cancel;
        }
        if supplied.finish.is_some() {
            self.finish = supplied.finish;
        }
    }

    /// Drops every hook. Called once the machine reaches a terminal state so
    /// captured resources (parent references, emitters) are released.
    pub(crate) fn clear(&mut self) {
        self.pause = None;
        self.resume = None;
        self.cancel = None;
        self.finish = None;
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("pause", &self.pause.is_some())
            .field("resume", &self.resume.is_some())
            .field("cancel", &self.cancel.is_some())
            .field("finish", &self.finish.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_once_hooks_are_taken() {
        let mut cfg = Configuration::new();
        cfg.on_cancel(|| {});
        cfg.on_finish(|| {});
        assert!(cfg.take_cancel().is_some());
        assert!(cfg.take_cancel().is_none());
        assert!(cfg.take_finish().is_some());
        assert!(cfg.take_finish().is_none());
    }

    #[test]
    fn test_absorb_overrides_only_supplied_hooks() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut base = Configuration::new();
        let c = Arc::clone(&calls);
        base.on_pause(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        base.on_resume(|| panic!("should be replaced"));

        let mut supplied = Configuration::new();
        supplied.on_resume(|| {});
        base.absorb(supplied);

        // Pause was kept, resume was replaced.
        base.pause_hook().unwrap()();
        base.resume_hook().unwrap()();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_drops_hooks() {
        let mut cfg = Configuration::new();
        cfg.on_pause(|| {});
        cfg.on_finish(|| {});
        cfg.clear();
        assert!(cfg.pause_hook().is_none());
        assert!(cfg.take_finish().is_none());
    }
}
