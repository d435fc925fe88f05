//! # The task lifecycle engine.
//!
//! [`StateMachine`] owns the canonical state of one task: its phase, the
//! cached terminal value / error record, the cached progress, the producer's
//! [`Configuration`] hooks, the deferred producer closure, and the two handler
//! registries (progress observers, completion observers). Every transition
//! goes through one of the `handle_*` entry points.
//!
//! ## Locking discipline
//! The machine is guarded by a reentrant lock around a `RefCell`:
//!
//! ```text
//! ReentrantMutex<RefCell<Inner>>
//!   │
//!   ├─ state mutation:     short RefCell borrows inside the lock
//!   ├─ handler dispatch:   snapshot/drain under the lock, invoke AFTER the
//!   │                      guard is released (copy-and-clear)
//!   └─ deferred producer:  runs under the lock; the reentrant lock lets it
//!                          emit progress/fulfill/reject synchronously
//! ```
//!
//! Handlers routinely call back into machines (a chain handler fulfills its
//! child, a group handler cancels siblings, controller forwarding runs
//! upstream). Invoking them outside the guard rules out lock-order inversions
//! between machines; the reentrant lock covers the one path that must run
//! callbacks while locked — the deferred producer at first resume.
//!
//! ## Rules
//! - Handlers observe progress/fulfill/reject calls in the order one producer
//!   emits them (mutation is serialized and dispatch runs inline on the
//!   emitting thread); concurrent emitters have no cross-thread order.
//! - Exactly one completion dispatch ever occurs; afterwards both registries
//!   are empty and every registration attempt is refused (the façade runs the
//!   handler synchronously instead).
//! - The `cancel` hook fires on every non-fulfilling terminal path, before
//!   completion handlers; the `finish` hook fires after them, exactly once.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;

use crate::error::ErrorInfo;
use crate::machine::config::Configuration;
use crate::machine::control::Control;
use crate::machine::state::TaskState;
use crate::sync::{HandlerRegistry, HandlerToken};

/// Progress observer: receives `(old, new)` progress values.
pub(crate) type ProgressHandler<P> = Arc<dyn Fn(Option<&P>, &P) + Send + Sync>;

/// Completion observer: receives whichever of value / error record is set.
pub(crate) type CompletionFn<V, E> =
    Box<dyn FnOnce(Option<&V>, Option<&ErrorInfo<E>>) + Send>;

/// Producer closure. `Fn` rather than `FnOnce` so the retry combinator can
/// re-invoke the retained factory; the machine still runs it at most once.
pub(crate) type Producer<P, V, E> = dyn Fn(Emitter<P, V, E>, &mut Configuration) + Send + Sync;

type OnRemoved = Box<dyn FnOnce() + Send>;

/// One registered completion observer.
///
/// `on_removed` fires only on explicit removal before completion; the façade
/// uses it to cancel a chain task orphaned by
/// [`remove_then`](crate::Task::remove_then).
pub(crate) struct CompletionEntry<V, E> {
    pub handler: CompletionFn<V, E>,
    pub on_removed: Option<OnRemoved>,
}

impl<V, E> CompletionEntry<V, E> {
    pub fn observer(handler: CompletionFn<V, E>) -> Self {
        Self {
            handler,
            on_removed: None,
        }
    }
}

/// Internal phase. `Cancelled` is not a phase: it is reported when the
/// rejected record carries `cancelled == true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Paused,
    Running,
    Fulfilled,
    Rejected,
}

impl Phase {
    fn is_terminal(self) -> bool {
        matches!(self, Phase::Fulfilled | Phase::Rejected)
    }
}

struct Inner<P, V, E> {
    phase: Phase,
    /// When set, progress values are delivered but never cached.
    weakified: bool,
    progress: Option<P>,
    value: Option<V>,
    error_info: Option<ErrorInfo<E>>,
    config: Configuration,
    /// Deferred producer; runs exactly once, at first resume.
    init_resume: Option<Arc<Producer<P, V, E>>>,
    progress_handlers: HandlerRegistry<ProgressHandler<P>>,
    completion_handlers: HandlerRegistry<CompletionEntry<V, E>>,
}

impl<P, V, E> Inner<P, V, E> {
    fn report_state(&self) -> TaskState {
        match self.phase {
            Phase::Paused => TaskState::Paused,
            Phase::Running => TaskState::Running,
            Phase::Fulfilled => TaskState::Fulfilled,
            Phase::Rejected => match &self.error_info {
                Some(info) if info.cancelled => TaskState::Cancelled,
                _ => TaskState::Rejected,
            },
        }
    }
}

/// Everything `finish` must run after the borrow is dropped.
struct FinishDispatch<V, E> {
    cancel_hook: Option<OnRemoved>,
    entries: Vec<CompletionEntry<V, E>>,
    finish_hook: Option<OnRemoved>,
}

/// Canonical state owner for one task.
pub(crate) struct StateMachine<P, V, E> {
    weak_self: Weak<Self>,
    inner: ReentrantMutex<RefCell<Inner<P, V, E>>>,
}

impl<P, V, E> StateMachine<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a machine. The caller decides whether to kick off the deferred
    /// producer immediately (non-paused construction) or leave it for the
    /// first explicit resume.
    pub fn create(
        paused: bool,
        weakified: bool,
        config: Configuration,
        producer: Option<Arc<Producer<P, V, E>>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            inner: ReentrantMutex::new(RefCell::new(Inner {
                phase: if paused { Phase::Paused } else { Phase::Running },
                weakified,
                progress: None,
                value: None,
                error_info: None,
                config,
                init_resume: producer,
                progress_handlers: HandlerRegistry::new(),
                completion_handlers: HandlerRegistry::new(),
            })),
        })
    }

    // ---- Inspection ----

    pub fn state(&self) -> TaskState {
        let guard = self.inner.lock();
        let state = guard.borrow().report_state();
        state
    }

    pub fn value(&self) -> Option<V> {
        let guard = self.inner.lock();
        let value = guard.borrow().value.clone();
        value
    }

    pub fn error_info(&self) -> Option<ErrorInfo<E>> {
        let guard = self.inner.lock();
        let info = guard.borrow().error_info.clone();
        info
    }

    pub fn progress(&self) -> Option<P> {
        let guard = self.inner.lock();
        let progress = guard.borrow().progress.clone();
        progress
    }

    // ---- Handler registration ----

    /// Registers a progress observer; refused once terminal.
    pub fn add_progress_handler(&self, handler: ProgressHandler<P>) -> Option<HandlerToken> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.phase.is_terminal() {
            return None;
        }
        Some(inner.progress_handlers.insert(handler))
    }

    pub fn remove_progress_handler(&self, token: HandlerToken) -> bool {
        let guard = self.inner.lock();
        let removed = guard.borrow_mut().progress_handlers.remove(token).is_some();
        removed
    }

    /// Registers a completion observer, or — when the machine is already
    /// terminal — runs it synchronously inside the same critical section and
    /// returns `None`. The atomicity here is what preserves single-evaluation
    /// semantics for chains built on finished parents.
    pub fn on_complete(&self, entry: CompletionEntry<V, E>) -> Option<HandlerToken> {
        let cached = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if inner.phase.is_terminal() {
                (inner.value.clone(), inner.error_info.clone())
            } else {
                return Some(inner.completion_handlers.insert(entry));
            }
        };
        (entry.handler)(cached.0.as_ref(), cached.1.as_ref());
        None
    }

    /// Removes a completion observer, returning the entry so the caller can
    /// fire its orphan-cleanup hook outside this machine.
    pub fn remove_completion(&self, token: HandlerToken) -> Option<CompletionEntry<V, E>> {
        let guard = self.inner.lock();
        let entry = guard.borrow_mut().completion_handlers.remove(token);
        entry
    }

    // ---- Transitions ----

    /// Self-loop on `Running`: caches the value (unless weakified) and
    /// notifies every progress observer with `(old, new)`. No-op otherwise.
    pub fn handle_progress(&self, progress: P) {
        let (old, handlers) = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if inner.phase != Phase::Running {
                return;
            }
            let old = if inner.weakified {
                None
            } else {
                inner.progress.replace(progress.clone())
            };
            let handlers: Vec<ProgressHandler<P>> =
                inner.progress_handlers.iter().cloned().collect();
            (old, handlers)
        };
        for handler in handlers {
            handler(old.as_ref(), &progress);
        }
    }

    /// `Running → Fulfilled`. No-op from any other phase, including `Paused`
    /// (a producer must resume before fulfilling).
    pub fn handle_fulfill(&self, value: V) -> bool {
        let dispatch = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if inner.phase != Phase::Running {
                return false;
            }
            inner.phase = Phase::Fulfilled;
            inner.value = Some(value.clone());
            Self::collect_finish(&mut inner, false)
        };
        Self::run_finish(dispatch, Some(&value), None);
        true
    }

    /// `Running|Paused → Rejected` (reported as `Cancelled` when the record
    /// says so). No-op once terminal.
    pub fn handle_reject_info(&self, info: ErrorInfo<E>) -> bool {
        let dispatch = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if inner.phase.is_terminal() {
                return false;
            }
            inner.phase = Phase::Rejected;
            inner.error_info = Some(info.clone());
            Self::collect_finish(&mut inner, true)
        };
        Self::run_finish(dispatch, None, Some(&info));
        true
    }

    /// Cancellation: a rejection whose record is flagged `cancelled`.
    pub fn handle_cancel(&self, error: Option<E>) -> bool {
        self.handle_reject_info(ErrorInfo::cancelled(error))
    }

    /// `Running → Paused`, firing the configured pause hook on success.
    pub fn handle_pause(&self) -> bool {
        let hook = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if inner.phase != Phase::Running {
                return false;
            }
            inner.phase = Phase::Paused;
            inner.config.pause_hook()
        };
        if let Some(hook) = hook {
            hook();
        }
        true
    }

    /// First call with a pending deferred producer: runs it with the phase
    /// temporarily forced to `Running` (resume hook **not** fired) so the
    /// closure may emit progress / fulfill / reject, restores the prior phase
    /// unless the closure already finished the task, then — if constructed
    /// paused — performs the regular `Paused → Running` transition, which
    /// fires the freshly registered resume hook. Later calls take only the
    /// regular path. Returns whether anything happened.
    pub fn handle_resume(&self) -> bool {
        let guard = self.inner.lock();
        let producer = {
            let mut inner = guard.borrow_mut();
            inner.init_resume.take()
        };
        let Some(producer) = producer else {
            drop(guard);
            return self.resume_transition();
        };

        let prior = {
            let mut inner = guard.borrow_mut();
            std::mem::replace(&mut inner.phase, Phase::Running)
        };

        let Some(machine) = self.weak_self.upgrade() else {
            return false;
        };
        let mut supplied = Configuration::new();
        producer(Emitter { machine }, &mut supplied);

        let finished_as = {
            let mut inner = guard.borrow_mut();
            if inner.phase.is_terminal() {
                Some(inner.phase)
            } else {
                inner.config.absorb(std::mem::take(&mut supplied));
                inner.phase = prior;
                None
            }
        };

        drop(guard);
        match finished_as {
            Some(phase) => {
                // The producer completed the task synchronously, before its
                // hooks could be absorbed; honor them now.
                if phase == Phase::Rejected {
                    if let Some(cancel) = supplied.take_cancel() {
                        cancel();
                    }
                }
                if let Some(finish) = supplied.take_finish() {
                    finish();
                }
            }
            None => {
                if prior == Phase::Paused {
                    self.resume_transition();
                }
            }
        }
        true
    }

    /// Regular `Paused → Running` transition, firing the resume hook.
    fn resume_transition(&self) -> bool {
        let hook = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if inner.phase != Phase::Paused {
                return false;
            }
            inner.phase = Phase::Running;
            inner.config.resume_hook()
        };
        if let Some(hook) = hook {
            hook();
        }
        true
    }

    // ---- Terminal dispatch ----

    /// Gathers everything the terminal transition must run, while clearing
    /// both registries, the deferred producer, the progress cache and the
    /// configuration. Runs under the borrow; the actual invocation happens in
    /// [`Self::run_finish`] with the borrow dropped.
    fn collect_finish(inner: &mut Inner<P, V, E>, fire_cancel: bool) -> FinishDispatch<V, E> {
        let cancel_hook = if fire_cancel {
            inner.config.take_cancel()
        } else {
            None
        };
        let entries = inner.completion_handlers.drain();
        inner.progress_handlers.clear();
        let finish_hook = inner.config.take_finish();
        inner.config.clear();
        inner.init_resume = None;
        inner.progress = None;
        FinishDispatch {
            cancel_hook,
            entries,
            finish_hook,
        }
    }

    fn run_finish(
        dispatch: FinishDispatch<V, E>,
        value: Option<&V>,
        info: Option<&ErrorInfo<E>>,
    ) {
        if let Some(cancel) = dispatch.cancel_hook {
            cancel();
        }
        for entry in dispatch.entries {
            // `on_removed` hooks die here unfired: completion is not removal.
            (entry.handler)(value, info);
        }
        if let Some(finish) = dispatch.finish_hook {
            finish();
        }
    }
}

impl<P, V, E> Control for StateMachine<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn control_pause(&self) -> bool {
        self.handle_pause()
    }

    fn control_resume(&self) -> bool {
        self.handle_resume()
    }

    fn control_cancel(&self) -> bool {
        self.handle_cancel(None)
    }
}

/// # Producer-side handle to a machine.
///
/// The producer closure receives an `Emitter` and may clone it into external
/// schedulers; the machine stays alive while any emitter for pending work
/// exists. All methods are safe to call from any thread, any number of times —
/// calls that lost the completion race are no-ops returning `false`.
///
/// # Example
/// ```
/// use taskchain::Task;
///
/// let task: Task<u8, &str, &str> = Task::new(|emitter, _cfg| {
///     emitter.progress(50);
///     emitter.fulfill("done");
///     // Late calls are no-ops:
///     assert!(!emitter.reject("too late"));
/// });
/// assert_eq!(task.value(), Some("done"));
/// ```
pub struct Emitter<P, V, E> {
    pub(crate) machine: Arc<StateMachine<P, V, E>>,
}

impl<P, V, E> Clone for Emitter<P, V, E> {
    fn clone(&self) -> Self {
        Self {
            machine: Arc::clone(&self.machine),
        }
    }
}

impl<P, V, E> std::fmt::Debug for Emitter<P, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

impl<P, V, E> Emitter<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Emits a progress value; delivered only while the task is running.
    pub fn progress(&self, progress: P) {
        self.machine.handle_progress(progress);
    }

    /// Fulfills the task. Returns whether the transition took effect.
    pub fn fulfill(&self, value: V) -> bool {
        self.machine.handle_fulfill(value)
    }

    /// Rejects the task with an error payload.
    pub fn reject(&self, error: E) -> bool {
        self.machine.handle_reject_info(ErrorInfo::rejected(error))
    }

    /// Rejects the task without a payload (legal "no-detail" rejection).
    pub fn reject_silently(&self) -> bool {
        self.machine.handle_reject_info(ErrorInfo::silent())
    }

    /// Rejects with a full error record (used when forwarding another task's
    /// outcome, preserving its `cancelled` flag).
    pub fn reject_info(&self, info: ErrorInfo<E>) -> bool {
        self.machine.handle_reject_info(info)
    }

    /// Current observable state; lets producers honor pause/cancel
    /// cooperatively between units of work.
    pub fn state(&self) -> TaskState {
        self.machine.state()
    }
}
