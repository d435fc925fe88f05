//! # Task: the public handle.
//!
//! A [`Task`] wraps one state machine and exposes:
//! - construction from a producer closure ([`Task::new`], [`Task::paused`],
//!   [`TaskBuilder`]) or from an already-known outcome ([`Task::from_value`],
//!   [`Task::from_error`]);
//! - controller operations (`pause` / `resume` / `cancel`);
//! - observer registration (progress handlers, chained tasks);
//! - chain operators ([`then`](Task::then), [`success`](Task::success),
//!   [`failure`](Task::failure) and their task-returning variants);
//! - group combinators ([`all`](Task::all), [`any`](Task::any)) and
//!   [`retry`](Task::retry);
//! - async interop (`IntoFuture`, [`progress_stream`](Task::progress_stream)).
//!
//! ## Architecture
//! ```text
//!  producer closure ──(Emitter: progress/fulfill/reject)──► StateMachine
//!                     (Configuration: pause/resume/cancel/finish hooks)
//!        ▲                                                      │
//!        │ external scheduler drives the emitter                ▼
//!  Task::new(..)                                    handlers / chained tasks
//! ```
//!
//! The handle is `Clone`: clones share the same machine. Payload types are
//! fixed per task (`P` progress, `V` value, `E` error); composing tasks of
//! different error types requires an explicit mapping step in a `then`
//! closure.

mod chain;
mod future;
mod group;
mod retry;
mod stream;

pub use future::TaskFuture;
pub use group::GroupProgress;
pub use stream::ProgressStream;

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::ErrorInfo;
use crate::machine::{
    CompletionEntry, Configuration, Emitter, Producer, StateMachine, TaskState,
};
use crate::sync::HandlerToken;

/// # Handle to a single asynchronous result.
///
/// See the [module docs](self) for the full surface. The most common shapes:
///
/// ```
/// use taskchain::Task;
///
/// // Eagerly known outcome:
/// let done: Task<(), i32, String> = Task::from_value(3);
/// assert_eq!(done.value(), Some(3));
///
/// // Producer-driven, completing synchronously here for brevity:
/// let task: Task<u8, String, String> = Task::new(|emitter, _cfg| {
///     emitter.progress(100);
///     emitter.fulfill("done".to_string());
/// });
/// assert_eq!(task.value(), Some("done".to_string()));
/// ```
pub struct Task<P, V, E> {
    name: Cow<'static, str>,
    pub(crate) machine: Arc<StateMachine<P, V, E>>,
    /// Retained producer factory; lets [`Task::retry`] re-run the work.
    pub(crate) producer: Option<Arc<Producer<P, V, E>>>,
}

impl<P, V, E> Clone for Task<P, V, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            machine: Arc::clone(&self.machine),
            producer: self.producer.clone(),
        }
    }
}

impl<P, V, E> std::fmt::Debug for Task<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<P, V, E> Task<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    // ---- Construction ----

    /// Creates a task whose producer runs immediately (synchronously, before
    /// `new` returns, unless it defers work to an external scheduler via the
    /// cloned [`Emitter`]).
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn(Emitter<P, V, E>, &mut Configuration) + Send + Sync + 'static,
    {
        TaskBuilder::new().build(producer)
    }

    /// Creates a paused task; the producer is deferred until the first
    /// [`resume`](Task::resume).
    pub fn paused<F>(producer: F) -> Self
    where
        F: Fn(Emitter<P, V, E>, &mut Configuration) + Send + Sync + 'static,
    {
        TaskBuilder::new().paused(true).build(producer)
    }

    /// A task already fulfilled with `value`.
    ///
    /// Built without a producer closure, so the payload only needs the
    /// machine's `Clone + Send` bounds.
    pub fn from_value(value: V) -> Self {
        let machine = StateMachine::create(false, false, Configuration::new(), None);
        machine.handle_fulfill(value);
        Task::from_parts("value", machine, None)
    }

    /// A task already rejected with `error` (`cancelled == false`).
    pub fn from_error(error: E) -> Self {
        let machine = StateMachine::create(false, false, Configuration::new(), None);
        machine.handle_reject_info(ErrorInfo::rejected(error));
        Task::from_parts("error", machine, None)
    }

    /// Assembles a task around an existing machine (chains, groups, retry).
    pub(crate) fn from_parts(
        name: &'static str,
        machine: Arc<StateMachine<P, V, E>>,
        producer: Option<Arc<Producer<P, V, E>>>,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            machine,
            producer,
        }
    }

    // ---- Inspection ----

    /// The task's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.machine.state()
    }

    /// The fulfillment value, once fulfilled.
    pub fn value(&self) -> Option<V> {
        self.machine.value()
    }

    /// The terminal error record, once rejected or cancelled.
    pub fn error_info(&self) -> Option<ErrorInfo<E>> {
        self.machine.error_info()
    }

    /// The most recent cached progress value (absent before the first report,
    /// after completion, and always under weakified mode).
    pub fn progress(&self) -> Option<P> {
        self.machine.progress()
    }

    // ---- Controller operations ----

    /// Requests `Running → Paused`. Returns whether the transition took
    /// effect; the producer's pause hook fires on success.
    pub fn pause(&self) -> bool {
        self.machine.handle_pause()
    }

    /// Requests `Paused → Running`; the first call also runs a deferred
    /// producer. Returns whether anything happened.
    pub fn resume(&self) -> bool {
        self.machine.handle_resume()
    }

    /// Cancels the task without a reason payload.
    ///
    /// Cancellation is cooperative: the state flips and the cancel hook
    /// fires, but in-flight producer work must observe it and stop.
    pub fn cancel(&self) -> bool {
        self.machine.handle_cancel(None)
    }

    /// Cancels the task with a reason payload.
    pub fn cancel_with(&self, error: E) -> bool {
        self.machine.handle_cancel(Some(error))
    }

    // ---- Observer registration ----

    /// Registers a progress observer receiving `(old, new)` values.
    ///
    /// Returns `None` when the task is already terminal (progress can no
    /// longer occur). A removed handler is guaranteed never to fire again.
    pub fn on_progress<F>(&self, handler: F) -> Option<HandlerToken>
    where
        F: Fn(Option<&P>, &P) + Send + Sync + 'static,
    {
        self.machine.add_progress_handler(Arc::new(handler))
    }

    /// Removes a progress observer. No-op (`false`) for unknown tokens.
    pub fn remove_progress(&self, token: HandlerToken) -> bool {
        self.machine.remove_progress_handler(token)
    }

    /// Removes a completion handler registered through
    /// [`then_tracked`](Task::then_tracked) before it fired.
    ///
    /// The orphaned chain task is cancelled, so no pending chain work
    /// outlives its last observer. Returns `false` for unknown or
    /// already-fired tokens.
    pub fn remove_then(&self, token: HandlerToken) -> bool {
        match self.machine.remove_completion(token) {
            Some(entry) => {
                if let Some(orphan) = entry.on_removed {
                    orphan();
                }
                true
            }
            None => false,
        }
    }

    /// Registers a bare completion observer; runs it synchronously when the
    /// task is already terminal (and returns `None`).
    pub(crate) fn observe<F>(&self, handler: F) -> Option<HandlerToken>
    where
        F: FnOnce(Option<&V>, Option<&ErrorInfo<E>>) + Send + 'static,
    {
        self.machine
            .on_complete(CompletionEntry::observer(Box::new(handler)))
    }
}

/// # Builder for tasks with non-default knobs.
///
/// Mirrors [`Task::new`] but lets the caller name the task, start it paused,
/// or enable weakified mode (progress values are delivered but never cached,
/// bounding memory when progress history is not needed).
///
/// # Example
/// ```
/// use taskchain::{Task, TaskBuilder, TaskState};
///
/// let task: Task<u64, (), ()> = TaskBuilder::new()
///     .name("upload")
///     .paused(true)
///     .build(|_emitter, _cfg| { /* kicked off at first resume */ });
///
/// assert_eq!(task.name(), "upload");
/// assert_eq!(task.state(), TaskState::Paused);
/// ```
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    name: Cow<'static, str>,
    paused: bool,
    weakified: bool,
}

impl TaskBuilder {
    /// Creates a builder with defaults: named `"task"`, running, caching
    /// progress.
    pub fn new() -> Self {
        Self {
            name: Cow::Borrowed("task"),
            paused: false,
            weakified: false,
        }
    }

    /// Sets the diagnostic name.
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Starts the task paused; the producer runs at the first resume.
    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Disables progress caching (observers still receive every value).
    pub fn weakified(mut self, weakified: bool) -> Self {
        self.weakified = weakified;
        self
    }

    /// Builds the task around `producer`.
    pub fn build<P, V, E, F>(self, producer: F) -> Task<P, V, E>
    where
        P: Clone + Send + 'static,
        V: Clone + Send + 'static,
        E: Clone + Send + 'static,
        F: Fn(Emitter<P, V, E>, &mut Configuration) + Send + Sync + 'static,
    {
        let producer: Arc<Producer<P, V, E>> = Arc::new(producer);
        let machine = StateMachine::create(
            self.paused,
            self.weakified,
            Configuration::new(),
            Some(Arc::clone(&producer)),
        );
        if !self.paused {
            machine.handle_resume();
        }
        Task {
            name: self.name,
            machine,
            producer: Some(producer),
        }
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::sync::AtomicCell;

    /// A running task plus the emitter driving it, for tests that complete
    /// tasks after observers are in place.
    pub fn controllable<P, V, E>() -> (Task<P, V, E>, Emitter<P, V, E>)
    where
        P: Clone + Send + 'static,
        V: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        let slot: Arc<AtomicCell<Option<Emitter<P, V, E>>>> = Arc::new(AtomicCell::new(None));
        let sink = Arc::clone(&slot);
        let task = Task::new(move |emitter, _cfg| {
            sink.write(Some(emitter));
        });
        let emitter = slot.take().expect("producer ran synchronously");
        (task, emitter)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::controllable;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_from_value_is_synchronously_fulfilled() {
        let task: Task<(), &str, &str> = Task::from_value("v");
        assert_eq!(task.state(), TaskState::Fulfilled);
        assert_eq!(task.value(), Some("v"));
        assert_eq!(task.error_info(), None);
    }

    #[test]
    fn test_from_error_is_synchronously_rejected() {
        let task: Task<(), &str, &str> = Task::from_error("e");
        assert_eq!(task.state(), TaskState::Rejected);
        assert_eq!(task.value(), None);
        assert_eq!(task.error_info(), Some(ErrorInfo::rejected("e")));
    }

    #[test]
    fn test_terminal_constructors_accept_send_only_payloads() {
        // Cell is Send but not Sync; only producer closures demand Sync
        // captures, so eager construction must stay free of that bound.
        use std::cell::Cell;

        let done: Task<(), Cell<i32>, Cell<i32>> = Task::from_value(Cell::new(3));
        assert_eq!(done.value().map(|c| c.get()), Some(3));

        let failed: Task<(), Cell<i32>, Cell<i32>> = Task::from_error(Cell::new(9));
        let info = failed.error_info().unwrap();
        assert_eq!(info.error.map(|c| c.get()), Some(9));
        assert!(!info.cancelled);
    }

    #[test]
    fn test_producer_completes_from_another_thread() {
        let (task, emitter) = controllable::<u32, &str, &str>();
        assert_eq!(task.state(), TaskState::Running);

        let handle = std::thread::spawn(move || {
            emitter.progress(50);
            emitter.fulfill("done");
        });
        handle.join().unwrap();

        assert_eq!(task.state(), TaskState::Fulfilled);
        assert_eq!(task.value(), Some("done"));
    }

    #[test]
    fn test_pause_resume_cycle_fires_hooks_each_time() {
        let pauses = Arc::new(AtomicUsize::new(0));
        let resumes = Arc::new(AtomicUsize::new(0));
        let (p, r) = (Arc::clone(&pauses), Arc::clone(&resumes));
        let task: Task<(), (), ()> = Task::new(move |_emitter, cfg| {
            let p = Arc::clone(&p);
            cfg.on_pause(move || {
                p.fetch_add(1, Ordering::SeqCst);
            });
            let r = Arc::clone(&r);
            cfg.on_resume(move || {
                r.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert!(task.pause());
        assert!(!task.pause()); // already paused
        assert!(task.resume());
        assert!(task.pause());
        assert!(task.resume());
        assert_eq!(pauses.load(Ordering::SeqCst), 2);
        assert_eq!(resumes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancel_from_paused_fires_hook_exactly_once() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&cancels);
        let task: Task<(), (), &str> = Task::new(move |_emitter, cfg| {
            let c = Arc::clone(&c);
            cfg.on_cancel(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert!(task.pause());
        assert!(task.cancel());
        assert_eq!(task.state(), TaskState::Cancelled);
        assert!(!task.cancel());
        assert!(!task.resume());
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_with_reason() {
        let (task, _emitter) = controllable::<(), (), &str>();
        assert!(task.cancel_with("shutdown"));
        let info = task.error_info().unwrap();
        assert!(info.cancelled);
        assert_eq!(info.error, Some("shutdown"));
    }

    #[test]
    fn test_paused_construction_defers_producer() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let task: Task<(), u32, ()> = Task::paused(move |emitter, _cfg| {
            r.fetch_add(1, Ordering::SeqCst);
            emitter.fulfill(1);
        });

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(task.state(), TaskState::Paused);
        assert!(task.resume());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(task.value(), Some(1));
        // The producer never runs twice.
        assert!(!task.resume());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_builder_weakified_delivers_but_never_caches() {
        let (task, emitter) = {
            let slot: Arc<crate::sync::AtomicCell<Option<Emitter<u32, (), ()>>>> =
                Arc::new(crate::sync::AtomicCell::new(None));
            let sink = Arc::clone(&slot);
            let task: Task<u32, (), ()> = TaskBuilder::new()
                .weakified(true)
                .build(move |emitter, _cfg| sink.write(Some(emitter)));
            (task, slot.take().unwrap())
        };

        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        task.on_progress(move |old, new| {
            assert!(old.is_none());
            s.fetch_add(*new as usize, Ordering::SeqCst);
        });

        emitter.progress(1);
        emitter.progress(2);
        assert_eq!(task.progress(), None);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_progress_handler_removal_wins_over_later_emissions() {
        let (task, emitter) = controllable::<u32, (), ()>();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let token = task
            .on_progress(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        emitter.progress(1);
        assert!(task.remove_progress(token));
        emitter.progress(2);
        emitter.progress(3);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_the_machine() {
        let (task, emitter) = controllable::<(), u32, ()>();
        let other = task.clone();
        emitter.fulfill(9);
        assert_eq!(other.value(), Some(9));
        assert_eq!(other.name(), task.name());
    }
}
