//! # Chain operators: then / success / failure.
//!
//! Each operator registers a completion handler on the parent and returns a
//! fresh task that completes from the handler's result:
//!
//! ```text
//!  parent ──complete──► handler(value?, error?) ──► chain task
//!     ▲                                                 │
//!     └───────── pause / resume / cancel ◄──────────────┘   (Weak relay)
//! ```
//!
//! ## Rules
//! - `then` fires on any completion; `success` maps fulfillment and passes
//!   rejection through unchanged; `failure` recovers rejection (including
//!   cancellation) and passes fulfillment through unchanged.
//! - Value-returning variants forward the parent's progress to the chain
//!   task; `*_task` variants forward the **inner** task's progress instead.
//! - Controller calls on a chain task forward upstream through a [`Weak`]
//!   relay, so a chain never keeps its parent alive on its own. `*_task`
//!   variants additionally retarget control at the inner task once it exists.
//! - A parent that is already terminal runs the handler synchronously inside
//!   the registration call, so the chain completes before the operator
//!   returns.

use std::sync::{Arc, Weak};

use crate::error::ErrorInfo;
use crate::machine::{
    CompletionEntry, Configuration, Control, ControlRelay, StateMachine,
};
use crate::sync::HandlerToken;
use crate::task::Task;

/// Builds the chain-side machine: control hooks forward through `relay`,
/// which starts out targeting the parent.
pub(super) fn chain_machine<P, V, E, P2, V2, E2>(
    parent: &Arc<StateMachine<P, V, E>>,
) -> (Arc<StateMachine<P2, V2, E2>>, Arc<ControlRelay>)
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
    P2: Clone + Send + 'static,
    V2: Clone + Send + 'static,
    E2: Clone + Send + 'static,
{
    let relay = ControlRelay::new();
    relay.attach(Arc::downgrade(parent) as Weak<dyn Control>);

    let mut cfg = Configuration::new();
    let r = Arc::clone(&relay);
    cfg.on_pause(move || {
        r.pause_all();
    });
    let r = Arc::clone(&relay);
    cfg.on_resume(move || {
        r.resume_all();
    });
    let r = Arc::clone(&relay);
    cfg.on_cancel(move || {
        r.cancel_all();
    });

    let machine = StateMachine::create(false, false, cfg, None);
    (machine, relay)
}

/// Forwards every progress value of `source` into `sink`.
///
/// The handler holds `sink` strongly: a parent keeps its pending chain tasks
/// alive until it completes (the registry is cleared at the terminal
/// transition).
pub(super) fn pipe_progress<P, V, E, V2, E2>(
    source: &Arc<StateMachine<P, V, E>>,
    sink: &Arc<StateMachine<P, V2, E2>>,
) where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
    V2: Clone + Send + 'static,
    E2: Clone + Send + 'static,
{
    let sink = Arc::clone(sink);
    let _ = source.add_progress_handler(Arc::new(move |_, p: &P| {
        sink.handle_progress(p.clone());
    }));
}

/// Delivers a fulfillment to a chain machine, resuming it first so a chain
/// paused after its parent already resumed cannot strand the value.
pub(super) fn deliver_value<P, V, E>(machine: &Arc<StateMachine<P, V, E>>, value: V)
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    machine.handle_resume();
    machine.handle_fulfill(value);
}

/// Couples an inner task produced by a `*_task` closure to the chain machine:
/// control retargets at the inner task, its progress flows to the chain, and
/// its outcome completes the chain. The observer keeps the inner task alive
/// until it settles.
fn adopt_inner<P, V, E>(
    chain: &Arc<StateMachine<P, V, E>>,
    relay: &Arc<ControlRelay>,
    inner: Task<P, V, E>,
) where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    relay.attach(Arc::downgrade(&inner.machine) as Weak<dyn Control>);
    pipe_progress(&inner.machine, chain);

    let sink = Arc::clone(chain);
    let keep = inner.clone();
    inner.observe(move |v, info| {
        let _keep = keep;
        if let Some(v) = v {
            deliver_value(&sink, v.clone());
        } else if let Some(info) = info {
            sink.handle_reject_info(info.clone());
        }
    });
}

impl<P, V, E> Task<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Runs `f` on any completion of this task (fulfillment **or** failure)
    /// and fulfills the returned task with its result.
    ///
    /// ```
    /// use taskchain::Task;
    ///
    /// let parent: Task<(), i32, String> = Task::from_value(20);
    /// let doubled = parent.then(|v, _err| v.map(|v| v * 2));
    /// assert_eq!(doubled.value(), Some(Some(40)));
    /// ```
    pub fn then<V2, F>(&self, f: F) -> Task<P, V2, E>
    where
        V2: Clone + Send + 'static,
        F: FnOnce(Option<V>, Option<ErrorInfo<E>>) -> V2 + Send + 'static,
    {
        self.then_tracked(f).0
    }

    /// [`then`](Task::then), also returning the registration token so the
    /// handler can be detached with [`remove_then`](Task::remove_then) while
    /// the parent is still pending. `None` when the parent was already
    /// terminal (the chain completed synchronously).
    pub fn then_tracked<V2, F>(&self, f: F) -> (Task<P, V2, E>, Option<HandlerToken>)
    where
        V2: Clone + Send + 'static,
        F: FnOnce(Option<V>, Option<ErrorInfo<E>>) -> V2 + Send + 'static,
    {
        let (chain, relay) = chain_machine::<P, V, E, P, V2, E>(&self.machine);
        pipe_progress(&self.machine, &chain);

        let sink = Arc::clone(&chain);
        let orphan = Arc::downgrade(&chain);
        let token = self.machine.on_complete(CompletionEntry {
            handler: Box::new(move |v, info| {
                let out = f(v.cloned(), info.cloned());
                deliver_value(&sink, out);
            }),
            on_removed: Some(Box::new(move || {
                // Detach first: the orphan's cancellation is local cleanup
                // and must not run the cancel hook's upstream forwarding.
                relay.clear();
                if let Some(m) = orphan.upgrade() {
                    m.handle_cancel(None);
                }
            })),
        });
        (Task::from_parts("then", chain, None), token)
    }

    /// Monadic bind: runs `f` on any completion and settles the returned
    /// task from the task `f` produces.
    pub fn then_task<P2, V2, E2, F>(&self, f: F) -> Task<P2, V2, E2>
    where
        P2: Clone + Send + 'static,
        V2: Clone + Send + 'static,
        E2: Clone + Send + 'static,
        F: FnOnce(Option<V>, Option<ErrorInfo<E>>) -> Task<P2, V2, E2> + Send + 'static,
    {
        let (chain, relay) = chain_machine::<P, V, E, P2, V2, E2>(&self.machine);

        let sink = Arc::clone(&chain);
        let relay_out = Arc::clone(&relay);
        let orphan = Arc::downgrade(&chain);
        self.machine.on_complete(CompletionEntry {
            handler: Box::new(move |v, info| {
                let inner = f(v.cloned(), info.cloned());
                adopt_inner(&sink, &relay_out, inner);
            }),
            on_removed: Some(Box::new(move || {
                relay.clear();
                if let Some(m) = orphan.upgrade() {
                    m.handle_cancel(None);
                }
            })),
        });
        Task::from_parts("then", chain, None)
    }

    /// Maps fulfillment through `f`; rejection and cancellation pass through
    /// unchanged.
    ///
    /// ```
    /// use taskchain::Task;
    ///
    /// let ok: Task<(), i32, String> = Task::from_value(3);
    /// assert_eq!(ok.success(|v| v + 1).value(), Some(4));
    ///
    /// let err: Task<(), i32, String> = Task::from_error("boom".into());
    /// let mapped = err.success(|v| v + 1);
    /// assert_eq!(mapped.value(), None);
    /// assert_eq!(mapped.error_info().unwrap().error.as_deref(), Some("boom"));
    /// ```
    pub fn success<V2, F>(&self, f: F) -> Task<P, V2, E>
    where
        V2: Clone + Send + 'static,
        F: FnOnce(V) -> V2 + Send + 'static,
    {
        let (chain, _relay) = chain_machine::<P, V, E, P, V2, E>(&self.machine);
        pipe_progress(&self.machine, &chain);

        let sink = Arc::clone(&chain);
        self.machine
            .on_complete(CompletionEntry::observer(Box::new(move |v, info| {
                if let Some(v) = v {
                    deliver_value(&sink, f(v.clone()));
                } else if let Some(info) = info {
                    sink.handle_reject_info(info.clone());
                }
            })));
        Task::from_parts("success", chain, None)
    }

    /// Like [`success`](Task::success), but `f` returns a task whose outcome
    /// settles the chain.
    pub fn success_task<V2, F>(&self, f: F) -> Task<P, V2, E>
    where
        V2: Clone + Send + 'static,
        F: FnOnce(V) -> Task<P, V2, E> + Send + 'static,
    {
        let (chain, relay) = chain_machine::<P, V, E, P, V2, E>(&self.machine);

        let sink = Arc::clone(&chain);
        let relay_out = Arc::clone(&relay);
        self.machine
            .on_complete(CompletionEntry::observer(Box::new(move |v, info| {
                if let Some(v) = v {
                    adopt_inner(&sink, &relay_out, f(v.clone()));
                } else if let Some(info) = info {
                    sink.handle_reject_info(info.clone());
                }
            })));
        Task::from_parts("success", chain, None)
    }

    /// Recovers rejection (and cancellation) through `f`; fulfillment passes
    /// through unchanged.
    ///
    /// ```
    /// use taskchain::Task;
    ///
    /// let err: Task<(), i32, String> = Task::from_error("boom".into());
    /// assert_eq!(err.failure(|_info| -1).value(), Some(-1));
    /// ```
    pub fn failure<F>(&self, f: F) -> Task<P, V, E>
    where
        F: FnOnce(ErrorInfo<E>) -> V + Send + 'static,
    {
        let (chain, _relay) = chain_machine::<P, V, E, P, V, E>(&self.machine);
        pipe_progress(&self.machine, &chain);

        let sink = Arc::clone(&chain);
        self.machine
            .on_complete(CompletionEntry::observer(Box::new(move |v, info| {
                if let Some(v) = v {
                    deliver_value(&sink, v.clone());
                } else if let Some(info) = info {
                    deliver_value(&sink, f(info.clone()));
                }
            })));
        Task::from_parts("failure", chain, None)
    }

    /// Like [`failure`](Task::failure), but `f` returns a recovery task whose
    /// outcome settles the chain.
    pub fn failure_task<F>(&self, f: F) -> Task<P, V, E>
    where
        F: FnOnce(ErrorInfo<E>) -> Task<P, V, E> + Send + 'static,
    {
        let (chain, relay) = chain_machine::<P, V, E, P, V, E>(&self.machine);

        let sink = Arc::clone(&chain);
        let relay_out = Arc::clone(&relay);
        self.machine
            .on_complete(CompletionEntry::observer(Box::new(move |v, info| {
                if let Some(v) = v {
                    deliver_value(&sink, v.clone());
                } else if let Some(info) = info {
                    adopt_inner(&sink, &relay_out, f(info.clone()));
                }
            })));
        Task::from_parts("failure", chain, None)
    }
}
