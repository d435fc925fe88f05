//! # Retry: re-run a failed producer.
//!
//! [`Task::retry`] wraps a task in a fresh one that survives up to
//! `extra_attempts` rejections by re-invoking the retained producer closure:
//!
//! ```text
//!  attempt 0 (the original task) ──reject──► attempt 1 ──reject──► ...
//!       │fulfill                                 │fulfill
//!       └────────────► retry task ◄──────────────┘
//! ```
//!
//! ## Rules
//! - Only plain rejection triggers a re-run; cancellation is deliberate and
//!   settles the retry task immediately.
//! - Progress and fulfillment of whichever attempt is current flow to the
//!   retry task; controller calls target every attempt spawned so far.
//! - Tasks without a retained producer (chains, groups) cannot re-run
//!   anything; `retry` then degrades to a passthrough of the one outcome.

use std::sync::{Arc, Weak};

use crate::machine::{
    CompletionEntry, Configuration, Control, ControlRelay, Producer, StateMachine,
};
use crate::task::chain::{chain_machine, deliver_value, pipe_progress};
use crate::task::Task;

/// Observes one attempt: fulfillment settles the retry task, rejection either
/// spawns the next attempt from `factory` or, when `remaining` is exhausted
/// (or the attempt was cancelled), settles the retry task with the record.
fn wire_attempt<P, V, E>(
    attempt: &Arc<StateMachine<P, V, E>>,
    retry: Arc<StateMachine<P, V, E>>,
    relay: Arc<ControlRelay>,
    factory: Arc<Producer<P, V, E>>,
    remaining: usize,
) where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    attempt.on_complete(CompletionEntry::observer(Box::new(move |v, info| {
        if let Some(v) = v {
            deliver_value(&retry, v.clone());
        } else if let Some(info) = info {
            if info.cancelled || remaining == 0 {
                retry.handle_reject_info(info.clone());
            } else {
                let next = StateMachine::create(
                    false,
                    false,
                    Configuration::new(),
                    Some(Arc::clone(&factory)),
                );
                relay.attach(Arc::downgrade(&next) as Weak<dyn Control>);
                pipe_progress(&next, &retry);
                wire_attempt(&next, retry, relay, factory, remaining - 1);
                next.handle_resume();
            }
        }
    })));
}

impl<P, V, E> Task<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Returns a task that re-runs this task's producer on rejection, up to
    /// `extra_attempts` additional times.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use taskchain::Task;
    ///
    /// let attempts = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&attempts);
    /// let flaky: Task<(), &str, &str> = Task::new(move |emitter, _| {
    ///     if counter.fetch_add(1, Ordering::SeqCst) < 2 {
    ///         emitter.reject("flaky");
    ///     } else {
    ///         emitter.fulfill("finally");
    ///     }
    /// });
    ///
    /// let sturdy = flaky.retry(2);
    /// assert_eq!(sturdy.value(), Some("finally"));
    /// assert_eq!(attempts.load(Ordering::SeqCst), 3);
    /// ```
    pub fn retry(&self, extra_attempts: usize) -> Task<P, V, E> {
        let (retry_m, relay) = chain_machine::<P, V, E, P, V, E>(&self.machine);
        pipe_progress(&self.machine, &retry_m);

        match self.producer.clone() {
            Some(factory) => {
                wire_attempt(
                    &self.machine,
                    Arc::clone(&retry_m),
                    relay,
                    factory,
                    extra_attempts,
                );
            }
            None => {
                let sink = Arc::clone(&retry_m);
                self.observe(move |v, info| {
                    if let Some(v) = v {
                        deliver_value(&sink, v.clone());
                    } else if let Some(info) = info {
                        sink.handle_reject_info(info.clone());
                    }
                });
            }
        }
        Task::from_parts("retry", retry_m, None)
    }
}
