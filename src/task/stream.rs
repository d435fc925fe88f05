//! # Streaming progress values.
//!
//! [`Task::progress_stream`] bridges a task's progress callbacks into a
//! [`futures::Stream`]: every reported value is buffered in arrival order,
//! and the stream terminates once the task settles. Dropping the stream
//! unregisters its handler, so an abandoned consumer costs nothing.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures::Stream;

use crate::sync::AtomicCell;
use crate::task::Task;

struct StreamState<P> {
    queue: VecDeque<P>,
    waker: Option<Waker>,
    closed: bool,
}

/// Stream of a task's progress values; ends when the task settles.
///
/// Values reported before the task settled are still drained after the end
/// was observed internally, so no progress is lost to the race between the
/// last report and completion.
pub struct ProgressStream<P> {
    shared: Arc<AtomicCell<StreamState<P>>>,
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl<P> std::fmt::Debug for ProgressStream<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStream").finish_non_exhaustive()
    }
}

impl<P> Drop for ProgressStream<P> {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl<P> Stream for ProgressStream<P>
where
    P: Clone + Send + 'static,
{
    type Item = P;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<P>> {
        self.shared
            .modify(|state| {
                if let Some(value) = state.queue.pop_front() {
                    return Some(Poll::Ready(Some(value)));
                }
                if state.closed {
                    return Some(Poll::Ready(None));
                }
                state.waker = Some(cx.waker().clone());
                Some(Poll::Pending)
            })
            .unwrap_or(Poll::Pending)
    }
}

impl<P, V, E> Task<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Returns a stream of this task's progress values.
    ///
    /// A terminal task yields an immediately-ended stream. Multiple streams
    /// over one task observe the same values independently.
    pub fn progress_stream(&self) -> ProgressStream<P> {
        let shared = Arc::new(AtomicCell::new(StreamState {
            queue: VecDeque::new(),
            waker: None,
            closed: false,
        }));

        let sink = Arc::clone(&shared);
        let token = self.on_progress(move |_, new: &P| {
            let waker = sink
                .modify(|state| {
                    state.queue.push_back(new.clone());
                    Some(state.waker.take())
                })
                .flatten();
            if let Some(waker) = waker {
                waker.wake();
            }
        });

        let sink = Arc::clone(&shared);
        self.observe(move |_, _| {
            let waker = sink
                .modify(|state| {
                    state.closed = true;
                    Some(state.waker.take())
                })
                .flatten();
            if let Some(waker) = waker {
                waker.wake();
            }
        });

        // No progress can ever arrive on a terminal task; the completion
        // observer above already closed the state synchronously.
        let unregister = token.map(|token| {
            let machine = Arc::downgrade(&self.machine);
            Box::new(move || {
                if let Some(machine) = machine.upgrade() {
                    machine.remove_progress_handler(token);
                }
            }) as Box<dyn FnOnce() + Send>
        });

        ProgressStream { shared, unregister }
    }
}
