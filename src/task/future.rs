//! # Awaiting a task.
//!
//! `Task` implements [`IntoFuture`]: awaiting consumes the handle and yields
//! `Result<V, Rejection<E>>`. The bridge is a completion observer that parks
//! the outcome and wakes whichever executor polled last; the crate itself
//! schedules nothing.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::error::Rejection;
use crate::sync::AtomicCell;
use crate::task::Task;

struct FutureShared<V, E> {
    outcome: AtomicCell<Option<Result<V, Rejection<E>>>>,
    waker: AtomicCell<Option<Waker>>,
}

/// Future resolving to a task's outcome.
///
/// # Example
/// ```
/// use taskchain::Task;
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let task: Task<(), i32, String> = Task::from_value(5);
/// assert_eq!(task.await, Ok(5));
/// # });
/// ```
pub struct TaskFuture<V, E> {
    shared: Arc<FutureShared<V, E>>,
}

impl<V, E> std::fmt::Debug for TaskFuture<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFuture").finish_non_exhaustive()
    }
}

impl<P, V, E> IntoFuture for Task<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<V, Rejection<E>>;
    type IntoFuture = TaskFuture<V, E>;

    fn into_future(self) -> TaskFuture<V, E> {
        let shared = Arc::new(FutureShared {
            outcome: AtomicCell::new(None),
            waker: AtomicCell::new(None),
        });
        let parked = Arc::clone(&shared);
        self.observe(move |v, info| {
            let outcome = match (v, info) {
                (Some(v), _) => Ok(v.clone()),
                (_, Some(info)) => Err(Rejection::from(info.clone())),
                _ => Err(Rejection::RejectedSilently),
            };
            parked.outcome.write(Some(outcome));
            if let Some(waker) = parked.waker.take() {
                waker.wake();
            }
        });
        TaskFuture { shared }
    }
}

impl<V, E> Future for TaskFuture<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<V, Rejection<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.shared.outcome.take() {
            return Poll::Ready(outcome);
        }
        self.shared.waker.write(Some(cx.waker().clone()));
        // A completion racing the waker store is caught here; its wake call
        // may then hit the stale waker, which is harmless.
        match self.shared.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::IntoFuture;

    use crate::error::Rejection;
    use crate::task::test_support::controllable;
    use crate::task::Task;

    #[tokio::test]
    async fn test_await_terminal_task_resolves_immediately() {
        let task: Task<(), i32, String> = Task::from_value(5);
        assert_eq!(task.await, Ok(5));
    }

    #[tokio::test]
    async fn test_await_wakes_on_late_fulfillment() {
        let (task, emitter) = controllable::<(), i32, &str>();
        let handle = tokio::spawn(task.into_future());
        tokio::task::yield_now().await;

        emitter.progress(());
        emitter.fulfill(3);
        assert_eq!(handle.await.unwrap(), Ok(3));
    }

    #[tokio::test]
    async fn test_await_rejection_maps_to_rejection_error() {
        let task: Task<(), i32, String> = Task::from_error("boom".into());
        assert_eq!(task.await, Err(Rejection::Rejected("boom".into())));
    }

    #[tokio::test]
    async fn test_await_cancellation_maps_to_cancelled() {
        let (task, _emitter) = controllable::<(), i32, String>();
        task.cancel_with("shutdown".into());
        match task.await {
            Err(Rejection::Cancelled(reason)) => assert_eq!(reason.as_deref(), Some("shutdown")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
