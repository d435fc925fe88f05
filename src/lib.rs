//! # taskchain
//!
//! **Taskchain** is a composable asynchronous-result primitive for Rust.
//!
//! A [`Task<P, V, E>`] represents one unit of work that reports progress
//! values of type `P` while it runs and eventually settles exactly once:
//! fulfilled with a `V`, rejected with an [`ErrorInfo<E>`], or cancelled.
//! Tasks pause, resume and cancel cooperatively, chain into pipelines, and
//! combine into groups. The crate schedules nothing itself: producers hand
//! their [`Emitter`] to whatever executor or thread actually does the work.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌──────────────────────────┐
//!  │ producer closure         │  registers hooks in Configuration,
//!  │ (runs at creation, or at │  drives the machine through Emitter:
//!  │  first resume if paused) │  progress / fulfill / reject
//!  └───────────┬──────────────┘
//!              ▼
//!  ┌───────────────────────────────────────────────────────────┐
//!  │ StateMachine (per task)                                   │
//!  │  - phase: Paused | Running | Fulfilled | Rejected         │
//!  │  - cached value / ErrorInfo / latest progress             │
//!  │  - Configuration (pause/resume/cancel/finish hooks)       │
//!  │  - HandlerRegistry (progress + completion observers)      │
//!  └───────┬────────────────┬──────────────────┬───────────────┘
//!          ▼                ▼                  ▼
//!   progress handlers   chain tasks       group / retry tasks
//!   ProgressStream      (then/success/    (all / any / retry,
//!   TaskFuture           failure)          control fan-out)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Paused  ──resume──► Running ──fulfill──► Fulfilled
//! Running ──pause───► Paused
//! Running ──progress► Running (self-loop, observers notified)
//! Running/Paused ──reject──► Rejected
//! Running/Paused ──cancel──► Cancelled
//!
//! Terminal transition, in order:
//!   ├─► cancel hook (rejection and cancellation only, once)
//!   ├─► completion handlers (drained; late registrations run inline)
//!   ├─► finish hook (any outcome, exactly once)
//!   └─► registries, hooks, deferred producer, progress cache cleared
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types                                |
//! |-----------------|----------------------------------------------------------|------------------------------------------|
//! | **Tasks**       | Create, inspect, pause/resume/cancel one unit of work.   | [`Task`], [`TaskBuilder`], [`TaskState`] |
//! | **Producers**   | Drive a task from any thread or executor.                | [`Emitter`], [`Configuration`]           |
//! | **Chains**      | Derive tasks from outcomes, with upstream control.       | [`Task::then`], [`Task::success`], [`Task::failure`] |
//! | **Groups**      | Join or race homogeneous tasks.                          | [`Task::all`], [`Task::any`], [`GroupProgress`] |
//! | **Retry**       | Re-run a failed producer a bounded number of times.      | [`Task::retry`]                          |
//! | **Async**       | Await outcomes, stream progress.                         | [`TaskFuture`], [`ProgressStream`]       |
//! | **Errors**      | Typed terminal records and a std-error surface.          | [`ErrorInfo`], [`Rejection`]             |
//!
//! ## Example
//! ```rust
//! use taskchain::{Task, TaskState};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The producer hands its emitter to an external scheduler; here a
//!     // tokio task stands in for one.
//!     let download: Task<u8, Vec<u8>, String> = Task::new(|emitter, _cfg| {
//!         tokio::spawn(async move {
//!             for pct in [25u8, 50, 75, 100] {
//!                 emitter.progress(pct);
//!             }
//!             emitter.fulfill(vec![1, 2, 3]);
//!         });
//!     });
//!
//!     // Derive a chain: runs when the download settles.
//!     let size = download.success(|bytes| bytes.len());
//!
//!     assert_eq!(size.clone().await?, 3);
//!     assert_eq!(size.state(), TaskState::Fulfilled);
//!     Ok(())
//! }
//! ```

mod error;
mod machine;
mod sync;
mod task;

// ---- Public re-exports ----

pub use error::{ErrorInfo, Rejection};
pub use machine::{Configuration, Emitter, TaskState};
pub use sync::{AtomicCell, HandlerRegistry, HandlerToken};
pub use task::{GroupProgress, ProgressStream, Task, TaskBuilder, TaskFuture};
