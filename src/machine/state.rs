//! # Task lifecycle states.
//!
//! The canonical state diagram (initial state is `Running`, or `Paused` when
//! constructed paused):
//!
//! ```text
//! Paused  ──resume──► Running
//! Running ──pause───► Paused
//! Running ──progress► Running        (self-loop, observers notified)
//! Running ──fulfill─► Fulfilled
//! Running/Paused ──reject──► Rejected
//! Running/Paused ──cancel──► Cancelled
//! ```
//!
//! ## Rules
//! - `Fulfilled`, `Rejected` and `Cancelled` are **absorbing**: no transition
//!   leaves them, which is what guarantees at-most-once completion.
//! - `Cancelled` is a specialization of rejection: the machine stores a
//!   rejected phase whose [`ErrorInfo`](crate::ErrorInfo) has
//!   `cancelled == true` and reports it as `Cancelled`.

/// Observable lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Logically suspended; the producer is expected to hold work.
    Paused,
    /// Actively producing; progress and fulfillment are accepted.
    Running,
    /// Terminal: completed with a value.
    Fulfilled,
    /// Terminal: completed with a domain error (or no detail at all).
    Rejected,
    /// Terminal: rejection flagged as deliberate abandonment.
    Cancelled,
}

impl TaskState {
    /// True for `Fulfilled`, `Rejected` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Fulfilled | TaskState::Rejected | TaskState::Cancelled
        )
    }

    /// True while the task may still complete (`Paused` or `Running`).
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskState::Paused => "paused",
            TaskState::Running => "running",
            TaskState::Fulfilled => "fulfilled",
            TaskState::Rejected => "rejected",
            TaskState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}
