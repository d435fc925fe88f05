//! Terminal error records for tasks.
//!
//! This module defines the two error-shaped types of the crate:
//!
//! - [`ErrorInfo`] — the record a machine stores when a task ends on a
//!   non-fulfilling path (rejection or cancellation).
//! - [`Rejection`] — the error enum surfaced at `Result` boundaries such as
//!   the [`IntoFuture`](std::future::IntoFuture) bridge.
//!
//! Invalid-state controller calls (pausing a finished task, resuming a running
//! one, and so on) are *expected* outcomes and are reported as `bool`/`Option`
//! returns, never through these types.

use thiserror::Error;

/// # Terminal error record of a task.
///
/// Stored exactly once, at the non-fulfilling terminal transition, and
/// immutable afterwards. A record with `error: None, cancelled: false` is a
/// legal "no-detail" rejection — the [`any`](crate::Task::any) combinator
/// produces it by design.
///
/// # Example
/// ```
/// use taskchain::ErrorInfo;
///
/// let info: ErrorInfo<String> = ErrorInfo::cancelled(None);
/// assert!(info.cancelled);
/// assert_eq!(info.as_label(), "cancelled");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo<E> {
    /// The producer-supplied error payload, if any.
    pub error: Option<E>,
    /// True when the task ended through cancellation rather than a domain
    /// rejection.
    pub cancelled: bool,
}

impl<E> ErrorInfo<E> {
    /// Creates a record from raw parts.
    pub fn new(error: Option<E>, cancelled: bool) -> Self {
        Self { error, cancelled }
    }

    /// A domain rejection carrying an error payload.
    pub fn rejected(error: E) -> Self {
        Self {
            error: Some(error),
            cancelled: false,
        }
    }

    /// A rejection with no payload at all.
    pub fn silent() -> Self {
        Self {
            error: None,
            cancelled: false,
        }
    }

    /// A cancellation, with an optional payload describing the reason.
    pub fn cancelled(error: Option<E>) -> Self {
        Self {
            error,
            cancelled: true,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match (self.cancelled, &self.error) {
            (true, _) => "cancelled",
            (false, Some(_)) => "rejected",
            (false, None) => "rejected_silently",
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for ErrorInfo<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.cancelled, &self.error) {
            (true, Some(e)) => write!(f, "cancelled: {e}"),
            (true, None) => write!(f, "cancelled"),
            (false, Some(e)) => write!(f, "rejected: {e}"),
            (false, None) => write!(f, "rejected without detail"),
        }
    }
}

/// # Rejection error surfaced at `Result` boundaries.
///
/// Awaiting a [`Task`](crate::Task) yields `Result<V, Rejection<E>>`; this enum
/// is the `Err` side, converted from the machine's [`ErrorInfo`] record.
///
/// # Example
/// ```
/// use taskchain::{ErrorInfo, Rejection};
///
/// let rej: Rejection<String> = ErrorInfo::rejected("boom".to_string()).into();
/// assert_eq!(rej.as_label(), "rejected");
/// assert_eq!(rej.to_string(), "task rejected: boom");
/// ```
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection<E> {
    /// The producer rejected with an error payload.
    #[error("task rejected: {0}")]
    Rejected(E),

    /// The producer rejected without a payload.
    #[error("task rejected without detail")]
    RejectedSilently,

    /// The task was cancelled, optionally with a reason payload.
    #[error("task cancelled")]
    Cancelled(Option<E>),
}

impl<E> Rejection<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Rejection::Rejected(_) => "rejected",
            Rejection::RejectedSilently => "rejected_silently",
            Rejection::Cancelled(_) => "cancelled",
        }
    }

    /// Returns true for the cancellation variant.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Rejection::Cancelled(_))
    }
}

impl<E> From<ErrorInfo<E>> for Rejection<E> {
    fn from(info: ErrorInfo<E>) -> Self {
        if info.cancelled {
            Rejection::Cancelled(info.error)
        } else {
            match info.error {
                Some(e) => Rejection::Rejected(e),
                None => Rejection::RejectedSilently,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(ErrorInfo::rejected("e").as_label(), "rejected");
        assert_eq!(ErrorInfo::<&str>::silent().as_label(), "rejected_silently");
        assert_eq!(ErrorInfo::<&str>::cancelled(None).as_label(), "cancelled");
    }

    #[test]
    fn test_conversion_to_rejection() {
        let rej: Rejection<&str> = ErrorInfo::rejected("boom").into();
        assert_eq!(rej, Rejection::Rejected("boom"));

        let rej: Rejection<&str> = ErrorInfo::silent().into();
        assert_eq!(rej, Rejection::RejectedSilently);

        let rej: Rejection<&str> = ErrorInfo::cancelled(Some("why")).into();
        assert_eq!(rej, Rejection::Cancelled(Some("why")));
        assert!(rej.is_cancelled());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorInfo::rejected("boom").to_string(), "rejected: boom");
        assert_eq!(ErrorInfo::<&str>::cancelled(None).to_string(), "cancelled");
        assert_eq!(
            Rejection::<&str>::RejectedSilently.to_string(),
            "task rejected without detail"
        );
    }
}
