//! # Type-erased control forwarding.
//!
//! Chain and retry tasks forward `pause`/`resume`/`cancel` to machines of
//! *other* payload types (a `then_task` chain targets both its parent and the
//! inner task it binds to). [`Control`] erases the payload types;
//! [`ControlRelay`] fans a controller call out to every attached target.
//!
//! ## Rules
//! - Targets are held as [`Weak`] references: a relay never keeps an upstream
//!   machine alive (a chain must not be the sole owner of its parent).
//! - Dead targets are dropped lazily on the next fan-out.
//! - A fan-out reports `true` when at least one target accepted the
//!   transition, mirroring the single-machine return convention.

use std::sync::{Arc, Weak};

use crate::sync::AtomicCell;

/// Payload-type-erased controller surface of a state machine.
pub(crate) trait Control: Send + Sync {
    fn control_pause(&self) -> bool;
    fn control_resume(&self) -> bool;
    fn control_cancel(&self) -> bool;
}

/// Fan-out of controller calls over a dynamic set of weak targets.
pub(crate) struct ControlRelay {
    targets: AtomicCell<Vec<Weak<dyn Control>>>,
}

impl ControlRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            targets: AtomicCell::new(Vec::new()),
        })
    }

    /// Attaches another target; existing targets stay attached.
    pub fn attach(&self, target: Weak<dyn Control>) {
        self.targets.modify(|t| {
            t.push(target);
            Some(())
        });
    }

    /// Drops every target; later fan-outs are no-ops.
    ///
    /// Used before tearing a relay's owner down locally, when the teardown
    /// must not be forwarded to the targets.
    pub fn clear(&self) {
        self.targets.write(Vec::new());
    }

    /// Snapshots live targets, dropping dead ones.
    fn live(&self) -> Vec<Arc<dyn Control>> {
        self.targets
            .modify(|t| {
                t.retain(|w| w.strong_count() > 0);
                Some(t.iter().filter_map(Weak::upgrade).collect())
            })
            .unwrap_or_default()
    }

    pub fn pause_all(&self) -> bool {
        self.live()
            .into_iter()
            .fold(false, |acc, t| t.control_pause() || acc)
    }

    pub fn resume_all(&self) -> bool {
        self.live()
            .into_iter()
            .fold(false, |acc, t| t.control_resume() || acc)
    }

    pub fn cancel_all(&self) -> bool {
        self.live()
            .into_iter()
            .fold(false, |acc, t| t.control_cancel() || acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        pauses: AtomicUsize,
        accept: bool,
    }

    impl Control for Counter {
        fn control_pause(&self) -> bool {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            self.accept
        }
        fn control_resume(&self) -> bool {
            self.accept
        }
        fn control_cancel(&self) -> bool {
            self.accept
        }
    }

    fn counter(accept: bool) -> Arc<Counter> {
        Arc::new(Counter {
            pauses: AtomicUsize::new(0),
            accept,
        })
    }

    #[test]
    fn test_fans_out_to_all_targets() {
        let relay = ControlRelay::new();
        let a = counter(false);
        let b = counter(true);
        relay.attach(Arc::downgrade(&a) as Weak<dyn Control>);
        relay.attach(Arc::downgrade(&b) as Weak<dyn Control>);

        assert!(relay.pause_all());
        assert_eq!(a.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(b.pauses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_rejecting_targets_reports_false() {
        let relay = ControlRelay::new();
        let a = counter(false);
        relay.attach(Arc::downgrade(&a) as Weak<dyn Control>);
        assert!(!relay.cancel_all());
    }

    #[test]
    fn test_cleared_relay_reaches_nothing() {
        let relay = ControlRelay::new();
        let a = counter(true);
        relay.attach(Arc::downgrade(&a) as Weak<dyn Control>);

        relay.clear();
        assert!(!relay.pause_all());
        assert_eq!(a.pauses.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dead_targets_are_skipped() {
        let relay = ControlRelay::new();
        let a = counter(true);
        relay.attach(Arc::downgrade(&a) as Weak<dyn Control>);
        drop(a);
        assert!(!relay.resume_all());
    }
}
