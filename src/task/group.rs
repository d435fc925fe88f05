//! # Group combinators: all / any.
//!
//! Both combinators wrap a set of homogeneous child tasks behind one group
//! task:
//!
//! ```text
//!           ┌─ child 0 ─┐
//!  group ◄──┼─ child 1 ─┼──► settle counters (one AtomicCell critical
//!           └─ child n ─┘     section, so racing children serialize)
//! ```
//!
//! ## Rules
//! - [`Task::all`]: fulfills with the children's values in construction order
//!   once every child fulfills; the first rejection settles the group and the
//!   remaining children are cancelled.
//! - [`Task::any`]: the first fulfillment settles the group and the remaining
//!   children are cancelled; rejects (without an error payload) only when
//!   every child failed, flagged cancelled when any child was cancelled.
//! - Group progress is [`GroupProgress`] counters, not the children's own
//!   progress payloads.
//! - Controller calls fan out to every child; the group's finish hook cancels
//!   whatever is still pending, whatever the outcome was.

use std::sync::Arc;

use crate::error::ErrorInfo;
use crate::machine::{Configuration, StateMachine};
use crate::sync::AtomicCell;
use crate::task::chain::deliver_value;
use crate::task::Task;

/// Settlement counters of a group task, reported as its progress payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupProgress {
    /// Children settled so far (fulfilled for `all`, failed for `any`).
    pub completed: usize,
    /// Number of children the group was built from.
    pub total: usize,
}

impl GroupProgress {
    /// Completion ratio in `0.0..=1.0`; an empty group counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

impl std::fmt::Display for GroupProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// Builds the group machine: pause/resume fan out to every child, the finish
/// hook cancels stragglers on any terminal path. The hooks hold the children
/// strongly until the group settles.
fn group_machine<P, V, E, GV>(children: &[Task<P, V, E>]) -> Arc<StateMachine<GroupProgress, GV, E>>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
    GV: Clone + Send + 'static,
{
    let kids: Arc<[Task<P, V, E>]> = children.iter().cloned().collect();

    let mut cfg = Configuration::new();
    let k = Arc::clone(&kids);
    cfg.on_pause(move || {
        for child in k.iter() {
            child.pause();
        }
    });
    let k = Arc::clone(&kids);
    cfg.on_resume(move || {
        for child in k.iter() {
            child.resume();
        }
    });
    cfg.on_finish(move || {
        for child in kids.iter() {
            child.cancel();
        }
    });

    StateMachine::create(false, false, cfg, None)
}

/// Per-slot bookkeeping for [`Task::all`].
struct AllState<V> {
    filled: Vec<Option<V>>,
    completed: usize,
}

/// Settlement bookkeeping for [`Task::any`].
struct AnyState {
    settled: usize,
    any_cancelled: bool,
}

impl<P, V, E> Task<P, V, E>
where
    P: Clone + Send + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Combines `children` into a task fulfilling with every child's value,
    /// in construction order.
    ///
    /// The first child rejection (or cancellation) settles the group with
    /// that child's error record and cancels the remaining children.
    /// `all([])` fulfills immediately with an empty vector.
    ///
    /// ```
    /// use taskchain::Task;
    ///
    /// let group = Task::all(vec![
    ///     Task::<(), i32, String>::from_value(1),
    ///     Task::from_value(2),
    /// ]);
    /// assert_eq!(group.value(), Some(vec![1, 2]));
    /// ```
    pub fn all(children: Vec<Task<P, V, E>>) -> Task<GroupProgress, Vec<V>, E> {
        let total = children.len();
        let machine = group_machine::<P, V, E, Vec<V>>(&children);
        if total == 0 {
            machine.handle_fulfill(Vec::new());
            return Task::from_parts("all", machine, None);
        }

        let state = Arc::new(AtomicCell::new(AllState {
            filled: (0..total).map(|_| None).collect(),
            completed: 0,
        }));

        for (index, child) in children.iter().enumerate() {
            let state = Arc::clone(&state);
            let sink = Arc::clone(&machine);
            child.observe(move |v, info| {
                if let Some(v) = v {
                    let done = state.modify(|s| {
                        if s.filled[index].is_some() {
                            return None;
                        }
                        s.filled[index] = Some(v.clone());
                        s.completed += 1;
                        let values = (s.completed == s.filled.len())
                            .then(|| s.filled.iter_mut().filter_map(Option::take).collect());
                        Some((s.completed, values))
                    });
                    if let Some((completed, values)) = done {
                        sink.handle_progress(GroupProgress { completed, total });
                        if let Some(values) = values {
                            deliver_value(&sink, values);
                        }
                    }
                } else if let Some(info) = info {
                    // First loss wins; the finish hook cancels the rest.
                    sink.handle_reject_info(info.clone());
                }
            });
        }
        Task::from_parts("all", machine, None)
    }

    /// Combines `children` into a task fulfilling with the first child value.
    ///
    /// The winner's siblings are cancelled. The group rejects only when every
    /// child failed, without an error payload, flagged cancelled when at
    /// least one child was cancelled. `any([])` rejects immediately.
    pub fn any(children: Vec<Task<P, V, E>>) -> Task<GroupProgress, V, E> {
        let total = children.len();
        let machine = group_machine::<P, V, E, V>(&children);
        if total == 0 {
            machine.handle_reject_info(ErrorInfo::silent());
            return Task::from_parts("any", machine, None);
        }

        let state = Arc::new(AtomicCell::new(AnyState {
            settled: 0,
            any_cancelled: false,
        }));

        for child in children.iter() {
            let state = Arc::clone(&state);
            let sink = Arc::clone(&machine);
            child.observe(move |v, info| {
                if let Some(v) = v {
                    deliver_value(&sink, v.clone());
                } else if let Some(info) = info {
                    let outcome = state.modify(|s| {
                        s.settled += 1;
                        s.any_cancelled |= info.cancelled;
                        Some((s.settled, s.any_cancelled))
                    });
                    if let Some((settled, any_cancelled)) = outcome {
                        sink.handle_progress(GroupProgress {
                            completed: settled,
                            total,
                        });
                        if settled == total {
                            sink.handle_reject_info(ErrorInfo::new(None, any_cancelled));
                        }
                    }
                }
            });
        }
        Task::from_parts("any", machine, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::TaskState;
    use crate::task::test_support::controllable;
    use std::sync::Mutex;

    #[test]
    fn test_all_collects_values_in_order() {
        let (a, ea) = controllable::<(), i32, &str>();
        let (b, eb) = controllable::<(), i32, &str>();
        let group = Task::all(vec![a, b]);

        // Completion order does not matter; slots do.
        eb.fulfill(2);
        assert_eq!(group.state(), TaskState::Running);
        ea.fulfill(1);
        assert_eq!(group.value(), Some(vec![1, 2]));
    }

    #[test]
    fn test_all_reports_counter_progress() {
        let (a, ea) = controllable::<(), i32, &str>();
        let (b, eb) = controllable::<(), i32, &str>();
        let group = Task::all(vec![a, b]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        group.on_progress(move |_, p| sink.lock().unwrap().push(*p));

        ea.fulfill(1);
        eb.fulfill(2);
        // The full count is reported before the group fulfills.
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                GroupProgress { completed: 1, total: 2 },
                GroupProgress { completed: 2, total: 2 },
            ]
        );
        assert!((seen[0].fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_first_rejection_wins_and_cancels_siblings() {
        let (a, _ea) = controllable::<(), i32, &str>();
        let (b, eb) = controllable::<(), i32, &str>();
        let probe = a.clone();
        let group = Task::all(vec![a, b]);

        eb.reject("boom");
        assert_eq!(group.state(), TaskState::Rejected);
        assert_eq!(group.error_info().unwrap().error, Some("boom"));
        assert_eq!(probe.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_all_of_empty_fulfills_immediately() {
        let group = Task::all(Vec::<Task<(), i32, &str>>::new());
        assert_eq!(group.value(), Some(vec![]));
        assert_eq!(group.name(), "all");
    }

    #[test]
    fn test_all_controller_fans_out() {
        let (a, _ea) = controllable::<(), i32, &str>();
        let (b, _eb) = controllable::<(), i32, &str>();
        let (pa, pb) = (a.clone(), b.clone());
        let group = Task::all(vec![a, b]);

        assert!(group.pause());
        assert_eq!(pa.state(), TaskState::Paused);
        assert_eq!(pb.state(), TaskState::Paused);
        assert!(group.resume());
        assert_eq!(pa.state(), TaskState::Running);

        assert!(group.cancel());
        assert_eq!(pa.state(), TaskState::Cancelled);
        assert_eq!(pb.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_any_first_fulfillment_wins_and_cancels_siblings() {
        let (a, _ea) = controllable::<(), i32, &str>();
        let (b, eb) = controllable::<(), i32, &str>();
        let probe = a.clone();
        let group = Task::any(vec![a, b]);

        eb.fulfill(42);
        assert_eq!(group.value(), Some(42));
        assert_eq!(probe.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_any_rejects_only_after_every_child_failed() {
        let (a, ea) = controllable::<(), i32, &str>();
        let (b, eb) = controllable::<(), i32, &str>();
        let group = Task::any(vec![a, b]);

        ea.reject("one");
        assert_eq!(group.state(), TaskState::Running);
        eb.reject("two");
        assert_eq!(group.state(), TaskState::Rejected);
        // No single error is representative, so none is carried.
        assert_eq!(group.error_info(), Some(ErrorInfo::new(None, false)));
    }

    #[test]
    fn test_any_flags_cancellation_when_a_child_was_cancelled() {
        let (a, _ea) = controllable::<(), i32, &str>();
        let (b, eb) = controllable::<(), i32, &str>();
        let canceller = a.clone();
        let group = Task::any(vec![a, b]);

        canceller.cancel();
        eb.reject("boom");
        assert_eq!(group.state(), TaskState::Cancelled);
        assert!(group.error_info().unwrap().cancelled);
    }

    #[test]
    fn test_any_of_empty_rejects_immediately() {
        let group = Task::any(Vec::<Task<(), i32, &str>>::new());
        assert_eq!(group.state(), TaskState::Rejected);
        assert_eq!(group.error_info(), Some(ErrorInfo::silent()));
    }

    #[test]
    fn test_all_settles_exactly_once_under_racing_children() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        for _ in 0..200 {
            let mut children = Vec::new();
            let mut emitters = Vec::new();
            for _ in 0..8 {
                let (task, emitter) = controllable::<(), usize, &str>();
                children.push(task);
                emitters.push(emitter);
            }
            let group = Task::all(children);

            let completions = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&completions);
            group.observe(move |v, _| {
                assert_eq!(v, Some(&vec![0, 1, 2, 3, 4, 5, 6, 7]));
                c.fetch_add(1, Ordering::SeqCst);
            });

            let handles: Vec<_> = emitters
                .into_iter()
                .enumerate()
                .map(|(i, emitter)| std::thread::spawn(move || emitter.fulfill(i)))
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            // One completion dispatch, no lost slot updates.
            assert_eq!(completions.load(Ordering::SeqCst), 1);
            assert_eq!(group.value(), Some(vec![0, 1, 2, 3, 4, 5, 6, 7]));
        }
    }

    #[test]
    fn test_any_has_a_single_winner_under_racing_children() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        for _ in 0..200 {
            let mut children = Vec::new();
            let mut emitters = Vec::new();
            for _ in 0..8 {
                let (task, emitter) = controllable::<(), usize, &str>();
                children.push(task);
                emitters.push(emitter);
            }
            let group = Task::any(children);

            let completions = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&completions);
            group.observe(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            });

            // Even children race to win, odd children race to fail.
            let handles: Vec<_> = emitters
                .into_iter()
                .enumerate()
                .map(|(i, emitter)| {
                    std::thread::spawn(move || {
                        if i % 2 == 0 {
                            emitter.fulfill(i);
                        } else {
                            emitter.reject("lost");
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(completions.load(Ordering::SeqCst), 1);
            let winner = group.value().unwrap();
            assert_eq!(winner % 2, 0);
        }
    }

    #[test]
    fn test_all_with_terminal_children_settles_synchronously() {
        let group = Task::all(vec![
            Task::<(), i32, &str>::from_value(1),
            Task::from_value(2),
            Task::from_value(3),
        ]);
        assert_eq!(group.value(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_group_progress_fraction_bounds() {
        assert!((GroupProgress { completed: 0, total: 0 }.fraction() - 1.0).abs() < f64::EPSILON);
        let half = GroupProgress { completed: 1, total: 2 };
        assert!((half.fraction() - 0.5).abs() < f64::EPSILON);
        assert_eq!(half.to_string(), "1/2");
    }
}
