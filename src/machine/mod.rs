//! # Lifecycle engine: state, configuration, control, machine.
//!
//! The only public API from this module is the data surface a producer or
//! consumer touches directly: [`TaskState`], [`Configuration`] and
//! [`Emitter`]. The machine itself stays internal — the façade in
//! [`crate::task`] exposes the safe entry points.
//!
//! Internal modules:
//! - [`state`]: the observable lifecycle enum and its transition rules;
//! - [`config`]: producer-registered pause/resume/cancel/finish hooks;
//! - [`control`]: payload-type-erased pause/resume/cancel fan-out;
//! - [`machine`]: the lock-guarded state machine and terminal dispatch.

mod config;
mod control;
mod machine;
mod state;

pub use config::Configuration;
pub use machine::Emitter;
pub use state::TaskState;

pub(crate) use control::{Control, ControlRelay};
pub(crate) use machine::{CompletionEntry, Producer, StateMachine};
