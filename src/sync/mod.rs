//! # Thread-safe building blocks.
//!
//! Leaf primitives the state machine is assembled from:
//! - [`AtomicCell`] — lock-protected single-value holder with atomic
//!   read-transform-write operations;
//! - [`HandlerRegistry`] / [`HandlerToken`] — insertion-ordered callback store
//!   keyed by opaque tokens.
//!
//! Neither primitive knows anything about tasks; both are reused by the
//! combinators and the async interop layer.

mod cell;
mod registry;

pub use cell::AtomicCell;
pub use registry::{HandlerRegistry, HandlerToken};
