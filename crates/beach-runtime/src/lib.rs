//! Actor trait, lifecycle state machine, and request dispatch loop hosted
//! by worker-instance processes.
//!
//! An [`Actor`] registers a [`handler::HandlerTable`] mapping request-type
//! names to async closures; [`ActorRuntime::run`] binds that actor to a
//! [`beach_transport::ReplySocket`] and serves requests against the table
//! until its [`context::ActorContext`] is cancelled.

pub mod actor;
pub mod context;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod runtime;

pub use actor::Actor;
pub use context::{ActorContext, ActorHandleProvider, DynamicHandle, HandleMode};
pub use error::{ErrorAction, RuntimeError};
pub use handler::{Concurrency, HandlerEntry, HandlerFn, HandlerResult, HandlerTable};
pub use lifecycle::{ActorLifecycle, ActorState};
pub use runtime::{ActorRuntime, DEFAULT_STOP_GRACE};
