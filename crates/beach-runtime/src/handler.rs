//! Handler registration: a map from request-type name to an async closure,
//! the Rust shape of `actor.py`'s `AddHandler`/`AddConcurrentHandler`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::context::ActorContext;
use crate::error::RuntimeError;

/// What a handler returns: `Ok(Some(data))` becomes a success reply with
/// that payload, `Ok(None)` a bare success reply, `Err` an error reply
/// whose wire kind comes from [`RuntimeError::wire_kind`].
pub type HandlerResult = Result<Option<Value>, RuntimeError>;

type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A boxed async handler closure.
pub type HandlerFn = Arc<dyn Fn(Value, ActorContext) -> HandlerFuture + Send + Sync>;

/// Whether a handler must run serialized with respect to every other
/// serial handler on the same actor, or may run concurrently alongside
/// them.
///
/// `actor.py` runs its normal ops handlers one at a time on the actor's own
/// greenlet and spawns concurrent handlers onto their own; `Serial` here
/// takes an actor-wide lock before running, `Concurrent` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Serial,
    Concurrent,
}

/// A registered handler plus its concurrency mode.
#[derive(Clone)]
pub struct HandlerEntry {
    pub concurrency: Concurrency,
    pub handler: HandlerFn,
}

/// The set of request types an actor instance answers.
#[derive(Clone, Default)]
pub struct HandlerTable {
    entries: HashMap<String, HandlerEntry>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler that runs serialized with respect to this
    /// actor's other serial handlers.
    pub fn add_handler<F, Fut>(&mut self, request_type: impl Into<String>, handler: F)
    where
        F: Fn(Value, ActorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.entries.insert(
            request_type.into(),
            HandlerEntry {
                concurrency: Concurrency::Serial,
                handler: Arc::new(move |value, ctx| Box::pin(handler(value, ctx))),
            },
        );
    }

    /// Register a handler allowed to run concurrently with this actor's
    /// other handlers, for requests that don't mutate shared actor state.
    pub fn add_concurrent_handler<F, Fut>(&mut self, request_type: impl Into<String>, handler: F)
    where
        F: Fn(Value, ActorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.entries.insert(
            request_type.into(),
            HandlerEntry {
                concurrency: Concurrency::Concurrent,
                handler: Arc::new(move |value, ctx| Box::pin(handler(value, ctx))),
            },
        );
    }

    pub fn get(&self, request_type: &str) -> Option<&HandlerEntry> {
        self.entries.get(request_type)
    }

    pub fn contains(&self, request_type: &str) -> bool {
        self.entries.contains_key(request_type)
    }
}
