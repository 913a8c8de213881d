//! Per-actor context handed to `init`, `deinit`, and every handler call.
//!
//! Carries the actor's own identity, a way to reach other actors by
//! category without this crate depending on `beach-handle` directly (that
//! would be circular — `beach-handle` itself has no reason to depend back
//! on `beach-runtime`, but `beach-instance`, which depends on both, is what
//! actually wires a concrete handle provider in), and a cancellation token
//! the dispatch loop flips when a stop has been requested.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beach_proto::{Category, Realm, Uid};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;

/// A minimal, dynamically-dispatched handle to another actor, enough for an
/// actor implementation to message a peer without this crate knowing about
/// `beach-handle`'s concrete `VirtualHandle`, socket pool, or refresh loop.
#[async_trait]
pub trait DynamicHandle: Send + Sync {
    async fn request(&self, body: Value, timeout: Duration) -> Result<Value, RuntimeError>;
    async fn broadcast(&self, body: Value);
}

/// Mirrors `beach_handle::mode::Mode`'s shape at this crate's boundary,
/// since `beach-runtime` can't depend on `beach-handle` (see the module
/// doc). `beach-handle::HandleFactory` converts one to the other where it
/// implements `ActorHandleProvider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleMode {
    /// Pick uniformly at random among known endpoints.
    Random,
    /// Route calls carrying the same per-call key to the same endpoint.
    Affinity,
}

/// Resolves a category to a handle, on demand, the way `actor.py`'s
/// `getActorHandle` does by asking the owning `Beach` client for the
/// category's directory entries.
#[async_trait]
pub trait ActorHandleProvider: Send + Sync {
    async fn get_actor_handle(
        &self,
        realm: Realm,
        category: Category,
        mode: HandleMode,
    ) -> Result<Arc<dyn DynamicHandle>, RuntimeError>;

    /// True if at least one live actor is published under `category` in
    /// `realm`, without paying for a full handle resolution.
    async fn is_category_available(&self, realm: &Realm, category: &Category) -> bool;
}

/// Everything a running actor instance needs to know about itself and its
/// surroundings.
#[derive(Clone)]
pub struct ActorContext {
    pub realm: Realm,
    pub category: Category,
    pub uid: Uid,
    handle_provider: Arc<dyn ActorHandleProvider>,
    cancellation: CancellationToken,
}

impl ActorContext {
    pub fn new(
        realm: Realm,
        category: Category,
        uid: Uid,
        handle_provider: Arc<dyn ActorHandleProvider>,
    ) -> Self {
        Self {
            realm,
            category,
            uid,
            handle_provider,
            cancellation: CancellationToken::new(),
        }
    }

    /// Resolve a handle to another category in the same realm, dispatched
    /// per `mode`.
    pub async fn get_actor_handle(
        &self,
        category: Category,
        mode: HandleMode,
    ) -> Result<Arc<dyn DynamicHandle>, RuntimeError> {
        self.handle_provider
            .get_actor_handle(self.realm.clone(), category, mode)
            .await
    }

    pub async fn is_category_available(&self, category: &Category) -> bool {
        self.handle_provider
            .is_category_available(&self.realm, category)
            .await
    }

    /// True once a stop has been requested; handlers may poll this during
    /// long-running work to wind down early.
    pub fn stop_requested(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub(crate) fn request_stop(&self) {
        self.cancellation.cancel();
    }

    /// Run `make_future()` now, then again every `delay`, detached from the
    /// handler that scheduled it, until the actor stops — mirrors
    /// `actor.py`'s `schedule(seconds, fn)` recurring-timer helper (retry
    /// loops, periodic housekeeping within a single actor). Stops as soon as
    /// `make_future`'s in-flight call returns or the next sleep elapses,
    /// whichever is checked first against the actor's cancellation token.
    pub fn schedule<F, Fut>(&self, delay: Duration, mut make_future: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancellation = self.cancellation.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = make_future() => {}
                }
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        });
    }
}
