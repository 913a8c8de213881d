//! Wires `VirtualHandle` into `beach-runtime`'s `ActorHandleProvider`/
//! `DynamicHandle` traits, so actor code can call `ctx.get_actor_handle(...)`
//! without this crate or `beach-runtime` knowing about each other's concrete
//! types.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beach_proto::{Category, Realm};
use beach_runtime::{ActorHandleProvider, DynamicHandle, HandleMode, RuntimeError};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::directory_source::DirectorySource;
use crate::handle::{VirtualHandle, MAX_ACQUIRE_ATTEMPTS, REQUEST_TIMEOUT};
use crate::mode::Mode;

fn to_mode(mode: HandleMode) -> Mode {
    match mode {
        HandleMode::Random => Mode::Random,
        HandleMode::Affinity => Mode::Affinity,
    }
}

#[async_trait]
impl DynamicHandle for VirtualHandle {
    async fn request(&self, body: Value, timeout: Duration) -> Result<Value, RuntimeError> {
        VirtualHandle::request(self, body, timeout, None, MAX_ACQUIRE_ATTEMPTS)
            .await
            .map_err(|err| RuntimeError::Handle(err.to_string()))
    }

    async fn broadcast(&self, body: Value) {
        VirtualHandle::broadcast(self, body).await;
    }
}

/// Opens and caches one `VirtualHandle` per realm/category/mode triple,
/// handing out a shared reference on repeat lookups rather than spinning up
/// a new refresh task every time an actor asks for the same category under
/// the same dispatch mode. A category requested under two different modes
/// gets two independently refreshed handles, since a handle's mode is fixed
/// for its whole lifetime.
pub struct HandleFactory {
    source: Arc<dyn DirectorySource>,
    handles: Mutex<HashMap<(Realm, Category, Mode), Arc<VirtualHandle>>>,
}

impl HandleFactory {
    pub fn new(source: Arc<dyn DirectorySource>) -> Self {
        Self {
            source,
            handles: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ActorHandleProvider for HandleFactory {
    async fn get_actor_handle(
        &self,
        realm: Realm,
        category: Category,
        mode: HandleMode,
    ) -> Result<Arc<dyn DynamicHandle>, RuntimeError> {
        let mode = to_mode(mode);
        let mut handles = self.handles.lock().await;
        let key = (realm.clone(), category.clone(), mode);
        if let Some(existing) = handles.get(&key) {
            return Ok(Arc::clone(existing) as Arc<dyn DynamicHandle>);
        }
        let handle = Arc::new(VirtualHandle::open(realm, category, mode, Arc::clone(&self.source)));
        handles.insert(key, Arc::clone(&handle));
        Ok(handle as Arc<dyn DynamicHandle>)
    }

    async fn is_category_available(&self, realm: &Realm, category: &Category) -> bool {
        let handle = {
            let handles = self.handles.lock().await;
            handles
                .iter()
                .find(|((r, c, _), _)| r == realm && c == category)
                .map(|(_, handle)| Arc::clone(handle))
        };
        match handle {
            Some(handle) => handle.is_available().await,
            None => self
                .source
                .lookup(realm, category)
                .await
                .map(|entries| !entries.is_empty())
                .unwrap_or(false),
        }
    }
}

/// Convenience wrapper matching `beach_runtime`'s default per-call timeout
/// when a caller doesn't need to override it.
pub fn default_request_timeout() -> Duration {
    REQUEST_TIMEOUT
}
