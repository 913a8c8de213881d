//! `VirtualHandle`: a self-refreshing, pooled client to one category of
//! actors.
//!
//! Grounded on `actor.py`'s `ActorHandle`: a background task keeps a list
//! of known endpoints fresh (refreshing often while the category looks
//! empty, in case it's just bootstrapping, and much less often once it
//! has entries), a small pool of already-connected sockets is kept per
//! endpoint so steady traffic doesn't pay a connect on every call, and a
//! socket that times out is dropped rather than returned to the pool since
//! a stale reply could still land on it later.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use beach_proto::{ActorEntry, Category, Endpoint, Realm, Uid};
use beach_transport::{Address, RequestSocket};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::directory_source::DirectorySource;
use crate::error::HandleError;
use crate::mode::{select, Mode};

/// Refresh cadence once the category has at least one known entry.
pub const KNOWN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Refresh cadence while the category looks empty, to pick up a late
/// bootstrap quickly instead of waiting out the full known-entry cadence.
pub const EMPTY_REFRESH_INTERVAL: Duration = Duration::from_secs(2);
/// Per-call request timeout against a single endpoint.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// How many distinct endpoints a single `request` call will try before
/// giving up.
pub const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

type Pool = Mutex<HashMap<Endpoint, VecDeque<RequestSocket>>>;

/// A handle to a realm/category, kept alive by a background refresh task.
pub struct VirtualHandle {
    realm: Realm,
    category: Category,
    mode: Mode,
    known: Arc<RwLock<Vec<(Uid, ActorEntry)>>>,
    pool: Arc<Pool>,
    refresh_task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl VirtualHandle {
    /// Open a handle and start its background refresh task immediately.
    pub fn open(realm: Realm, category: Category, mode: Mode, source: Arc<dyn DirectorySource>) -> Self {
        let known: Arc<RwLock<Vec<(Uid, ActorEntry)>>> = Arc::new(RwLock::new(Vec::new()));
        let cancel = CancellationToken::new();

        let refresh_task = {
            let known = Arc::clone(&known);
            let cancel = cancel.clone();
            let realm = realm.clone();
            let category = category.clone();
            tokio::spawn(async move {
                refresh_loop(realm, category, source, known, cancel).await;
            })
        };

        Self {
            realm,
            category,
            mode,
            known,
            pool: Arc::new(Mutex::new(HashMap::new())),
            refresh_task,
            cancel,
        }
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    /// True once the background refresh has observed at least one entry.
    pub async fn is_available(&self) -> bool {
        !self.known.read().await.is_empty()
    }

    /// Send one request, retrying against a fresh endpoint selection on
    /// timeout or connection failure up to `retries` times. `key` picks the
    /// target under `Mode::Affinity`; ignored under `Mode::Random`.
    pub async fn request(
        &self,
        body: Value,
        timeout: Duration,
        key: Option<&str>,
        retries: u32,
    ) -> Result<Value, HandleError> {
        let entries = self.known.read().await.clone();
        if entries.is_empty() {
            return Err(HandleError::CategoryEmpty);
        }

        let mut last_err = None;
        for _ in 0..retries {
            let entry = select(self.mode, &entries, key).clone();
            match self.try_request(&entry, body.clone(), timeout).await {
                Ok(reply) => return Ok(reply),
                Err(err) => {
                    warn!(endpoint = %entry.endpoint, error = %err, "virtual handle call failed, retrying");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or(HandleError::ExhaustedRetries(retries)))
    }

    async fn try_request(&self, entry: &ActorEntry, body: Value, timeout: Duration) -> Result<Value, HandleError> {
        let mut socket = self.acquire(entry.endpoint).await?;
        let result = socket.request(body, timeout).await;
        if !socket.is_poisoned() {
            self.release(entry.endpoint, socket).await;
        }
        result.map_err(HandleError::from)
    }

    /// Fire `body` at every currently known endpoint without waiting for
    /// or checking replies. Best-effort: a peer that's gone stale or is
    /// mid-restart silently drops its copy.
    pub async fn broadcast(&self, body: Value) {
        let entries = self.known.read().await.clone();
        for (_uid, entry) in entries {
            let body = body.clone();
            let pool = Arc::clone(&self.pool);
            tokio::spawn(async move {
                if let Ok(mut socket) = acquire_from(&pool, entry.endpoint).await {
                    let _ = socket.request(body, REQUEST_TIMEOUT).await;
                }
            });
        }
    }

    async fn acquire(&self, endpoint: Endpoint) -> Result<RequestSocket, HandleError> {
        acquire_from(&self.pool, endpoint).await
    }

    async fn release(&self, endpoint: Endpoint, socket: RequestSocket) {
        let mut pool = self.pool.lock().await;
        pool.entry(endpoint).or_default().push_back(socket);
    }

    /// Stop the background refresh task and drop every pooled connection.
    pub async fn close(self) {
        self.cancel.cancel();
        self.refresh_task.abort();
        self.pool.lock().await.clear();
    }
}

async fn acquire_from(pool: &Pool, endpoint: Endpoint) -> Result<RequestSocket, HandleError> {
    if let Some(socket) = pool.lock().await.get_mut(&endpoint).and_then(VecDeque::pop_front) {
        return Ok(socket);
    }
    let addr: SocketAddr = std::net::SocketAddr::new(endpoint.ip(), endpoint.port());
    Ok(RequestSocket::connect(Address::Tcp(addr)).await?)
}

async fn refresh_loop(
    realm: Realm,
    category: Category,
    source: Arc<dyn DirectorySource>,
    known: Arc<RwLock<Vec<(Uid, ActorEntry)>>>,
    cancel: CancellationToken,
) {
    loop {
        match source.lookup(&realm, &category).await {
            Ok(entries) => {
                let is_empty = entries.is_empty();
                *known.write().await = entries;
                let next = if is_empty {
                    EMPTY_REFRESH_INTERVAL
                } else {
                    KNOWN_REFRESH_INTERVAL
                };
                tokio::select! {
                    _ = tokio::time::sleep(next) => {}
                    _ = cancel.cancelled() => return,
                }
            }
            Err(err) => {
                debug!(error = %err, "directory refresh failed, retrying soon");
                tokio::select! {
                    _ = tokio::time::sleep(EMPTY_REFRESH_INTERVAL) => {}
                    _ = cancel.cancelled() => return,
                }
            }
        }
    }
}
