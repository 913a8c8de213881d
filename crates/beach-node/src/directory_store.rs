//! The node's local copy of the replicated directory and tombstone log,
//! behind a lock every ops handler and gossip loop shares.

use async_trait::async_trait;
use beach_handle::{DirectorySource, HandleError};
use beach_proto::{ActorEntry, Category, Directory, Realm, TombstoneSet, Uid};
use tokio::sync::RwLock;

/// Owns this node's view of the directory and tombstone log.
#[derive(Default)]
pub struct DirectoryStore {
    directory: RwLock<Directory>,
    tombstones: RwLock<TombstoneSet>,
}

impl DirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, realm: Realm, category: Category, uid: Uid, entry: ActorEntry) {
        self.directory.write().await.insert(realm, category, uid, entry);
    }

    pub async fn remove(&self, realm: &Realm, category: &Category, uid: &Uid) -> Option<ActorEntry> {
        self.directory.write().await.remove(realm, category, uid)
    }

    pub async fn tombstone(&self, uid: Uid) {
        self.tombstones.write().await.insert(uid, chrono::Utc::now());
    }

    /// A full snapshot of the directory, for `get_full_dir` and as the
    /// payload of a push-sync gossip message.
    pub async fn snapshot(&self) -> Directory {
        self.directory.read().await.clone()
    }

    pub async fn tombstones_snapshot(&self) -> TombstoneSet {
        self.tombstones.read().await.clone()
    }

    /// Merge a peer's directory and tombstones into ours.
    pub async fn merge(&self, incoming: &Directory, incoming_tombstones: &TombstoneSet) {
        self.tombstones.write().await.merge(incoming_tombstones);
        let tombstones = self.tombstones.read().await.clone();
        self.directory.write().await.update_with(incoming, &tombstones);
    }

    /// Drop tombstones older than `max_age`.
    pub async fn cull_tombstones(&self, max_age: chrono::Duration) {
        self.tombstones
            .write()
            .await
            .cull(chrono::Utc::now(), max_age);
    }

    pub async fn category_entries(&self, realm: &Realm, category: &Category) -> Vec<(Uid, ActorEntry)> {
        self.directory
            .read()
            .await
            .category(realm, category)
            .map(|map| map.iter().map(|(uid, entry)| (*uid, entry.clone())).collect())
            .unwrap_or_default()
    }
}

/// Lets actors hosted on this node (or directly attached clients) resolve a
/// category against this node's own directory copy, without a network hop.
#[async_trait]
impl DirectorySource for DirectoryStore {
    async fn lookup(&self, realm: &Realm, category: &Category) -> Result<Vec<(Uid, ActorEntry)>, HandleError> {
        Ok(self.category_entries(realm, category).await)
    }
}
