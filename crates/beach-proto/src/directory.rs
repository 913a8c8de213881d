//! The replicated actor directory and its tombstone-based deletion log.
//!
//! The directory is a three-level map — realm → category → uid → entry —
//! gossiped between node controllers via pull-sync and push-sync (§4.6).
//! Merges are leaf-overwrite: whichever copy of an entry arrives last wins,
//! there is no vector-clock reconciliation. Deletions don't simply remove a
//! leaf (a concurrent gossip message could resurrect it); a uid must be
//! placed in the `TombstoneSet` so every peer converges on "gone" rather
//! than "never saw the delete." This mirrors `hostmanager.py`'s
//! `_updateDirectoryWith` plus its `removedActors` companion set.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{Category, Endpoint, Realm, Uid};

/// One actor's published location and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorEntry {
    pub endpoint: Endpoint,
    /// IP of the node controller that owns this actor's instance.
    pub node: std::net::IpAddr,
}

/// realm -> category -> uid -> entry.
pub type CategoryMap = HashMap<Uid, ActorEntry>;
pub type RealmMap = HashMap<Category, CategoryMap>;

/// The replicated directory of live actors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directory {
    realms: HashMap<Realm, RealmMap>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a single actor entry.
    pub fn insert(&mut self, realm: Realm, category: Category, uid: Uid, entry: ActorEntry) {
        self.realms
            .entry(realm)
            .or_default()
            .entry(category)
            .or_default()
            .insert(uid, entry);
    }

    /// Remove a single actor entry, e.g. after a successful stop.
    ///
    /// Does not prune now-empty realm/category maps from the structure the
    /// caller continues to hold, to keep `update_with` idempotent regardless
    /// of call order; empty maps are harmless and serialize to `{}`.
    pub fn remove(&mut self, realm: &Realm, category: &Category, uid: &Uid) -> Option<ActorEntry> {
        self.realms.get_mut(realm)?.get_mut(category)?.remove(uid)
    }

    pub fn get(&self, realm: &Realm, category: &Category, uid: &Uid) -> Option<&ActorEntry> {
        self.realms.get(realm)?.get(category)?.get(uid)
    }

    /// All entries in a realm/category, or an empty slice if either is absent.
    pub fn category(&self, realm: &Realm, category: &Category) -> Option<&CategoryMap> {
        self.realms.get(realm)?.get(category)
    }

    pub fn realm(&self, realm: &Realm) -> Option<&RealmMap> {
        self.realms.get(realm)
    }

    pub fn realms(&self) -> &HashMap<Realm, RealmMap> {
        &self.realms
    }

    /// Total number of actor entries across all realms/categories.
    pub fn len(&self) -> usize {
        self.realms
            .values()
            .flat_map(|r| r.values())
            .map(|c| c.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recursively merge `incoming` into `self`: incoming leaves overwrite
    /// local ones, then any uid present in `tombstones` is pruned from the
    /// result. This is the gossip merge step run against both a pull-sync
    /// response and a push-sync notification.
    pub fn update_with(&mut self, incoming: &Directory, tombstones: &TombstoneSet) {
        for (realm, realm_map) in &incoming.realms {
            let local_realm = self.realms.entry(realm.clone()).or_default();
            for (category, category_map) in realm_map {
                let local_category = local_realm.entry(category.clone()).or_default();
                for (uid, entry) in category_map {
                    if tombstones.contains(uid) {
                        continue;
                    }
                    local_category.insert(*uid, entry.clone());
                }
            }
        }
        self.prune_tombstoned(tombstones);
    }

    /// Remove every entry whose uid has been tombstoned, regardless of where
    /// it came from. Called after every merge so a tombstone that arrives
    /// after the entry it targets still takes effect.
    pub fn prune_tombstoned(&mut self, tombstones: &TombstoneSet) {
        for realm_map in self.realms.values_mut() {
            for category_map in realm_map.values_mut() {
                category_map.retain(|uid, _| !tombstones.contains(uid));
            }
        }
    }
}

/// A deletion log: uid -> time of deletion.
///
/// Entries are culled once older than `tombstone_culling_seconds`, on the
/// assumption that by then every peer has pulled and applied the deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TombstoneSet {
    entries: BTreeMap<Uid, DateTime<Utc>>,
}

impl TombstoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deletion at the given time, overwriting any existing record
    /// for the same uid (later deletions keep the clock moving forward).
    pub fn insert(&mut self, uid: Uid, at: DateTime<Utc>) {
        self.entries.insert(uid, at);
    }

    pub fn contains(&self, uid: &Uid) -> bool {
        self.entries.contains_key(uid)
    }

    /// Merge another peer's tombstones into this one, keeping the newer
    /// timestamp on conflict.
    pub fn merge(&mut self, other: &TombstoneSet) {
        for (uid, at) in &other.entries {
            self.entries
                .entry(*uid)
                .and_modify(|existing| {
                    if at > existing {
                        *existing = *at;
                    }
                })
                .or_insert(*at);
        }
    }

    /// Drop every tombstone older than `max_age` relative to `now`.
    pub fn cull(&mut self, now: DateTime<Utc>, max_age: chrono::Duration) {
        self.entries.retain(|_, at| now.signed_duration_since(*at) < max_age);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn entry(port: u16) -> ActorEntry {
        ActorEntry {
            endpoint: Endpoint::new("127.0.0.1".parse::<IpAddr>().unwrap(), port),
            node: "127.0.0.1".parse().unwrap(),
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let mut dir = Directory::new();
        let realm = Realm::default_realm();
        let category = Category::new("worker");
        let uid = Uid::new();
        dir.insert(realm.clone(), category.clone(), uid, entry(5001));
        assert_eq!(dir.get(&realm, &category, &uid), Some(&entry(5001)));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn update_with_overwrites_leaves() {
        let realm = Realm::default_realm();
        let category = Category::new("worker");
        let uid = Uid::new();

        let mut local = Directory::new();
        local.insert(realm.clone(), category.clone(), uid, entry(5001));

        let mut incoming = Directory::new();
        incoming.insert(realm.clone(), category.clone(), uid, entry(5002));

        local.update_with(&incoming, &TombstoneSet::new());
        assert_eq!(local.get(&realm, &category, &uid), Some(&entry(5002)));
    }

    #[test]
    fn tombstoned_uid_is_pruned_even_if_present_locally() {
        let realm = Realm::default_realm();
        let category = Category::new("worker");
        let uid = Uid::new();

        let mut local = Directory::new();
        local.insert(realm.clone(), category.clone(), uid, entry(5001));

        let mut tombstones = TombstoneSet::new();
        tombstones.insert(uid, Utc::now());

        local.update_with(&Directory::new(), &tombstones);
        assert_eq!(local.get(&realm, &category, &uid), None);
    }

    #[test]
    fn tombstone_cull_drops_entries_past_max_age() {
        let mut tombstones = TombstoneSet::new();
        let uid = Uid::new();
        tombstones.insert(uid, Utc::now() - chrono::Duration::hours(2));
        tombstones.cull(Utc::now(), chrono::Duration::hours(1));
        assert!(!tombstones.contains(&uid));
    }

    #[test]
    fn tombstone_merge_keeps_newer_timestamp() {
        let uid = Uid::new();
        let older = Utc::now() - chrono::Duration::minutes(5);
        let newer = Utc::now();

        let mut a = TombstoneSet::new();
        a.insert(uid, older);
        let mut b = TombstoneSet::new();
        b.insert(uid, newer);

        a.merge(&b);
        assert_eq!(a.entries.get(&uid), Some(&newer));
    }
}
