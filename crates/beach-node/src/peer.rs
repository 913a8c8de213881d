//! The peer table: other node controllers this node knows about, and when
//! each was last confirmed alive.
//!
//! Grounded on `hostmanager.py`'s `_peers` dict plus its keepalive/evict
//! loop: a peer that hasn't answered a `keepalive` within
//! `peer_keepalive_seconds * 2` (two missed beats, not one, to tolerate a
//! single dropped packet) is evicted rather than retried forever.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Node controllers known to this node, by bind IP.
#[derive(Default)]
pub struct PeerTable {
    peers: DashMap<IpAddr, Instant>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with bootstrap addresses, marking them alive as of
    /// now so the first keepalive round has a grace period to confirm them.
    pub fn seed(&self, addrs: impl IntoIterator<Item = IpAddr>) {
        let now = Instant::now();
        for addr in addrs {
            self.peers.entry(addr).or_insert(now);
        }
    }

    /// Record a successful keepalive exchange with `addr`.
    pub fn mark_alive(&self, addr: IpAddr) {
        self.peers.insert(addr, Instant::now());
    }

    /// Learn about a peer for the first time, e.g. from another peer's
    /// gossiped peer list, without resetting an existing peer's clock.
    pub fn learn(&self, addr: IpAddr) {
        self.peers.entry(addr).or_insert_with(Instant::now);
    }

    /// Drop every peer not heard from within `max_silence`.
    pub fn evict_stale(&self, max_silence: Duration) -> Vec<IpAddr> {
        let now = Instant::now();
        let stale: Vec<IpAddr> = self
            .peers
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) > max_silence)
            .map(|entry| *entry.key())
            .collect();
        for addr in &stale {
            self.peers.remove(addr);
        }
        stale
    }

    /// A snapshot of currently known peer addresses.
    pub fn snapshot(&self) -> Vec<IpAddr> {
        self.peers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_and_snapshot_roundtrip() {
        let table = PeerTable::new();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        table.seed([a, b]);
        let mut snapshot = table.snapshot();
        snapshot.sort();
        assert_eq!(snapshot, vec![a, b]);
    }

    #[test]
    fn evict_stale_removes_peers_past_max_silence() {
        let table = PeerTable::new();
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        table.mark_alive(addr);
        let evicted = table.evict_stale(Duration::from_secs(0));
        assert_eq!(evicted, vec![addr]);
        assert!(table.is_empty());
    }

    #[test]
    fn mark_alive_prevents_eviction() {
        let table = PeerTable::new();
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        table.mark_alive(addr);
        let evicted = table.evict_stale(Duration::from_secs(60));
        assert!(evicted.is_empty());
        assert_eq!(table.len(), 1);
    }
}
