//! Endpoint selection strategies.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use beach_proto::{ActorEntry, Uid};
use rand::Rng;

/// How a virtual handle picks which of a category's known endpoints to use
/// for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Pick uniformly at random among known entries.
    Random,
    /// Always resolve to the same entry for the same per-call affinity key,
    /// as long as the known set doesn't change shape — good for routing a
    /// series of calls about the same logical subject to one actor
    /// instance. Falls back to random selection when a call supplies no key.
    Affinity,
}

/// Select one `(uid, entry)` pair out of `entries` (non-empty) per `mode`,
/// using `key` for `Mode::Affinity` calls.
///
/// Affinity selection sorts entries by uid before hashing so the same
/// affinity key resolves to the same entry across nodes holding the same
/// directory snapshot, regardless of map iteration order — see the
/// REDESIGN note on the original's positional-index selection.
pub fn select<'a>(mode: Mode, entries: &'a [(Uid, ActorEntry)], key: Option<&str>) -> &'a ActorEntry {
    debug_assert!(!entries.is_empty());
    match (mode, key) {
        (Mode::Random, _) | (Mode::Affinity, None) => {
            let idx = rand::thread_rng().gen_range(0..entries.len());
            &entries[idx].1
        }
        (Mode::Affinity, Some(key)) => {
            let mut order: Vec<usize> = (0..entries.len()).collect();
            order.sort_by_key(|&i| entries[i].0);
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % order.len();
            &entries[order[idx]].1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beach_proto::Endpoint;
    use std::net::IpAddr;

    fn entry(port: u16) -> ActorEntry {
        ActorEntry {
            endpoint: Endpoint::new("127.0.0.1".parse::<IpAddr>().unwrap(), port),
            node: "127.0.0.1".parse().unwrap(),
        }
    }

    #[test]
    fn affinity_is_stable_for_the_same_key_and_entry_set() {
        let entries = vec![
            (Uid::new(), entry(5001)),
            (Uid::new(), entry(5002)),
            (Uid::new(), entry(5003)),
        ];
        let first = select(Mode::Affinity, &entries, Some("customer-42"));
        let second = select(Mode::Affinity, &entries, Some("customer-42"));
        assert_eq!(first, second);
    }

    #[test]
    fn affinity_without_a_key_still_picks_a_known_entry() {
        let entries = vec![(Uid::new(), entry(5001)), (Uid::new(), entry(5002))];
        let picked = select(Mode::Affinity, &entries, None);
        assert!(entries.iter().any(|(_, e)| e == picked));
    }

    #[test]
    fn random_stays_within_bounds() {
        let entries = vec![(Uid::new(), entry(5001)), (Uid::new(), entry(5002))];
        let picked = select(Mode::Random, &entries, None);
        assert!(entries.iter().any(|(_, e)| e == picked));
    }
}
