//! End-to-end coverage of a virtual handle's two selection modes against
//! real, bound reply sockets: even distribution under `random` mode, and
//! stable single-target routing under `affinity` mode.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beach_handle::{DirectorySource, HandleError, Mode, VirtualHandle};
use beach_proto::{ActorEntry, Category, Realm, Uid};
use beach_transport::{Address, Handler, ReplySocket};
use serde_json::{json, Value};

struct CountingEcho {
    name: &'static str,
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for CountingEcho {
    async fn handle(&self, _request: Value) -> Value {
        self.hits.fetch_add(1, Ordering::SeqCst);
        json!({"status": "ok", "data": {"actor": self.name}})
    }
}

struct FixedEntries(Vec<(Uid, ActorEntry)>);

#[async_trait]
impl DirectorySource for FixedEntries {
    async fn lookup(&self, _realm: &Realm, _category: &Category) -> Result<Vec<(Uid, ActorEntry)>, HandleError> {
        Ok(self.0.clone())
    }
}

async fn spawn_counting_actor(name: &'static str) -> (ActorEntry, Arc<AtomicUsize>) {
    let socket = ReplySocket::bind(Address::Tcp("127.0.0.1:0".parse().unwrap()))
        .await
        .unwrap();
    let Address::Tcp(addr) = socket.local_addr().unwrap() else {
        unreachable!("tcp bind always yields a tcp address")
    };
    let hits = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(CountingEcho { name, hits: Arc::clone(&hits) });
    tokio::spawn(socket.serve(handler));
    let entry = ActorEntry {
        endpoint: beach_proto::Endpoint::new(addr.ip(), addr.port()),
        node: addr.ip(),
    };
    (entry, hits)
}

#[tokio::test]
async fn random_mode_distributes_roughly_evenly_across_two_actors() {
    let (entry_a, hits_a) = spawn_counting_actor("a").await;
    let (entry_b, hits_b) = spawn_counting_actor("b").await;
    let entries = vec![(Uid::new(), entry_a), (Uid::new(), entry_b)];

    let source = Arc::new(FixedEntries(entries));
    let handle = VirtualHandle::open(Realm::default_realm(), Category::new("echoes"), Mode::Random, source);
    tokio::time::sleep(Duration::from_millis(50)).await;

    for _ in 0..1000 {
        handle
            .request(json!({"req": "ping"}), Duration::from_secs(1), None, 3)
            .await
            .expect("request should succeed against a live actor");
    }

    let a = hits_a.load(Ordering::SeqCst);
    let b = hits_b.load(Ordering::SeqCst);
    assert_eq!(a + b, 1000);
    assert!(a > 400 && a < 600, "actor a received {a} of 1000 requests");
    assert!(b > 400 && b < 600, "actor b received {b} of 1000 requests");

    handle.close().await;
}

#[tokio::test]
async fn affinity_mode_always_routes_the_same_key_to_the_same_actor() {
    let (entry_a, hits_a) = spawn_counting_actor("a").await;
    let (entry_b, hits_b) = spawn_counting_actor("b").await;
    let (entry_c, hits_c) = spawn_counting_actor("c").await;
    let entries = vec![(Uid::new(), entry_a), (Uid::new(), entry_b), (Uid::new(), entry_c)];

    let source = Arc::new(FixedEntries(entries));
    let handle = VirtualHandle::open(Realm::default_realm(), Category::new("echoes"), Mode::Affinity, source);
    tokio::time::sleep(Duration::from_millis(50)).await;

    for _ in 0..100 {
        handle
            .request(json!({"req": "ping"}), Duration::from_secs(1), Some("user-42"), 3)
            .await
            .expect("request should succeed against a live actor");
    }

    let counts: HashMap<&str, usize> = HashMap::from([
        ("a", hits_a.load(Ordering::SeqCst)),
        ("b", hits_b.load(Ordering::SeqCst)),
        ("c", hits_c.load(Ordering::SeqCst)),
    ]);
    let hit_targets: Vec<_> = counts.iter().filter(|(_, &n)| n > 0).collect();
    assert_eq!(hit_targets.len(), 1, "exactly one actor should have received all 100 requests: {counts:?}");
    assert_eq!(*hit_targets[0].1, 100);

    handle.close().await;
}
