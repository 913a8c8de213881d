//! `NodeController`: the long-lived process that hosts a slice of the
//! cluster's actors, gossips the directory with its peers, and supervises
//! the worker-instance processes it pools actors into.
//!
//! Grounded directly on `hostmanager.py`'s `HostManager` class — this
//! struct and its six background loops are a near line-for-line mapping of
//! that class's `_svc_*` methods onto `tokio::spawn`ed tasks.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use beach_proto::ClusterConfig;
use beach_transport::Address;
use dashmap::DashMap;
use serde_json::json;
use tracing::{info, warn};

use crate::directory_store::DirectoryStore;
use crate::instance_pool::{InstancePool, InstancePoolConfig, PooledInstance};
use crate::peer::PeerTable;
use crate::ports::FreePortSet;

/// Where a running actor lives, tracked so `kill_actor`/`remove_actor` know
/// which worker-instance process and directory entry to touch.
pub struct ActorLocation {
    pub instance: Address,
    pub realm: beach_proto::Realm,
    pub category: beach_proto::Category,
    pub port: u16,
    /// True if this actor owns a dedicated worker-instance process (tracked
    /// in `NodeController::isolated_instances`) rather than sharing a pooled
    /// one.
    pub isolated: bool,
}

/// Everything one node controller owns.
pub struct NodeController {
    pub config: ClusterConfig,
    pub bind_ip: IpAddr,
    pub ops_port: u16,
    /// Local, host-only Unix socket co-located actors resolve `get_dir`
    /// against, instead of round-tripping over the TCP ops socket.
    pub directory_ipc: Address,
    pub started_at: Instant,
    pub peers: PeerTable,
    pub directory: DirectoryStore,
    pub instances: InstancePool,
    pub ports: FreePortSet,
    pub locations: DashMap<beach_proto::Uid, ActorLocation>,
    /// Worker-instance processes spawned for a single isolated actor,
    /// retained here for the actor's whole lifetime so the `PooledInstance`
    /// (and its `kill_on_drop` child handle) isn't dropped, and hence
    /// killed, the moment `op_start_actor` returns.
    pub isolated_instances: DashMap<beach_proto::Uid, PooledInstance>,
    pub directory_dirty: AtomicBool,
}

impl NodeController {
    pub fn new(config: ClusterConfig, bind_ip: IpAddr, instance_binary: PathBuf) -> Arc<Self> {
        let ops_port = config.ops_port;
        let directory_ipc = Address::Unix(beach_transport::instance_socket_path());
        let instances = InstancePool::new(InstancePoolConfig {
            instance_binary,
            bind_ip,
            directory_ipc_address: directory_ipc.clone(),
            strategy: config.instance_strategy,
        });
        let ports = FreePortSet::new(config.port_range_start, config.port_range_end);

        let peers = PeerTable::new();
        let seed_ips = config
            .seed_nodes
            .iter()
            .filter_map(|s| s.parse::<IpAddr>().ok());
        peers.seed(seed_ips);

        Arc::new(Self {
            config,
            bind_ip,
            ops_port,
            directory_ipc,
            started_at: Instant::now(),
            peers,
            directory: DirectoryStore::new(),
            instances,
            ports,
            locations: DashMap::new(),
            isolated_instances: DashMap::new(),
            directory_dirty: AtomicBool::new(false),
        })
    }

    pub fn mark_dirty(&self) {
        self.directory_dirty.store(true, Ordering::Relaxed);
    }

    /// Start the ops socket and all six background loops; runs forever.
    pub async fn run(self: Arc<Self>) -> Result<(), beach_transport::TransportError> {
        self.instances
            .ensure_pooled(self.config.resolved_n_processes())
            .await
            .map_err(|err| beach_transport::TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string())))?;

        let ops_task = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.serve_ops_socket().await })
        };
        let directory_service_task = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.serve_directory_socket().await })
        };
        let instance_keepalive_task = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.instance_keepalive_loop().await })
        };
        let peer_keepalive_task = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.peer_keepalive_loop().await })
        };
        let pull_sync_task = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.directory_pull_loop().await })
        };
        let push_sync_task = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.directory_push_loop().await })
        };
        let tombstone_task = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.tombstone_cull_loop().await })
        };

        let result = ops_task.await;
        directory_service_task.abort();
        instance_keepalive_task.abort();
        peer_keepalive_task.abort();
        pull_sync_task.abort();
        push_sync_task.abort();
        tombstone_task.abort();
        result.unwrap_or(Ok(()))
    }

    async fn serve_ops_socket(self: &Arc<Self>) -> Result<(), beach_transport::TransportError> {
        let address = Address::Tcp(std::net::SocketAddr::new(self.bind_ip, self.ops_port));
        let socket = beach_transport::ReplySocket::bind(address).await?;
        info!(ip = %self.bind_ip, port = self.ops_port, "node controller ops socket listening");
        socket.serve(Arc::clone(self) as Arc<dyn beach_transport::Handler>).await
    }

    /// Local directory service (§4.6): co-located actors resolve `get_dir`
    /// against this Unix socket instead of the TCP ops socket, so lookups
    /// never leave the host. Shares the same ops dispatcher as the TCP
    /// socket — it's a Unix domain socket, already unreachable off-host, so
    /// nothing is gained by duplicating a get_dir-only handler.
    async fn serve_directory_socket(self: &Arc<Self>) -> Result<(), beach_transport::TransportError> {
        let socket = beach_transport::ReplySocket::bind(self.directory_ipc.clone()).await?;
        info!(address = %self.directory_ipc, "node controller local directory socket listening");
        socket.serve(Arc::clone(self) as Arc<dyn beach_transport::Handler>).await
    }

    async fn instance_keepalive_loop(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.instance_keepalive_seconds);
        loop {
            self.instances.keepalive_all(Duration::from_secs(2)).await;
            let target = self.config.resolved_n_processes();
            if let Err(err) = self.instances.ensure_pooled(target).await {
                warn!(error = %err, "failed to replenish worker-instance pool");
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn peer_keepalive_loop(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.peer_keepalive_seconds);
        loop {
            let snapshot = self.peers.snapshot();
            for peer_ip in snapshot {
                let address = Address::Tcp(std::net::SocketAddr::new(peer_ip, self.ops_port));
                let alive = match beach_transport::RequestSocket::connect(address).await {
                    Ok(mut socket) => socket
                        .request(json!({"req": "keepalive"}), Duration::from_secs(2))
                        .await
                        .is_ok(),
                    Err(_) => false,
                };
                if alive {
                    self.peers.mark_alive(peer_ip);
                }
            }
            let evicted = self.peers.evict_stale(interval.saturating_mul(2));
            for addr in evicted {
                warn!(%addr, "evicted unresponsive peer");
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Pulls the full directory from one peer per round, advancing through
    /// an explicit snapshot + cursor rather than indexing into a live,
    /// concurrently-mutated map by iteration order.
    async fn directory_pull_loop(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.directory_sync_seconds);
        let mut cursor: usize = 0;
        loop {
            let snapshot: Vec<IpAddr> = self.peers.snapshot();
            if !snapshot.is_empty() {
                cursor %= snapshot.len();
                let peer_ip = snapshot[cursor];
                cursor = (cursor + 1) % snapshot.len();
                self.pull_from_peer(peer_ip).await;
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn pull_from_peer(&self, peer_ip: IpAddr) {
        let address = Address::Tcp(std::net::SocketAddr::new(peer_ip, self.ops_port));
        let result = async {
            let mut socket = beach_transport::RequestSocket::connect(address).await?;
            socket
                .request(json!({"req": "get_dir_sync"}), Duration::from_secs(5))
                .await
        }
        .await;

        match result {
            Ok(reply) => self.apply_sync_reply(&reply).await,
            Err(err) => warn!(%peer_ip, error = %err, "directory pull-sync failed"),
        }
    }

    async fn apply_sync_reply(&self, reply: &serde_json::Value) {
        let Some(data) = reply.get("data") else { return };
        let directory: Option<beach_proto::Directory> = data
            .get("directory")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let tombstones: Option<beach_proto::TombstoneSet> = data
            .get("tombstones")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        if let (Some(directory), Some(tombstones)) = (directory, tombstones) {
            self.directory.merge(&directory, &tombstones).await;
        }
    }

    /// Pushes this node's directory to every peer at most once per
    /// interval, coalescing however many local mutations happened in
    /// between into a single round.
    async fn directory_push_loop(self: Arc<Self>) {
        let interval = Duration::from_secs(5);
        loop {
            tokio::time::sleep(interval).await;
            if !self.directory_dirty.swap(false, Ordering::Relaxed) {
                continue;
            }
            let directory = self.directory.snapshot().await;
            let tombstones = self.directory.tombstones_snapshot().await;
            let payload = json!({
                "req": "push_dir_sync",
                "directory": directory,
                "tombstones": tombstones,
            });
            for peer_ip in self.peers.snapshot() {
                let address = Address::Tcp(std::net::SocketAddr::new(peer_ip, self.ops_port));
                let payload = payload.clone();
                tokio::spawn(async move {
                    if let Ok(mut socket) = beach_transport::RequestSocket::connect(address).await {
                        let _ = socket.request(payload, Duration::from_secs(5)).await;
                    }
                });
            }
        }
    }

    async fn tombstone_cull_loop(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.tombstone_culling_seconds);
        let max_age = chrono::Duration::seconds(self.config.tombstone_culling_seconds as i64);
        loop {
            let start = Instant::now();
            self.directory.cull_tombstones(max_age).await;
            let elapsed = start.elapsed();
            tokio::time::sleep(interval.saturating_sub(elapsed)).await;
        }
    }

    pub async fn shutdown(&self) {
        self.instances.shutdown_all(Duration::from_secs(5)).await;
        let isolated_uids: Vec<_> = self.isolated_instances.iter().map(|entry| *entry.key()).collect();
        for uid in isolated_uids {
            if let Some((_, instance)) = self.isolated_instances.remove(&uid) {
                self.instances.stop_isolated(instance, Duration::from_secs(5)).await;
            }
        }
    }
}
