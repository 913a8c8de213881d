//! `ClusterClient`: the application-facing entry point to the cluster.
//!
//! Grounded on `beach_api.py`'s `Beach` class line-for-line: construct it
//! with a handful of seed node addresses, it waits briefly for at least one
//! to answer before returning, and a background task keeps its view of
//! live nodes fresh by asking whichever node it can reach for the cluster's
//! current node list every 30 seconds.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use beach_handle::{Mode, VirtualHandle};
use beach_proto::{ActorEntry, Category, Realm, Uid};
use beach_transport::{Address, RequestSocket};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::directory_source::{ClientDirectorySource, NodeList};
use crate::error::ClientError;
use crate::strategy::{pick_node, pick_resource_node, PlacementStrategy};

/// How long `new` waits for a seed node to answer before giving up.
pub const STARTUP_DEADLINE: Duration = Duration::from_secs(5);
/// How often the background task refreshes the known-node list.
pub const NODE_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

pub struct ClusterClient {
    ops_port: u16,
    nodes: NodeList,
    realm: RwLock<Realm>,
    refresh_task: JoinHandle<()>,
}

impl ClusterClient {
    /// Connect to a cluster via `seed_nodes`, waiting up to
    /// [`STARTUP_DEADLINE`] for at least one to answer `host_info`.
    pub async fn connect(seed_nodes: Vec<IpAddr>, ops_port: u16) -> Result<Self, ClientError> {
        let reachable = tokio::time::timeout(STARTUP_DEADLINE, first_reachable(&seed_nodes, ops_port)).await;
        let confirmed = match reachable {
            Ok(Some(ip)) => ip,
            _ => return Err(ClientError::NoNodeReachable),
        };
        debug!(%confirmed, "connected to seed node");

        let nodes: NodeList = Arc::new(RwLock::new(seed_nodes));
        let refresh_task = {
            let nodes = Arc::clone(&nodes);
            tokio::spawn(async move { refresh_loop(nodes, ops_port).await })
        };

        Ok(Self {
            ops_port,
            nodes,
            realm: RwLock::new(Realm::default_realm()),
            refresh_task,
        })
    }

    /// Change the realm used by subsequent calls that don't specify one.
    pub async fn set_realm(&self, realm: Realm) {
        *self.realm.write().await = realm;
    }

    async fn current_realm(&self) -> Realm {
        self.realm.read().await.clone()
    }

    /// Start an actor registered under `actor_name`, published in the
    /// directory under `category`, on a node chosen by `strategy`.
    pub async fn add_actor(
        &self,
        actor_name: &str,
        category: &str,
        strategy: PlacementStrategy,
        realm: Option<Realm>,
    ) -> Result<(Uid, ActorEntry), ClientError> {
        let realm = match realm {
            Some(r) => r,
            None => self.current_realm().await,
        };
        let nodes = self.nodes.read().await.clone();
        let target = match strategy {
            PlacementStrategy::Resource => match pick_resource_node(&nodes, self.ops_port).await {
                Some(node) => node,
                None => pick_node(&PlacementStrategy::Random, &nodes).ok_or(ClientError::NoNodesKnown)?,
            },
            other => pick_node(&other, &nodes).ok_or(ClientError::NoNodesKnown)?,
        };

        let address = Address::Tcp(std::net::SocketAddr::new(target, self.ops_port));
        let mut socket = RequestSocket::connect(address).await?;
        let reply = socket
            .request(
                json!({
                    "req": "start_actor",
                    "actor_name": actor_name,
                    "category": category,
                    "realm": realm.as_str(),
                }),
                Duration::from_secs(10),
            )
            .await?;
        parse_start_actor_reply(&reply)
    }

    /// Stop an actor by uid.
    pub async fn kill_actor(&self, uid: Uid) -> Result<(), ClientError> {
        self.broadcast_until_ok(json!({"req": "kill_actor", "uid": uid.to_string()}))
            .await
    }

    /// Fetch every entry currently published for `category` in `realm`
    /// (or the client's current realm).
    pub async fn get_directory(
        &self,
        realm: Option<Realm>,
        category: &str,
    ) -> Result<Vec<(Uid, ActorEntry)>, ClientError> {
        let realm = match realm {
            Some(r) => r,
            None => self.current_realm().await,
        };
        let nodes = self.nodes.read().await.clone();
        for node in nodes {
            let address = Address::Tcp(std::net::SocketAddr::new(node, self.ops_port));
            let Ok(mut socket) = RequestSocket::connect(address).await else { continue };
            let Ok(reply) = socket
                .request(
                    json!({"req": "get_dir", "realm": realm.as_str(), "category": category}),
                    Duration::from_secs(5),
                )
                .await
            else {
                continue;
            };
            return parse_directory_reply(&reply);
        }
        Err(ClientError::NoNodesKnown)
    }

    /// Administratively stop and remove every actor cluster-wide.
    pub async fn flush(&self) -> Result<(), ClientError> {
        let nodes = self.nodes.read().await.clone();
        let mut last_err = None;
        for node in nodes {
            let address = Address::Tcp(std::net::SocketAddr::new(node, self.ops_port));
            let result = async {
                let mut socket = RequestSocket::connect(address).await?;
                socket.request(json!({"req": "flush"}), Duration::from_secs(10)).await
            }
            .await;
            if let Err(err) = result {
                warn!(%node, error = %err, "flush failed against node");
                last_err = Some(ClientError::from(err));
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// A self-refreshing, pooled handle to every actor published under
    /// `category` in `realm` (or the client's current realm).
    pub async fn get_actor_handle(&self, category: Category, realm: Option<Realm>, mode: Mode) -> VirtualHandle {
        let realm = match realm {
            Some(r) => r,
            None => self.current_realm().await,
        };
        let source = Arc::new(ClientDirectorySource::new(Arc::clone(&self.nodes), self.ops_port));
        VirtualHandle::open(realm, category, mode, source)
    }

    async fn broadcast_until_ok(&self, body: Value) -> Result<(), ClientError> {
        let nodes = self.nodes.read().await.clone();
        for node in nodes {
            let address = Address::Tcp(std::net::SocketAddr::new(node, self.ops_port));
            let result = async {
                let mut socket = RequestSocket::connect(address).await?;
                socket.request(body.clone(), Duration::from_secs(5)).await
            }
            .await;
            if let Ok(reply) = result {
                if reply.get("status").and_then(Value::as_str) == Some("ok") {
                    return Ok(());
                }
            }
        }
        Err(ClientError::NoNodesKnown)
    }

    /// Stop the background node-refresh task.
    pub fn close(self) {
        self.refresh_task.abort();
    }
}

async fn first_reachable(seeds: &[IpAddr], ops_port: u16) -> Option<IpAddr> {
    for seed in seeds {
        let address = Address::Tcp(std::net::SocketAddr::new(*seed, ops_port));
        if let Ok(mut socket) = RequestSocket::connect(address).await {
            if socket
                .request(json!({"req": "host_info"}), Duration::from_secs(2))
                .await
                .is_ok()
            {
                return Some(*seed);
            }
        }
    }
    None
}

async fn refresh_loop(nodes: NodeList, ops_port: u16) {
    loop {
        tokio::time::sleep(NODE_REFRESH_INTERVAL).await;
        let snapshot = nodes.read().await.clone();
        for node in snapshot {
            let address = Address::Tcp(std::net::SocketAddr::new(node, ops_port));
            let Ok(mut socket) = RequestSocket::connect(address).await else { continue };
            let Ok(reply) = socket.request(json!({"req": "get_nodes"}), Duration::from_secs(5)).await else {
                continue;
            };
            if let Some(new_nodes) = reply
                .get("data")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str()?.parse().ok()).collect::<Vec<IpAddr>>())
            {
                if !new_nodes.is_empty() {
                    *nodes.write().await = new_nodes;
                }
            }
            break;
        }
    }
}

fn parse_start_actor_reply(reply: &Value) -> Result<(Uid, ActorEntry), ClientError> {
    let data = reply
        .get("data")
        .ok_or_else(|| ClientError::MalformedReply("missing data".into()))?;
    let uid: Uid = data
        .get("uid")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::MalformedReply("missing uid".into()))?
        .parse()
        .map_err(|_| ClientError::MalformedReply("invalid uid".into()))?;
    let endpoint = data
        .get("endpoint")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::MalformedReply("missing endpoint".into()))?
        .parse()
        .map_err(|_| ClientError::MalformedReply("invalid endpoint".into()))?;
    let node = endpoint.ip();
    Ok((uid, ActorEntry { endpoint, node }))
}

fn parse_directory_reply(reply: &Value) -> Result<Vec<(Uid, ActorEntry)>, ClientError> {
    let data = reply
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| ClientError::MalformedReply("missing data".into()))?;
    let mut entries = Vec::with_capacity(data.len());
    for (uid_str, value) in data {
        let Ok(uid) = uid_str.parse::<Uid>() else { continue };
        let Some(endpoint_str) = value.get("endpoint").and_then(Value::as_str) else { continue };
        let Ok(endpoint) = endpoint_str.parse::<beach_proto::Endpoint>() else { continue };
        let node = value
            .get("node")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| endpoint.ip());
        entries.push((uid, ActorEntry { endpoint, node }));
    }
    Ok(entries)
}
