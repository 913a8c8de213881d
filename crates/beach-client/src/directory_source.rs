//! Resolves a category by asking whichever known node answers first,
//! backing the `VirtualHandle`s `ClusterClient::get_actor_handle` hands out.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beach_handle::{DirectorySource, HandleError};
use beach_proto::{ActorEntry, Category, Endpoint, Realm, Uid};
use beach_transport::{Address, RequestSocket};
use serde_json::json;
use tokio::sync::RwLock;

/// Shared, periodically-refreshed view of known node IPs, written by
/// `ClusterClient`'s node-refresh task and read by every
/// `ClientDirectorySource` handed out since.
pub type NodeList = Arc<RwLock<Vec<IpAddr>>>;

pub struct ClientDirectorySource {
    nodes: NodeList,
    ops_port: u16,
}

impl ClientDirectorySource {
    pub fn new(nodes: NodeList, ops_port: u16) -> Self {
        Self { nodes, ops_port }
    }
}

#[async_trait]
impl DirectorySource for ClientDirectorySource {
    async fn lookup(&self, realm: &Realm, category: &Category) -> Result<Vec<(Uid, ActorEntry)>, HandleError> {
        let nodes = self.nodes.read().await.clone();
        let mut last_err = None;
        for node in nodes {
            let address = Address::Tcp(std::net::SocketAddr::new(node, self.ops_port));
            match query_node(address, realm, category).await {
                Ok(entries) => return Ok(entries),
                Err(err) => last_err = Some(err),
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(Vec::new()),
        }
    }
}

async fn query_node(address: Address, realm: &Realm, category: &Category) -> Result<Vec<(Uid, ActorEntry)>, HandleError> {
    let mut socket = RequestSocket::connect(address).await?;
    let reply = socket
        .request(
            json!({"req": "get_dir", "realm": realm.as_str(), "category": category.as_str()}),
            Duration::from_secs(5),
        )
        .await?;

    let Some(data) = reply.get("data").and_then(|d| d.as_object()) else {
        return Ok(Vec::new());
    };
    let mut entries = Vec::with_capacity(data.len());
    for (uid_str, value) in data {
        let Ok(uid) = uid_str.parse::<Uid>() else { continue };
        let Some(endpoint_str) = value.get("endpoint").and_then(|v| v.as_str()) else { continue };
        let Ok(endpoint) = endpoint_str.parse::<Endpoint>() else { continue };
        let node = value
            .get("node")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| endpoint.ip());
        entries.push((uid, ActorEntry { endpoint, node }));
    }
    Ok(entries)
}
