//! Resolves a realm/category to its current directory entries by asking
//! the owning node controller's local directory socket, the way an actor
//! hosted inside a worker-instance process learns where its peers live
//! without holding its own copy of the cluster directory.

use std::net::IpAddr;

use async_trait::async_trait;
use beach_handle::{DirectorySource, HandleError};
use beach_proto::{ActorEntry, Category, Endpoint, Realm, Uid};
use beach_transport::{Address, RequestSocket};
use serde_json::json;

/// Queries `get_dir` against a node controller's local directory IPC
/// socket on every lookup. The owning `VirtualHandle`'s refresh cadence
/// (§4 C4) already rate-limits how often this runs, so no extra caching
/// happens here.
pub struct NodeOpsDirectorySource {
    directory_ipc_address: Address,
}

impl NodeOpsDirectorySource {
    pub fn new(directory_ipc_address: Address) -> Self {
        Self { directory_ipc_address }
    }
}

#[async_trait]
impl DirectorySource for NodeOpsDirectorySource {
    async fn lookup(&self, realm: &Realm, category: &Category) -> Result<Vec<(Uid, ActorEntry)>, HandleError> {
        let mut socket = RequestSocket::connect(self.directory_ipc_address.clone())
            .await
            .map_err(HandleError::from)?;
        let reply = socket
            .request(
                json!({"req": "get_dir", "realm": realm.as_str(), "category": category.as_str()}),
                std::time::Duration::from_secs(5),
            )
            .await
            .map_err(HandleError::from)?;

        let Some(data) = reply.get("data").and_then(|d| d.as_object()) else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::with_capacity(data.len());
        for (uid_str, value) in data {
            let Ok(uid) = uid_str.parse::<Uid>() else {
                continue;
            };
            let Some(endpoint_str) = value.get("endpoint").and_then(|v| v.as_str()) else {
                continue;
            };
            let Ok(endpoint) = endpoint_str.parse::<Endpoint>() else {
                continue;
            };
            let node: IpAddr = value
                .get("node")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(endpoint.ip());
            entries.push((uid, ActorEntry { endpoint, node }));
        }
        Ok(entries)
    }
}
