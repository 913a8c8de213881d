//! The node controller's ops dispatcher: `keepalive`, `start_actor`,
//! `kill_actor`, `remove_actor`, `host_info`, `get_full_dir`, `get_dir`,
//! `get_nodes`, `flush`, `get_dir_sync`, `push_dir_sync` (§4 C6, §5).

use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use beach_proto::{error_message, success_message, ErrorKind, Reply, Request, Uid};
use beach_transport::Handler as TransportHandler;
use serde_json::{json, Value};
use tracing::warn;

use crate::controller::{ActorLocation, NodeController};
use crate::error::NodeError;

#[async_trait]
impl TransportHandler for NodeController {
    async fn handle(&self, request: Value) -> Value {
        let reply = match Request::decode(request) {
            Ok(req) => self.dispatch(req).await,
            Err(_) => error_message(ErrorKind::InvalidRequest, None),
        };
        serde_json::to_value(reply).unwrap_or_else(|_| {
            serde_json::to_value(error_message(ErrorKind::Exception, None)).expect("serializes")
        })
    }
}

impl NodeController {
    async fn dispatch(&self, req: Request) -> Reply {
        let args = Value::Object(req.args);
        let result = match req.op.as_str() {
            "keepalive" => Ok(self.op_keepalive()),
            "host_info" => Ok(self.op_host_info()),
            "get_full_dir" => Ok(self.op_get_full_dir().await),
            "get_dir" => self.op_get_dir(&args).await,
            "get_nodes" => Ok(self.op_get_nodes()),
            "start_actor" => self.op_start_actor(&args).await,
            "kill_actor" => self.op_kill_actor(&args).await,
            "remove_actor" => self.op_remove_actor(&args).await,
            "flush" => self.op_flush().await,
            "get_dir_sync" => Ok(self.op_get_dir_sync().await),
            "push_dir_sync" => self.op_push_dir_sync(&args).await,
            _ => return error_message(ErrorKind::UnknownRequest, None),
        };
        match result {
            Ok(data) => success_message(data),
            Err(err) => {
                warn!(op = %req.op, error = %err, "ops request failed");
                error_message(err.wire_kind(), None)
            }
        }
    }

    fn op_keepalive(&self) -> Option<Value> {
        None
    }

    fn op_host_info(&self) -> Option<Value> {
        // First sample after process start reads 0 for every core; sysinfo needs a
        // prior refresh to compute a delta. Acceptable here since callers poll
        // this repeatedly (client resource strategy, node-refresh loop).
        let mut system = sysinfo::System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        let cpu: Vec<f32> = system.cpus().iter().map(|c| c.cpu_usage()).collect();
        let mem_percent = if system.total_memory() > 0 {
            (system.used_memory() as f64 / system.total_memory() as f64) * 100.0
        } else {
            0.0
        };

        Some(json!({
            "ip": self.bind_ip.to_string(),
            "uptime_seconds": self.started_at.elapsed().as_secs(),
            "n_peers": self.peers.len(),
            "n_instances": self.instances.pooled_count(),
            "n_actors": self.locations.len(),
            "info": {
                "cpu": cpu,
                "mem": mem_percent,
            },
        }))
    }

    async fn op_get_full_dir(&self) -> Option<Value> {
        Some(json!(self.directory.snapshot().await))
    }

    async fn op_get_dir(&self, args: &Value) -> Result<Option<Value>, NodeError> {
        let category = args
            .get("category")
            .and_then(Value::as_str)
            .ok_or(NodeError::NoCategorySpecified)?;
        let realm = args
            .get("realm")
            .and_then(Value::as_str)
            .map(beach_proto::Realm::new)
            .unwrap_or_default();
        let category = beach_proto::Category::new(category);
        let entries = self.directory.category_entries(&realm, &category).await;
        let data: serde_json::Map<String, Value> = entries
            .into_iter()
            .map(|(uid, entry)| (uid.to_string(), json!(entry)))
            .collect();
        Ok(Some(Value::Object(data)))
    }

    fn op_get_nodes(&self) -> Option<Value> {
        let mut nodes: Vec<String> = self.peers.snapshot().iter().map(ToString::to_string).collect();
        nodes.push(self.bind_ip.to_string());
        Some(json!(nodes))
    }

    async fn op_start_actor(&self, args: &Value) -> Result<Option<Value>, NodeError> {
        let actor_name = args
            .get("actor_name")
            .and_then(Value::as_str)
            .ok_or(NodeError::MissingStartField("actor_name"))?;
        let category_str = args
            .get("category")
            .and_then(Value::as_str)
            .ok_or(NodeError::MissingStartField("category"))?;
        let realm = args
            .get("realm")
            .and_then(Value::as_str)
            .map(beach_proto::Realm::new)
            .unwrap_or_default();
        let category = beach_proto::Category::new(category_str);
        let uid = args
            .get("uid")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Uid>().ok())
            .unwrap_or_default();
        let isolated = args.get("isolated").and_then(Value::as_bool).unwrap_or(false);

        let port = self.ports.allocate()?;
        let instance_address = if isolated {
            let instance = self.instances.spawn_isolated().await?;
            let address = instance.ops_socket.clone();
            self.isolated_instances.insert(uid, instance);
            address
        } else {
            self.instances.pick_pooled()?
        };

        let start_result = self
            .ask_instance(
                &instance_address,
                json!({
                    "req": "start_actor",
                    "actor_name": actor_name,
                    "category": category_str,
                    "uid": uid.to_string(),
                    "port": port,
                    "realm": realm.as_str(),
                }),
            )
            .await;

        let endpoint = match start_result {
            Ok(reply) => reply
                .get("data")
                .and_then(|d| d.get("endpoint"))
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<beach_proto::Endpoint>().ok())
                .unwrap_or_else(|| beach_proto::Endpoint::new(self.bind_ip, port)),
            Err(err) => {
                self.ports.release(port);
                if isolated {
                    if let Some((_, instance)) = self.isolated_instances.remove(&uid) {
                        self.instances.stop_isolated(instance, Duration::from_secs(5)).await;
                    }
                }
                return Err(err);
            }
        };

        self.directory
            .insert(
                realm.clone(),
                category.clone(),
                uid,
                beach_proto::ActorEntry {
                    endpoint,
                    node: self.bind_ip,
                },
            )
            .await;
        self.locations.insert(
            uid,
            ActorLocation {
                instance: instance_address,
                realm,
                category,
                port,
                isolated,
            },
        );
        self.mark_dirty();

        Ok(Some(json!({"uid": uid.to_string(), "endpoint": endpoint.to_string()})))
    }

    /// Accepts either a single `uid` string or an array of them, stopping
    /// each and aggregating failures the same way `op_flush` does.
    async fn op_kill_actor(&self, args: &Value) -> Result<Option<Value>, NodeError> {
        let uids = parse_uids(args)?;
        let attempted = uids.len();
        let mut failed = 0;
        for uid in uids {
            if self.stop_actor(uid).await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(NodeError::SomeActorsFailedToStop { failed, attempted });
        }
        Ok(None)
    }

    async fn stop_actor(&self, uid: Uid) -> Result<(), NodeError> {
        let (_, location) = self
            .locations
            .remove(&uid)
            .ok_or_else(|| NodeError::ActorNotFound(uid.to_string()))?;

        let stop_result = self
            .ask_instance(&location.instance, json!({"req": "kill_actor", "uid": uid.to_string()}))
            .await;
        self.ports.release(location.port);

        if location.isolated {
            if let Some((_, instance)) = self.isolated_instances.remove(&uid) {
                self.instances.stop_isolated(instance, Duration::from_secs(5)).await;
            }
        }

        let removed = self
            .directory
            .remove(&location.realm, &location.category, &uid)
            .await;
        self.directory.tombstone(uid).await;
        self.mark_dirty();

        if removed.is_none() {
            return Err(NodeError::ErrorRemovingActorFromDirectoryAfterStop(uid.to_string()));
        }
        stop_result.map(|_| ())
    }

    async fn op_remove_actor(&self, args: &Value) -> Result<Option<Value>, NodeError> {
        let uid = parse_uid(args, NodeError::MissingRemoveField("uid"))?;
        if let Some((_, location)) = self.locations.remove(&uid) {
            self.ports.release(location.port);
            self.directory
                .remove(&location.realm, &location.category, &uid)
                .await;
        }
        self.directory.tombstone(uid).await;
        self.mark_dirty();
        Ok(None)
    }

    async fn op_flush(&self) -> Result<Option<Value>, NodeError> {
        let uids: Vec<Uid> = self.locations.iter().map(|entry| *entry.key()).collect();
        let attempted = uids.len();
        let mut failed = 0;
        for uid in uids {
            if self.stop_actor(uid).await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(NodeError::SomeActorsFailedToStop { failed, attempted });
        }
        Ok(None)
    }

    async fn op_get_dir_sync(&self) -> Option<Value> {
        Some(json!({
            "directory": self.directory.snapshot().await,
            "tombstones": self.directory.tombstones_snapshot().await,
        }))
    }

    async fn op_push_dir_sync(&self, args: &Value) -> Result<Option<Value>, NodeError> {
        let directory: beach_proto::Directory = args
            .get("directory")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or(NodeError::MissingDirectoryUpdateField("directory"))?;
        let tombstones: beach_proto::TombstoneSet = args
            .get("tombstones")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or(NodeError::MissingDirectoryUpdateField("tombstones"))?;
        self.directory.merge(&directory, &tombstones).await;
        Ok(None)
    }

    async fn ask_instance(&self, address: &beach_transport::Address, body: Value) -> Result<Value, NodeError> {
        let mut socket = beach_transport::RequestSocket::connect(address.clone()).await?;
        let reply = socket.request(body, Duration::from_secs(5)).await?;
        Ok(reply)
    }
}

fn parse_uid(args: &Value, missing: NodeError) -> Result<Uid, NodeError> {
    args.get("uid")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Uid>().ok())
        .ok_or(missing)
}

/// `kill_actor`'s `uid` field accepts either a single uid string or an
/// array of them.
fn parse_uids(args: &Value) -> Result<Vec<Uid>, NodeError> {
    match args.get("uid") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .and_then(|s| s.parse::<Uid>().ok())
                    .ok_or(NodeError::MissingStopField("uid"))
            })
            .collect(),
        _ => parse_uid(args, NodeError::MissingStopField("uid")).map(|uid| vec![uid]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uid_rejects_malformed_string() {
        let args = json!({"uid": "not-a-uuid"});
        assert!(parse_uid(&args, NodeError::MissingStopField("uid")).is_err());
    }

    #[test]
    fn parse_uid_accepts_valid_uuid() {
        let uid = Uid::new();
        let args = json!({"uid": uid.to_string()});
        assert_eq!(parse_uid(&args, NodeError::MissingStopField("uid")).unwrap(), uid);
    }

    #[test]
    fn parse_uids_accepts_a_scalar() {
        let uid = Uid::new();
        let args = json!({"uid": uid.to_string()});
        assert_eq!(parse_uids(&args).unwrap(), vec![uid]);
    }

    #[test]
    fn parse_uids_accepts_an_array() {
        let a = Uid::new();
        let b = Uid::new();
        let args = json!({"uid": [a.to_string(), b.to_string()]});
        assert_eq!(parse_uids(&args).unwrap(), vec![a, b]);
    }

    #[test]
    fn parse_uids_rejects_malformed_array_entry() {
        let args = json!({"uid": [Uid::new().to_string(), "not-a-uuid"]});
        assert!(parse_uids(&args).is_err());
    }
}
