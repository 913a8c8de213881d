//! `WorkerInstanceHost`: one OS process pooling many actors, answering its
//! owning node controller's `keepalive`/`start_actor`/`kill_actor` ops over
//! a Unix domain socket.
//!
//! Grounded on `hostmanager.py`'s instance-process contract: each
//! worker-instance process binds exactly one ops socket the node controller
//! talks to, and every actor it hosts gets its own reply socket bound to a
//! node-controller-assigned port.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use beach_proto::{error_message, success_message, ErrorKind, Reply, Uid};
use beach_runtime::{ActorContext, ActorHandleProvider, ActorRuntime};
use beach_transport::{Address, Handler as TransportHandler, ReplySocket};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::catalog::ActorCatalog;
use crate::error::HostError;

struct RunningActor {
    ctx: ActorContext,
    join_handle: JoinHandle<()>,
    category: String,
}

/// Configuration fixed for the lifetime of a worker-instance process.
pub struct HostConfig {
    pub bind_ip: IpAddr,
    pub ops_socket: Address,
    pub stop_grace: Duration,
}

/// A running worker-instance process's in-memory state.
pub struct WorkerInstanceHost {
    config: HostConfig,
    catalog: ActorCatalog,
    handle_provider: Arc<dyn ActorHandleProvider>,
    running: Mutex<HashMap<Uid, RunningActor>>,
    started_at: Instant,
}

impl WorkerInstanceHost {
    pub fn new(config: HostConfig, catalog: ActorCatalog, handle_provider: Arc<dyn ActorHandleProvider>) -> Arc<Self> {
        Arc::new(Self {
            config,
            catalog,
            handle_provider,
            running: Mutex::new(HashMap::new()),
            started_at: Instant::now(),
        })
    }

    /// Bind the ops socket and serve `keepalive`/`start_actor`/`kill_actor`
    /// forever.
    pub async fn serve(self: Arc<Self>) -> Result<(), beach_transport::TransportError> {
        let socket = ReplySocket::bind(self.config.ops_socket.clone()).await?;
        info!(address = %self.config.ops_socket, "worker-instance host listening");
        socket.serve(Arc::clone(&self) as Arc<dyn TransportHandler>).await
    }

    async fn keepalive(&self) -> Reply {
        let running = self.running.lock().await;
        success_message(Some(json!({
            "uptime_seconds": self.started_at.elapsed().as_secs(),
            "n_actors": running.len(),
        })))
    }

    async fn start_actor(&self, args: &Value) -> Reply {
        match self.try_start_actor(args).await {
            Ok(data) => success_message(Some(data)),
            Err(err) => {
                warn!(error = %err, "start_actor failed");
                error_message(err.wire_kind(), None)
            }
        }
    }

    async fn try_start_actor(&self, args: &Value) -> Result<Value, HostError> {
        let actor_name = args
            .get("actor_name")
            .and_then(Value::as_str)
            .ok_or(HostError::MissingStartField("actor_name"))?;
        let category = args
            .get("category")
            .and_then(Value::as_str)
            .ok_or(HostError::MissingStartField("category"))?;
        let uid_str = args
            .get("uid")
            .and_then(Value::as_str)
            .ok_or(HostError::MissingStartField("uid"))?;
        let port = args
            .get("port")
            .and_then(Value::as_u64)
            .ok_or(HostError::MissingStartField("port"))? as u16;
        let realm = args
            .get("realm")
            .and_then(Value::as_str)
            .map(beach_proto::Realm::new)
            .unwrap_or_default();
        let uid: Uid = uid_str
            .parse()
            .map_err(|_| HostError::MissingStartField("uid"))?;

        let actor = self
            .catalog
            .build(actor_name)
            .ok_or_else(|| HostError::UnknownActorName(actor_name.to_string()))?;

        let ctx = ActorContext::new(
            realm,
            beach_proto::Category::new(category),
            uid,
            Arc::clone(&self.handle_provider),
        );
        let address = Address::Tcp(std::net::SocketAddr::new(self.config.bind_ip, port));
        let endpoint = beach_proto::Endpoint::new(self.config.bind_ip, port);

        let run_ctx = ctx.clone();
        let join_handle = tokio::spawn(async move {
            if let Err(err) = ActorRuntime::run(actor, run_ctx, address).await {
                warn!(error = %err, "actor exited with error");
            }
        });

        self.running.lock().await.insert(
            uid,
            RunningActor {
                ctx,
                join_handle,
                category: category.to_string(),
            },
        );

        Ok(json!({"endpoint": endpoint.to_string()}))
    }

    async fn kill_actor(&self, args: &Value) -> Reply {
        match self.try_kill_actor(args).await {
            Ok(()) => success_message(None),
            Err(err) => {
                warn!(error = %err, "kill_actor failed");
                error_message(err.wire_kind(), None)
            }
        }
    }

    async fn try_kill_actor(&self, args: &Value) -> Result<(), HostError> {
        let uid_str = args
            .get("uid")
            .and_then(Value::as_str)
            .ok_or(HostError::MissingStopField("uid"))?;
        let uid: Uid = uid_str
            .parse()
            .map_err(|_| HostError::MissingStopField("uid"))?;

        let running = self
            .running
            .lock()
            .await
            .remove(&uid)
            .ok_or_else(|| HostError::ActorNotFound(uid_str.to_string()))?;

        ActorRuntime::request_stop(&running.ctx);
        match tokio::time::timeout(self.config.stop_grace, running.join_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => warn!(error = %join_err, category = %running.category, "actor task panicked"),
            Err(_) => warn!(category = %running.category, "actor did not stop within grace period, abandoning task"),
        }
        Ok(())
    }
}

#[async_trait]
impl TransportHandler for WorkerInstanceHost {
    async fn handle(&self, request: Value) -> Value {
        let reply = match beach_proto::Request::decode(request) {
            Ok(req) => match req.op.as_str() {
                "keepalive" => self.keepalive().await,
                "start_actor" => self.start_actor(&Value::Object(req.args)).await,
                "kill_actor" => self.kill_actor(&Value::Object(req.args)).await,
                _ => error_message(ErrorKind::UnknownRequest, None),
            },
            Err(_) => error_message(ErrorKind::InvalidRequest, None),
        };
        serde_json::to_value(reply).unwrap_or_else(|_| {
            serde_json::to_value(error_message(ErrorKind::Exception, None)).expect("serializes")
        })
    }
}
