//! Exercises a worker-instance host the way its owning node controller
//! does: start an actor over the ops socket, talk to it directly on its
//! own endpoint, then stop it and confirm it stops answering.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beach_instance::{ActorCatalog, HostConfig, WorkerInstanceHost};
use beach_proto::{Category, Realm, Uid};
use beach_runtime::{
    Actor, ActorContext, ActorHandleProvider, DynamicHandle, HandleMode, HandlerResult, HandlerTable, RuntimeError,
};
use beach_transport::{Address, RequestSocket};
use serde_json::json;

struct NoopProvider;

#[async_trait]
impl ActorHandleProvider for NoopProvider {
    async fn get_actor_handle(
        &self,
        _realm: Realm,
        category: Category,
        _mode: HandleMode,
    ) -> Result<Arc<dyn DynamicHandle>, RuntimeError> {
        Err(RuntimeError::CategoryUnavailable(category.to_string()))
    }

    async fn is_category_available(&self, _realm: &Realm, _category: &Category) -> bool {
        false
    }
}

struct EchoActor;

#[async_trait]
impl Actor for EchoActor {
    async fn init(&self, _ctx: &ActorContext) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn register_handlers(&self) -> HandlerTable {
        let mut table = HandlerTable::new();
        table.add_handler("ping", |_args, _ctx| async move {
            let result: HandlerResult = Ok(Some(json!({"pong": true})));
            result
        });
        table
    }
}

async fn free_port() -> u16 {
    let probe = beach_transport::ReplySocket::bind(Address::Tcp("127.0.0.1:0".parse().unwrap()))
        .await
        .unwrap();
    let Address::Tcp(addr) = probe.local_addr().unwrap() else {
        unreachable!()
    };
    drop(probe);
    addr.port()
}

#[tokio::test]
async fn start_talk_to_and_kill_an_actor() {
    let ops_socket = Address::Unix(beach_transport::instance_socket_path());
    let bind_ip: std::net::IpAddr = "127.0.0.1".parse().unwrap();

    let mut catalog = ActorCatalog::new();
    catalog.register("EchoActor", || Arc::new(EchoActor) as Arc<dyn Actor>);

    let host = WorkerInstanceHost::new(
        HostConfig {
            bind_ip,
            ops_socket: ops_socket.clone(),
            stop_grace: Duration::from_millis(500),
        },
        catalog,
        Arc::new(NoopProvider),
    );
    tokio::spawn(Arc::clone(&host).serve());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ops = RequestSocket::connect(ops_socket.clone()).await.unwrap();

    let keepalive = ops
        .request(json!({"req": "keepalive"}), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(keepalive["data"]["n_actors"], 0);

    let uid = Uid::new();
    let port = free_port().await;
    let start_reply = ops
        .request(
            json!({
                "req": "start_actor",
                "actor_name": "EchoActor",
                "category": "echoes",
                "uid": uid.to_string(),
                "port": port,
                "realm": "global",
            }),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
    assert_eq!(start_reply["status"], "ok");
    let endpoint: beach_proto::Endpoint = start_reply["data"]["endpoint"].as_str().unwrap().parse().unwrap();
    assert_eq!(endpoint.port(), port);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let addr: SocketAddr = std::net::SocketAddr::new(endpoint.ip(), endpoint.port());
    let mut actor_client = RequestSocket::connect(Address::Tcp(addr)).await.unwrap();
    let ping_reply = actor_client
        .request(json!({"req": "ping"}), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(ping_reply["data"]["pong"], true);

    let kill_reply = ops
        .request(json!({"req": "kill_actor", "uid": uid.to_string()}), Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(kill_reply["status"], "ok");

    let keepalive_after = ops
        .request(json!({"req": "keepalive"}), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(keepalive_after["data"]["n_actors"], 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(RequestSocket::connect(Address::Tcp(addr)).await.is_err(), "actor socket should no longer accept connections");
}

/// `start_actor` looks an actor type up by `actor_name`, not `category` — a
/// request whose `category` happens to match a registered name but whose
/// `actor_name` doesn't must still fail.
#[tokio::test]
async fn start_actor_rejects_unregistered_actor_name_even_if_category_matches() {
    let ops_socket = Address::Unix(beach_transport::instance_socket_path());
    let bind_ip: std::net::IpAddr = "127.0.0.1".parse().unwrap();

    let mut catalog = ActorCatalog::new();
    catalog.register("EchoActor", || Arc::new(EchoActor) as Arc<dyn Actor>);

    let host = WorkerInstanceHost::new(
        HostConfig {
            bind_ip,
            ops_socket: ops_socket.clone(),
            stop_grace: Duration::from_millis(500),
        },
        catalog,
        Arc::new(NoopProvider),
    );
    tokio::spawn(Arc::clone(&host).serve());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ops = RequestSocket::connect(ops_socket.clone()).await.unwrap();
    let port = free_port().await;
    let start_reply = ops
        .request(
            json!({
                "req": "start_actor",
                "actor_name": "EchoActor",
                "category": "EchoActor",
                "uid": Uid::new().to_string(),
                "port": port,
                "realm": "global",
            }),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
    assert_eq!(start_reply["status"], "ok");

    let start_reply = ops
        .request(
            json!({
                "req": "start_actor",
                "actor_name": "echoes",
                "category": "echoes",
                "uid": Uid::new().to_string(),
                "port": free_port().await,
                "realm": "global",
            }),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
    assert_eq!(start_reply["status"], "error");
}
