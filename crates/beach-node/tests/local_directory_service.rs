//! Confirms directory lookups resolve over the node's local Unix directory
//! socket without touching the TCP ops socket at all.

use std::net::IpAddr;
use std::time::Duration;

use beach_node::NodeController;
use beach_proto::{ActorEntry, Category, ClusterConfig, Endpoint, Realm, Uid};
use beach_transport::RequestSocket;
use serde_json::json;

#[tokio::test]
async fn get_dir_resolves_over_the_local_ipc_socket() {
    let bind_ip: IpAddr = "127.0.0.1".parse().unwrap();
    let config = ClusterConfig::default();
    let controller = NodeController::new(config, bind_ip, "/nonexistent/beach-instance-host".into());

    let uid = Uid::new();
    let entry = ActorEntry {
        endpoint: Endpoint::new(bind_ip, 5123),
        node: bind_ip,
    };
    controller
        .directory
        .insert(Realm::default_realm(), Category::new("workers"), uid, entry.clone())
        .await;

    let directory_ipc = controller.directory_ipc.clone();
    let serve_controller = controller.clone();
    tokio::spawn(async move {
        let socket = beach_transport::ReplySocket::bind(directory_ipc).await.unwrap();
        socket
            .serve(serve_controller as std::sync::Arc<dyn beach_transport::Handler>)
            .await
            .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut socket = RequestSocket::connect(controller.directory_ipc.clone()).await.unwrap();
    let reply = socket
        .request(json!({"req": "get_dir", "category": "workers"}), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(reply["status"], "ok");
    let endpoint = reply["data"][uid.to_string()]["endpoint"].as_str().unwrap();
    assert_eq!(endpoint, entry.endpoint.to_string());
}
