//! Placement strategies `add_actor` can use to pick which node a new
//! actor's instance is started on.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::time::Duration;

use beach_transport::{Address, RequestSocket};
use rand::seq::SliceRandom;
use serde_json::json;

/// How `ClusterClient::add_actor` picks a node to place a new actor on.
#[derive(Debug, Clone)]
pub enum PlacementStrategy {
    /// Pick uniformly at random among known nodes.
    Random,
    /// Place on a specific, named node.
    Node(IpAddr),
    /// Argmin over `(avg(cpu) + mem) / 2` across each node's `host_info`.
    /// Resolved by `ClusterClient::add_actor` itself (it needs to query
    /// every node), not by [`pick_node`] — see `pick_resource_node`.
    Resource,
    /// Hash an affinity key against the sorted list of known nodes, so the
    /// same key always lands on the same node for a given cluster shape —
    /// the client-side analogue of `beach-handle`'s affinity mode, using
    /// the same structured-address approach rather than parsing a node
    /// name out of a rendered endpoint string.
    Affinity(String),
}

/// Pick a node out of `nodes` (non-empty) per `strategy`. `Resource` isn't
/// handled here since it needs a network round trip per node; callers
/// route it through `pick_resource_node` instead.
pub fn pick_node(strategy: &PlacementStrategy, nodes: &[IpAddr]) -> Option<IpAddr> {
    if nodes.is_empty() {
        return None;
    }
    match strategy {
        PlacementStrategy::Random | PlacementStrategy::Resource => nodes.choose(&mut rand::thread_rng()).copied(),
        PlacementStrategy::Node(ip) => nodes.iter().find(|n| *n == ip).copied().or(Some(*ip)),
        PlacementStrategy::Affinity(key) => {
            let mut sorted = nodes.to_vec();
            sorted.sort();
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % sorted.len();
            Some(sorted[idx])
        }
    }
}

/// Query every node's `host_info` and return the one with the lowest
/// `(avg(cpu) + mem) / 2` score, per `beach_api.py`'s `resource` strategy.
/// Falls back to `None` if no node answers, leaving the caller to fall
/// back to another strategy.
pub async fn pick_resource_node(nodes: &[IpAddr], ops_port: u16) -> Option<IpAddr> {
    let mut best: Option<(IpAddr, f64)> = None;
    for &node in nodes {
        let Some(score) = query_resource_score(node, ops_port).await else { continue };
        let replace = match &best {
            Some((_, best_score)) => score < *best_score,
            None => true,
        };
        if replace {
            best = Some((node, score));
        }
    }
    best.map(|(node, _)| node)
}

async fn query_resource_score(node: IpAddr, ops_port: u16) -> Option<f64> {
    let address = Address::Tcp(std::net::SocketAddr::new(node, ops_port));
    let mut socket = RequestSocket::connect(address).await.ok()?;
    let reply = socket
        .request(json!({"req": "host_info"}), Duration::from_secs(2))
        .await
        .ok()?;
    let info = reply.get("data")?.get("info")?;
    let cpu = info.get("cpu")?.as_array()?;
    if cpu.is_empty() {
        return None;
    }
    let avg_cpu: f64 = cpu.iter().filter_map(|v| v.as_f64()).sum::<f64>() / cpu.len() as f64;
    let mem = info.get("mem")?.as_f64()?;
    Some((avg_cpu + mem) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affinity_is_stable_across_calls() {
        let nodes = vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()];
        let strategy = PlacementStrategy::Affinity("tenant-7".to_string());
        assert_eq!(pick_node(&strategy, &nodes), pick_node(&strategy, &nodes));
    }

    #[test]
    fn node_strategy_passes_through_an_unknown_ip() {
        let nodes = vec!["10.0.0.1".parse().unwrap()];
        let target: IpAddr = "10.0.0.9".parse().unwrap();
        assert_eq!(pick_node(&PlacementStrategy::Node(target), &nodes), Some(target));
    }

    struct FixedHostInfo {
        cpu: Vec<f64>,
        mem: f64,
    }

    #[async_trait::async_trait]
    impl beach_transport::Handler for FixedHostInfo {
        async fn handle(&self, _request: serde_json::Value) -> serde_json::Value {
            json!({"status": "ok", "data": {"info": {"cpu": self.cpu, "mem": self.mem}}})
        }
    }

    /// Binds a fake `host_info` responder on `ip:port`. Tests use distinct
    /// loopback addresses (127.0.0.1, 127.0.0.2, ...) bound to the same
    /// port, matching how `pick_resource_node` queries every node on one
    /// cluster-wide `ops_port`.
    async fn spawn_host_info(ip: IpAddr, port: u16, cpu: Vec<f64>, mem: f64) {
        let socket = beach_transport::ReplySocket::bind(Address::Tcp(std::net::SocketAddr::new(ip, port)))
            .await
            .unwrap();
        tokio::spawn(socket.serve(std::sync::Arc::new(FixedHostInfo { cpu, mem })));
    }

    #[tokio::test]
    async fn resource_score_averages_cpu_cores_with_memory() {
        let ip: IpAddr = "127.0.0.11".parse().unwrap();
        spawn_host_info(ip, 15011, vec![90.0, 70.0], 40.0).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let score = query_resource_score(ip, 15011).await.unwrap();
        assert!((score - 60.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn resource_strategy_picks_the_least_loaded_node() {
        let busy: IpAddr = "127.0.0.12".parse().unwrap();
        let idle: IpAddr = "127.0.0.13".parse().unwrap();
        spawn_host_info(busy, 15012, vec![90.0, 95.0], 80.0).await;
        spawn_host_info(idle, 15012, vec![5.0, 10.0], 20.0).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let picked = pick_resource_node(&[busy, idle], 15012).await;
        assert_eq!(picked, Some(idle));
    }

    #[tokio::test]
    async fn resource_strategy_returns_none_when_no_node_answers() {
        let nodes = vec!["127.0.0.1".parse().unwrap()];
        assert_eq!(pick_resource_node(&nodes, 1).await, None);
    }
}
