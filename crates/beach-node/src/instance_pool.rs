//! Supervises the worker-instance processes a node controller pools actors
//! into.
//!
//! Grounded on `hostmanager.py`'s instance-process management: a pool of
//! `n_processes` long-lived instance processes shares placement for most
//! actors; a category marked for isolated placement instead gets its own,
//! dedicated instance process spun up on demand and torn down with it.
//! Stopping an instance sends `SIGQUIT` (via `nix`) so the child's own
//! runtime can run its actors' `deinit` hooks before exiting, the same
//! signal `hostmanager.py` sends rather than a bare `SIGKILL`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use beach_proto::InstanceStrategy;
use beach_transport::{Address, RequestSocket};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde_json::json;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::error::NodeError;

/// A single running worker-instance process.
pub struct PooledInstance {
    child: Child,
    pub ops_socket: Address,
    pub pid: u32,
}

/// How a node controller launches and addresses worker-instance processes.
pub struct InstancePoolConfig {
    pub instance_binary: PathBuf,
    pub bind_ip: IpAddr,
    pub directory_ipc_address: Address,
    pub strategy: InstanceStrategy,
}

/// The set of pooled (shared) worker-instance processes, plus bookkeeping
/// to launch isolated, single-purpose ones on demand.
pub struct InstancePool {
    config: InstancePoolConfig,
    pooled: Mutex<Vec<PooledInstance>>,
}

impl InstancePool {
    pub fn new(config: InstancePoolConfig) -> Self {
        Self {
            config,
            pooled: Mutex::new(Vec::new()),
        }
    }

    /// Launch a fresh worker-instance process and return it without adding
    /// it to the shared pool. The caller owns the returned `PooledInstance`
    /// for the actor's whole lifetime — dropping it kills the process
    /// immediately via `kill_on_drop`, so it must be held (e.g. in
    /// `NodeController::isolated_instances`) until `stop_isolated` is called.
    pub async fn spawn_isolated(&self) -> Result<PooledInstance, NodeError> {
        self.spawn_instance().await
    }

    /// Stop an isolated instance previously returned by `spawn_isolated`,
    /// the same grace-then-kill sequence pooled instances get from
    /// `shutdown_all`.
    pub async fn stop_isolated(&self, mut instance: PooledInstance, grace: Duration) {
        stop_instance(&mut instance, grace).await;
    }

    /// Top the shared pool up to `target` worker-instance processes.
    pub async fn ensure_pooled(&self, target: u32) -> Result<(), NodeError> {
        loop {
            let current = self.pooled.lock().len() as u32;
            if current >= target {
                return Ok(());
            }
            let instance = self.spawn_instance().await?;
            self.pooled.lock().push(instance);
        }
    }

    async fn spawn_instance(&self) -> Result<PooledInstance, NodeError> {
        let ops_socket_path = beach_transport::instance_socket_path();
        let ops_socket = Address::Unix(ops_socket_path.clone());

        let child = Command::new(&self.config.instance_binary)
            .arg("--ops-socket")
            .arg(&ops_socket_path)
            .arg("--directory-ipc-address")
            .arg(self.config.directory_ipc_address.to_string())
            .arg("--bind-ip")
            .arg(self.config.bind_ip.to_string())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| NodeError::Instance(err.to_string()))?;

        let pid = child.id().ok_or_else(|| NodeError::Instance("child exited immediately".into()))?;
        info!(pid, "spawned worker-instance process");

        // Give the child a moment to bind its ops socket before anyone
        // tries to talk to it.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Ok(PooledInstance { child, ops_socket, pid })
    }

    /// Pick a pooled instance to place a new (non-isolated) actor on, per
    /// the configured strategy.
    pub fn pick_pooled(&self) -> Result<Address, NodeError> {
        let pooled = self.pooled.lock();
        if pooled.is_empty() {
            return Err(NodeError::NoInstanceAvailable);
        }
        let address = match self.config.strategy {
            InstanceStrategy::Random => {
                pooled
                    .choose(&mut rand::thread_rng())
                    .expect("non-empty checked above")
                    .ops_socket
                    .clone()
            }
            InstanceStrategy::RoundRobin => pooled[0].ops_socket.clone(),
        };
        Ok(address)
    }

    /// Send `keepalive` to every pooled instance; any that doesn't answer
    /// within `timeout` is dropped from the pool so `ensure_pooled` replaces
    /// it on the next tick.
    pub async fn keepalive_all(&self, timeout: Duration) {
        let addresses: Vec<Address> = self.pooled.lock().iter().map(|i| i.ops_socket.clone()).collect();
        let mut dead = Vec::new();
        for address in addresses {
            let alive = match RequestSocket::connect(address.clone()).await {
                Ok(mut socket) => socket
                    .request(json!({"req": "keepalive"}), timeout)
                    .await
                    .is_ok(),
                Err(_) => false,
            };
            if !alive {
                warn!(%address, "worker-instance process failed keepalive");
                dead.push(address);
            }
        }
        if !dead.is_empty() {
            self.pooled.lock().retain(|i| !dead.contains(&i.ops_socket));
        }
    }

    pub fn pooled_count(&self) -> usize {
        self.pooled.lock().len()
    }

    /// Signal every pooled instance to stop gracefully, then reap them.
    pub async fn shutdown_all(&self, grace: Duration) {
        let mut pooled = self.pooled.lock().drain(..).collect::<Vec<_>>();
        for instance in &mut pooled {
            stop_instance(instance, grace).await;
        }
    }
}

#[cfg(unix)]
async fn stop_instance(instance: &mut PooledInstance, grace: Duration) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(instance.pid as i32);
    if let Err(err) = kill(pid, Signal::SIGQUIT) {
        warn!(pid = instance.pid, error = %err, "failed to send SIGQUIT, killing directly");
        let _ = instance.child.start_kill();
        return;
    }

    match tokio::time::timeout(grace, instance.child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            warn!(pid = instance.pid, "worker-instance did not exit within grace period, killing");
            let _ = instance.child.start_kill();
        }
    }
}

#[cfg(not(unix))]
async fn stop_instance(instance: &mut PooledInstance, _grace: Duration) {
    let _ = instance.child.start_kill();
}
