//! Cluster configuration file format.
//!
//! Loaded from a YAML file named on the node controller's command line
//! (§6). Every key is optional and falls back to the defaults below, the
//! way `hostmanager.py` reads its config dict with `.get(key, default)`
//! at every call site rather than validating a schema up front.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default ops-socket port, used for the worker-instance/node request
/// channel.
pub const DEFAULT_OPS_PORT: u16 = 4999;
/// Default interface name to resolve into a bind IPv4 address.
pub const DEFAULT_INTERFACE: &str = "eth0";
/// Default ephemeral-port range floor for actor reply sockets.
pub const DEFAULT_PORT_RANGE_START: u16 = 5000;
/// Default ephemeral-port range ceiling for actor reply sockets.
pub const DEFAULT_PORT_RANGE_END: u16 = 6000;
/// Default cadence, in seconds, shared by peer keepalive, instance
/// keepalive, and directory sync loops.
pub const DEFAULT_LOOP_SECONDS: u64 = 60;
/// Default age, in seconds, a tombstone survives before being culled.
pub const DEFAULT_TOMBSTONE_CULLING_SECONDS: u64 = 3600;

fn default_ops_port() -> u16 {
    DEFAULT_OPS_PORT
}

fn default_interface() -> String {
    DEFAULT_INTERFACE.to_string()
}

fn default_n_processes() -> u32 {
    0
}

fn default_port_range_start() -> u16 {
    DEFAULT_PORT_RANGE_START
}

fn default_port_range_end() -> u16 {
    DEFAULT_PORT_RANGE_END
}

fn default_loop_seconds() -> u64 {
    DEFAULT_LOOP_SECONDS
}

fn default_tombstone_culling_seconds() -> u64 {
    DEFAULT_TOMBSTONE_CULLING_SECONDS
}

fn default_instance_strategy() -> InstanceStrategy {
    InstanceStrategy::Random
}

/// Strategy a node controller uses to pick which pooled worker-instance
/// process hosts a newly started actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStrategy {
    #[default]
    Random,
    RoundRobin,
}

/// Parsed contents of a cluster's YAML configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Other nodes' addresses to bootstrap peer discovery from.
    #[serde(default)]
    pub seed_nodes: Vec<String>,

    /// Port the node controller's ops socket binds to.
    #[serde(default = "default_ops_port")]
    pub ops_port: u16,

    /// Port the node controller's directory-sync socket binds to. Defaults
    /// to `ops_port + 1` when omitted, matched at config-load time rather
    /// than with a literal default here since it depends on another field.
    #[serde(default)]
    pub directory_port: Option<u16>,

    /// Network interface name to resolve into this node's bind address.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Number of worker-instance processes to pool. `0` means "one per
    /// logical CPU", resolved at startup via `num_cpus`.
    #[serde(default = "default_n_processes")]
    pub n_processes: u32,

    /// Inclusive lower bound of the ephemeral port range handed out to
    /// actor reply sockets.
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,

    /// Inclusive upper bound of the ephemeral port range.
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,

    /// Seconds between peer keepalive pings.
    #[serde(default = "default_loop_seconds")]
    pub peer_keepalive_seconds: u64,

    /// Seconds between worker-instance keepalive pings.
    #[serde(default = "default_loop_seconds")]
    pub instance_keepalive_seconds: u64,

    /// Seconds between directory pull-sync rounds.
    #[serde(default = "default_loop_seconds")]
    pub directory_sync_seconds: u64,

    /// Seconds a tombstone survives before being culled from the log.
    #[serde(default = "default_tombstone_culling_seconds")]
    pub tombstone_culling_seconds: u64,

    /// Default placement strategy for new actor instances.
    #[serde(default = "default_instance_strategy")]
    pub instance_strategy: InstanceStrategy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            seed_nodes: Vec::new(),
            ops_port: default_ops_port(),
            directory_port: None,
            interface: default_interface(),
            n_processes: default_n_processes(),
            port_range_start: default_port_range_start(),
            port_range_end: default_port_range_end(),
            peer_keepalive_seconds: default_loop_seconds(),
            instance_keepalive_seconds: default_loop_seconds(),
            directory_sync_seconds: default_loop_seconds(),
            tombstone_culling_seconds: default_tombstone_culling_seconds(),
            instance_strategy: default_instance_strategy(),
        }
    }
}

/// Error produced while loading or validating a cluster config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path} as YAML: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("port_range_start ({start}) must not be greater than port_range_end ({end})")]
    InvalidPortRange { start: u16, end: u16 },
}

impl ClusterConfig {
    /// Load and validate a config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let raw = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        let mut config: ClusterConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path_ref.display().to_string(),
                source,
            })?;
        config.apply_derived_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Fill in fields whose default depends on another field's value, such
    /// as `directory_port` defaulting to `ops_port + 1`.
    pub fn apply_derived_defaults(&mut self) {
        if self.directory_port.is_none() {
            self.directory_port = Some(self.ops_port.saturating_add(1));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port_range_start > self.port_range_end {
            return Err(ConfigError::InvalidPortRange {
                start: self.port_range_start,
                end: self.port_range_end,
            });
        }
        Ok(())
    }

    /// Resolve `n_processes`, expanding `0` into the number of logical CPUs.
    pub fn resolved_n_processes(&self) -> u32 {
        if self.n_processes == 0 {
            num_cpus::get() as u32
        } else {
            self.n_processes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let config = ClusterConfig::default();
        assert_eq!(config.ops_port, 4999);
        assert_eq!(config.interface, "eth0");
        assert_eq!(config.n_processes, 0);
        assert_eq!(config.port_range_start, 5000);
        assert_eq!(config.port_range_end, 6000);
        assert_eq!(config.peer_keepalive_seconds, 60);
        assert_eq!(config.instance_keepalive_seconds, 60);
        assert_eq!(config.directory_sync_seconds, 60);
        assert_eq!(config.tombstone_culling_seconds, 3600);
        assert_eq!(config.instance_strategy, InstanceStrategy::Random);
    }

    #[test]
    fn partial_yaml_fills_remaining_defaults() {
        let yaml = "seed_nodes:\n  - 10.0.0.1\nops_port: 7000\n";
        let mut config: ClusterConfig = serde_yaml::from_str(yaml).unwrap();
        config.apply_derived_defaults();
        assert_eq!(config.seed_nodes, vec!["10.0.0.1".to_string()]);
        assert_eq!(config.ops_port, 7000);
        assert_eq!(config.directory_port, Some(7001));
        assert_eq!(config.interface, "eth0");
    }

    #[test]
    fn rejects_inverted_port_range() {
        let mut config = ClusterConfig::default();
        config.port_range_start = 6000;
        config.port_range_end = 5000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPortRange { .. })
        ));
    }

    #[test]
    fn resolved_n_processes_falls_back_to_cpu_count() {
        let config = ClusterConfig::default();
        assert_eq!(config.resolved_n_processes(), num_cpus::get() as u32);
    }
}
