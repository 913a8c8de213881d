//! Node controller: peer gossip, the replicated actor directory, and
//! supervision of the worker-instance processes actors are pooled into.

pub mod controller;
pub mod directory_store;
pub mod error;
pub mod instance_pool;
pub mod ops;
pub mod peer;
pub mod ports;

pub use controller::{ActorLocation, NodeController};
pub use directory_store::DirectoryStore;
pub use error::NodeError;
pub use instance_pool::{InstancePool, InstancePoolConfig, PooledInstance};
pub use peer::PeerTable;
pub use ports::FreePortSet;
