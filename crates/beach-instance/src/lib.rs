//! The worker-instance host process: pools actor instances inside a single
//! OS process and answers its owning node controller's ops calls.

pub mod catalog;
pub mod error;
pub mod host;
pub mod node_directory;

pub use catalog::{ActorCatalog, ActorConstructor};
pub use error::HostError;
pub use host::{HostConfig, WorkerInstanceHost};
pub use node_directory::NodeOpsDirectorySource;
