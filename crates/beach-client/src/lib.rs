//! Cluster client: add/find/kill actors and obtain virtual handles from
//! application code, without embedding a node controller.

pub mod client;
pub mod directory_source;
pub mod error;
pub mod strategy;

pub use client::{ClusterClient, NODE_REFRESH_INTERVAL, STARTUP_DEADLINE};
pub use directory_source::{ClientDirectorySource, NodeList};
pub use error::ClientError;
pub use strategy::{pick_node, pick_resource_node, PlacementStrategy};
