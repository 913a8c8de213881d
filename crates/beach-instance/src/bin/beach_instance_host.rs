//! Worker-instance host process entry point.
//!
//! Spawned by a node controller (`tokio::process::Command`), one per pooled
//! slot, and handed its Unix ops-socket path and the node's local directory
//! IPC address on the command line so it can bind its socket and resolve
//! directory lookups for the actors it hosts without leaving the host.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use beach_handle::HandleFactory;
use beach_instance::{HostConfig, NodeOpsDirectorySource, WorkerInstanceHost};
use beach_runtime::ActorHandleProvider;
use beach_transport::Address;
use clap::Parser;

/// Worker-instance host: pools actors inside one OS process for a beach
/// node controller.
#[derive(Parser, Debug)]
#[command(name = "beach-instance-host")]
struct Args {
    /// Unix domain socket path this process's ops socket binds to.
    #[arg(long)]
    ops_socket: String,

    /// Address of the owning node controller's local directory socket,
    /// e.g. `ipc:///tmp/beach_instance_<uuid>`, used to resolve directory
    /// lookups for hosted actors.
    #[arg(long)]
    directory_ipc_address: String,

    /// IPv4 address actor reply sockets bind to.
    #[arg(long)]
    bind_ip: IpAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let directory_ipc_address: Address = args.directory_ipc_address.parse()?;
    let directory_source = Arc::new(NodeOpsDirectorySource::new(directory_ipc_address));
    let handle_provider: Arc<dyn ActorHandleProvider> = Arc::new(HandleFactory::new(directory_source));

    let catalog = beach_instance::ActorCatalog::new();
    // Real deployments register concrete actor types here, e.g.
    // `catalog.register("echo", || Arc::new(EchoActor::default()))`. This
    // binary hosts whatever catalog its embedding crate builds; nothing is
    // registered by default.

    let config = HostConfig {
        bind_ip: args.bind_ip,
        ops_socket: Address::Unix(args.ops_socket.into()),
        stop_grace: Duration::from_secs(5),
    };

    let host = WorkerInstanceHost::new(config, catalog, handle_provider);
    host.serve().await?;
    Ok(())
}
