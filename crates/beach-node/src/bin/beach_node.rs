//! Node controller process entry point.
//!
//! `beach-node <configFile> [-i|--iface <name>]`, matching the external CLI
//! contract: a required config file path and an optional interface-name
//! override for picking this node's bind address.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use beach_node::NodeController;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "beach-node")]
struct Args {
    /// Path to the cluster's YAML configuration file.
    config_file: PathBuf,

    /// Network interface to bind to, overriding the config file's
    /// `interface` key.
    #[arg(short = 'i', long = "iface")]
    iface: Option<String>,

    /// Path to the `beach-instance-host` binary this node spawns worker
    /// instances from. Defaults to the sibling of this binary.
    #[arg(long)]
    instance_binary: Option<PathBuf>,
}

fn resolve_interface(name: &str) -> IpAddr {
    if_addrs::get_if_addrs()
        .ok()
        .into_iter()
        .flatten()
        .find(|iface| iface.name == name && iface.ip().is_ipv4())
        .map(|iface| iface.ip())
        .unwrap_or_else(|| "127.0.0.1".parse().expect("valid fallback address"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = beach_proto::ClusterConfig::load(&args.config_file)?;
    if let Some(iface) = &args.iface {
        config.interface = iface.clone();
    }
    let bind_ip = resolve_interface(&config.interface);

    let instance_binary = args.instance_binary.unwrap_or_else(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|dir| dir.join("beach-instance-host")))
            .unwrap_or_else(|| PathBuf::from("beach-instance-host"))
    });

    info!(ip = %bind_ip, config = %args.config_file.display(), "starting node controller");
    let controller = NodeController::new(config, bind_ip, instance_binary);

    let controller_for_signal = Arc::clone(&controller);
    let mut sigquit = signal(SignalKind::quit())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigquit.recv() => {}
        }
        info!("shutdown requested, stopping worker-instance processes");
        controller_for_signal.shutdown().await;
        std::process::exit(0);
    });

    controller.run().await?;
    Ok(())
}
