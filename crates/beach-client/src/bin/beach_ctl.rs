//! `beach-ctl`: a small command-line front end to `ClusterClient`, for
//! poking a running cluster from a shell without writing a program against
//! the library.

use std::net::IpAddr;

use beach_client::{ClusterClient, PlacementStrategy};
use clap::{Parser, Subcommand};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "beach-ctl")]
struct Args {
    /// Comma-separated list of seed node IPs.
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<IpAddr>,

    /// Ops port shared by every node in the cluster.
    #[arg(long, default_value_t = 4999)]
    ops_port: u16,

    /// Realm to operate in.
    #[arg(long)]
    realm: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new actor of the given registered type, published under the
    /// given category.
    AddActor {
        actor_name: String,
        category: String,
        /// Pin placement to a specific node IP instead of choosing randomly.
        #[arg(long)]
        node: Option<IpAddr>,
        /// Hash an affinity key to a stable node instead of choosing randomly.
        #[arg(long)]
        affinity: Option<String>,
        /// Place on whichever known node reports the lowest cpu+mem load.
        #[arg(long, conflicts_with_all = ["node", "affinity"])]
        resource: bool,
    },
    /// List every actor published under a category.
    GetDirectory { category: String },
    /// Stop an actor by uid.
    KillActor { uid: String },
    /// Stop and remove every actor cluster-wide.
    Flush,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let client = ClusterClient::connect(args.nodes, args.ops_port).await?;
    let realm = args.realm.map(beach_proto::Realm::new);

    match args.command {
        Command::AddActor { actor_name, category, node, affinity, resource } => {
            let strategy = match (node, affinity, resource) {
                (Some(ip), _, _) => PlacementStrategy::Node(ip),
                (None, Some(key), _) => PlacementStrategy::Affinity(key),
                (None, None, true) => PlacementStrategy::Resource,
                (None, None, false) => PlacementStrategy::Random,
            };
            match client.add_actor(&actor_name, &category, strategy, realm).await {
                Ok((uid, entry)) => println!("{uid} -> {}", entry.endpoint),
                Err(err) => error!(%err, "add-actor failed"),
            }
        }
        Command::GetDirectory { category } => match client.get_directory(realm, &category).await {
            Ok(entries) => {
                for (uid, entry) in entries {
                    println!("{uid} -> {} (node {})", entry.endpoint, entry.node);
                }
            }
            Err(err) => error!(%err, "get-directory failed"),
        },
        Command::KillActor { uid } => {
            let uid: beach_proto::Uid = uid.parse()?;
            if let Err(err) = client.kill_actor(uid).await {
                error!(%err, "kill-actor failed");
            }
        }
        Command::Flush => {
            if let Err(err) = client.flush().await {
                error!(%err, "flush failed");
            }
        }
    }

    client.close();
    Ok(())
}
