//! CLI entry point for pumping station graph operations.
//!
//! Reads station JSON from stdin or a file, writes JSON results to stdout.
//! Logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use pumpgraph_core::config::DEFAULT_FILE_PREFIX;
use pumpgraph_core::types::new_logical_id;
use pumpgraph_core::PumpingStation;
use pumpgraph_graph::DgraphClient;

use pumpgraph_station::schema::station_dql;
use pumpgraph_station::{HttpEmbedder, Settings, StationService};

#[derive(Parser)]
#[command(name = "pumpgraph")]
#[command(about = "Pumping station records in a Dgraph knowledge graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: pumpgraph).
    #[arg(short, long, default_value = DEFAULT_FILE_PREFIX, global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Apply the station DQL schema (indexes, types, vector index).
    Schema,
    /// Create or update a station tree (reads JSON from stdin by default).
    Upsert {
        /// Read the station from this file instead of stdin.
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Replace the station id with a freshly generated one.
        #[arg(long)]
        new_id: bool,
    },
    /// Fetch a station tree by id.
    Get {
        id: String,
    },
    /// Find stations whose name is closest to the given text.
    Search {
        text: String,
        /// Number of results (default: station.search_top_k).
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Remove a station node by id.
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    let graph = DgraphClient::connect_named(&settings.graph, &settings.station.connection).await?;

    if let Command::Schema = cli.command {
        graph
            .alter(&station_dql(&settings.station.embedding_predicate))
            .await?;
        println!("{}", serde_json::json!({ "applied": true }));
        return Ok(());
    }

    let embedder = HttpEmbedder::new(&settings.embedder)?;
    let service = StationService::new(graph, embedder, settings.station)?;

    match cli.command {
        Command::Schema => {}
        Command::Upsert { file, new_id } => {
            let input = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let mut station: PumpingStation = serde_json::from_str(&input)?;
            if new_id {
                station.id = new_logical_id("ps");
            }
            let uids = service.upsert_station(&station).await?;
            println!(
                "{}",
                serde_json::json!({ "id": station.id, "uids": uids })
            );
        }
        Command::Get { id } => {
            let station = service.get_station(&id).await?;
            println!("{}", serde_json::to_string(&station)?);
        }
        Command::Search { text, top_k } => {
            let stations = service.search_stations(&text, top_k).await?;
            println!("{}", serde_json::to_string(&stations)?);
        }
        Command::Delete { id } => {
            service.delete_station(&id).await?;
            println!("{}", serde_json::json!({ "deleted": id }));
        }
    }

    Ok(())
}
