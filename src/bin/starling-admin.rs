#!/usr/bin/env cargo
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::Value;

use starling::api::paths;
use starling::gossip::{PeersResponse, ServiceInfo};
use starling::search::AggregateResponse;

#[derive(Parser)]
#[command(name = "starling-admin")]
#[command(about = "Starling federation administration tool")]
struct Cli {
    /// Base URL of the node to talk to (e.g. "http://127.0.0.1:8510")
    #[arg(
        long,
        global = true,
        env = "STARLING_ADMIN_NODE",
        default_value = "http://127.0.0.1:8510"
    )]
    node: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the peers a node knows about
    Peers,
    /// Force a gossip cycle on a node
    Refresh,
    /// Show a node's service-info without triggering a refresh
    ServiceInfo,
    /// Run a federated search through a node
    Search {
        /// Search path on each peer (e.g. "dataset-search")
        #[arg(long)]
        path: String,
        /// JSON query body
        #[arg(long, default_value = "{}")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let node = node_base(&cli.node)?;
    let client = Client::new();

    match cli.command {
        Commands::Peers => list_peers(&client, &node).await?,
        Commands::Refresh => refresh(&client, &node).await?,
        Commands::ServiceInfo => show_service_info(&client, &node).await?,
        Commands::Search { path, query } => search(&client, &node, &path, &query).await?,
    }

    Ok(())
}

async fn list_peers(client: &Client, node: &str) -> Result<(), Box<dyn std::error::Error>> {
    let response: PeersResponse = client
        .get(endpoint(node, paths::PEERS))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!("{} peers (last updated {})", response.peers.len(), response.last_updated);
    for peer in &response.peers {
        println!("  {}", peer);
    }
    Ok(())
}

async fn refresh(client: &Client, node: &str) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .post(endpoint(node, paths::private::REFRESH_PEERS))
        .send()
        .await?;
    if response.status().is_success() {
        println!("Refresh finished on {}", node);
        Ok(())
    } else {
        Err(format!("Refresh failed: HTTP {}", response.status()).into())
    }
}

async fn show_service_info(client: &Client, node: &str) -> Result<(), Box<dyn std::error::Error>> {
    let info: ServiceInfo = client
        .get(format!("{}?update_peers=false", endpoint(node, paths::SERVICE_INFO)))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!("{} ({})", info.name, info.id);
    if let Some(service_type) = &info.service_type {
        println!("  type: {}", service_type);
    }
    if let Some(version) = &info.version {
        println!("  version: {}", version);
    }
    Ok(())
}

async fn search(
    client: &Client,
    node: &str,
    path: &str,
    query: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let query: Value =
        serde_json::from_str(query).map_err(|e| format!("Invalid query JSON: {}", e))?;
    let response = client
        .post(endpoint(node, &paths::search_aggregate_path(path)))
        .json(&query)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Search failed: HTTP {} {}", status, body).into());
    }

    let aggregate: AggregateResponse = response.json().await?;
    println!(
        "{} results from {}/{} peers",
        aggregate.results.len(),
        aggregate.peers.responded,
        aggregate.peers.total
    );
    println!("{}", serde_json::to_string_pretty(&aggregate.results)?);
    Ok(())
}

fn node_base(node: &str) -> Result<String, Box<dyn std::error::Error>> {
    let parsed = url::Url::parse(node).map_err(|e| format!("Invalid node URL '{}': {}", node, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("Unsupported scheme in '{}'", node).into());
    }
    Ok(node.trim_end_matches('/').to_string())
}

fn endpoint(node: &str, path: &str) -> String {
    format!("{}{}", node, path)
}
