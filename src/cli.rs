//! CLI for this application
//!
use std::time::Duration;

use crate::config_error;
use crate::error::Result;
use crate::peers::PeerUrl;
use crate::settings::{self, FederationSettings};

#[derive(Clone, Debug, clap::Parser)]
#[command(name = "starling", version, about = "Peer discovery and federated search")]
pub struct Cli {
    // Server listen address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("STARLING_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("STARLING_HTTP_LISTEN_PORT"),
        help = "Port to bind Starling HTTP API server to"
    )]
    pub listen_port: u16,

    // Our own base URL, as other nodes reach it
    #[clap(
        long,
        env("STARLING_NODE_URL"),
        help = "Public base URL of this node (e.g., https://node1.example.org/)"
    )]
    pub node_url: String,

    // Registry-of-record every node is seeded with
    #[clap(
        long,
        env("STARLING_REGISTRY_URL"),
        help = "Base URL of the registry node used to bootstrap the peer network"
    )]
    pub registry_url: String,

    #[clap(
        long,
        default_value = settings::DEFAULT_DATABASE,
        env("STARLING_DATABASE"),
        help = "Path of the SQLite peer registry"
    )]
    pub database: String,

    #[clap(
        long,
        default_value = "",
        env("STARLING_BASE_PATH"),
        help = "Prefix for every route this service serves"
    )]
    pub base_path: String,

    #[clap(
        long,
        default_value = settings::DEFAULT_FEDERATION_PATH,
        env("STARLING_FEDERATION_PATH"),
        help = "Path, relative to a peer's base URL, of its federation service"
    )]
    pub federation_path: String,

    #[clap(
        long,
        default_value = settings::DEFAULT_NODE_API_PATH,
        env("STARLING_NODE_API_PATH"),
        help = "Path, relative to a peer's base URL, under which search paths are resolved"
    )]
    pub node_api_path: String,

    #[clap(
        long,
        env("STARLING_SERVICE_ID"),
        help = "service-info id (defaults to the service type)"
    )]
    pub service_id: Option<String>,

    #[clap(
        long,
        default_value = settings::DEFAULT_WORKERS,
        env("STARLING_WORKERS"),
        help = "Concurrent peer contacts per gossip cycle or search"
    )]
    pub workers: usize,

    #[clap(
        long,
        default_value = settings::DEFAULT_TIMEOUT_SECONDS,
        env("STARLING_TIMEOUT_SECONDS"),
        help = "Timeout in seconds for each call to a peer"
    )]
    pub timeout_seconds: u64,

    #[clap(
        long,
        default_value = settings::DEFAULT_DEAD_PEER_TTL_SECONDS,
        env("STARLING_DEAD_PEER_TTL_SECONDS"),
        help = "Seconds a failed peer is skipped for"
    )]
    pub dead_peer_ttl_seconds: u64,

    #[clap(
        long,
        default_value = settings::DEFAULT_STALENESS_SECONDS,
        env("STARLING_STALENESS_SECONDS"),
        help = "Maximum age in seconds of the peer list before it is refreshed"
    )]
    pub staleness_seconds: u64,

    #[clap(
        long,
        default_value = settings::DEFAULT_API_TIMEOUT_SECONDS,
        env("STARLING_API_TIMEOUT_SECONDS"),
        help = "Deadline in seconds for a whole inbound request"
    )]
    pub api_timeout_seconds: u64,

    #[clap(
        long,
        default_value_t = false,
        env("STARLING_INITIALIZE_IMMEDIATELY"),
        help = "Announce this node to its peers as soon as the server starts"
    )]
    pub initialize_immediately: bool,

    #[clap(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env("STARLING_FEDERATION_MODE"),
        help = "Join the peer network and serve the peer and search-aggregate routes"
    )]
    pub federation_mode: bool,
}

impl Cli {
    pub fn into_settings(self) -> Result<settings::Settings> {
        if self.node_url.trim().is_empty() || self.registry_url.trim().is_empty() {
            return Err(config_error!(
                "both a node URL and a registry URL are required"
            ));
        }
        let node_url = PeerUrl::parse(&self.node_url)
            .map_err(|e| config_error!("Invalid node URL {}: {}", self.node_url, e))?;
        let registry_url = PeerUrl::parse(&self.registry_url)
            .map_err(|e| config_error!("Invalid registry URL {}: {}", self.registry_url, e))?;

        if self.workers == 0 {
            return Err(config_error!("workers must be at least 1"));
        }
        if self.timeout_seconds == 0 || self.api_timeout_seconds == 0 {
            return Err(config_error!("timeouts must be greater than zero"));
        }

        Ok(settings::Settings {
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            node_url,
            registry_url,
            database: self.database,
            base_path: settings::normalize_base_path(&self.base_path),
            federation_path: settings::normalize_path_prefix(&self.federation_path),
            node_api_path: settings::normalize_path_prefix(&self.node_api_path),
            service_id: self.service_id.unwrap_or_else(settings::service_type),
            federation: FederationSettings {
                workers: self.workers,
                peer_timeout: Duration::from_secs(self.timeout_seconds),
                dead_peer_ttl: Duration::from_secs(self.dead_peer_ttl_seconds),
                staleness_window: Duration::from_secs(self.staleness_seconds),
            },
            api_timeout: Duration::from_secs(self.api_timeout_seconds),
            initialize_immediately: self.initialize_immediately,
            federation_mode: self.federation_mode,
        })
    }
}
