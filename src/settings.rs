//! Starling application settings
use std::time::Duration;

use crate::peers::PeerUrl;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_HTTP: u16 = 8510;
pub const DEFAULT_PORT_HTTP: &str = "8510";

pub const DEFAULT_DATABASE: &str = "data/federation.db";
pub const DEFAULT_FEDERATION_PATH: &str = "api/federation";
pub const DEFAULT_NODE_API_PATH: &str = "api";

pub const DEFAULT_WORKERS: &str = "10";
pub const DEFAULT_TIMEOUT_SECONDS: &str = "120";
pub const DEFAULT_DEAD_PEER_TTL_SECONDS: &str = "30";
pub const DEFAULT_STALENESS_SECONDS: &str = "3600";
pub const DEFAULT_API_TIMEOUT_SECONDS: &str = "600";

pub const SERVICE_ORGANIZATION: &str = "io.starling";
pub const SERVICE_ARTIFACT: &str = "federation";

/// Tag a peer's service-info `type` must contain for us to federate with it.
pub fn protocol_tag() -> String {
    format!("{}:{}", SERVICE_ORGANIZATION, SERVICE_ARTIFACT)
}

/// Full GA4GH service type, e.g. `io.starling:federation:0.3.0`.
pub fn service_type() -> String {
    format!("{}:{}", protocol_tag(), APP_VERSION)
}

/// Knobs of the gossip and fan-out engines
#[derive(Clone, Debug)]
pub struct FederationSettings {
    /// Size of every worker pool (gossip cycle and search fan-out)
    pub workers: usize,
    /// Timeout applied to each outbound call
    pub peer_timeout: Duration,
    /// How long a failed peer is skipped
    pub dead_peer_ttl: Duration,
    /// Maximum registry age before a read triggers a gossip cycle
    pub staleness_window: Duration,
}

impl Default for FederationSettings {
    fn default() -> Self {
        Self {
            workers: 10,
            peer_timeout: Duration::from_secs(120),
            dead_peer_ttl: Duration::from_secs(30),
            staleness_window: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Server listen address
    pub listen_address: String,

    // HTTP API listen port
    pub listen_port: u16,

    // This node's own address as seen by its peers
    pub node_url: PeerUrl,

    // Registry-of-record every node is seeded with
    pub registry_url: PeerUrl,

    // Location of the peer registry
    pub database: String,

    // Prefix for every route we serve
    pub base_path: String,

    // Where peers serve the federation protocol, relative to their base URL
    pub federation_path: String,

    // Where fanned-out search paths are resolved on a peer
    pub node_api_path: String,

    pub service_id: String,

    pub federation: FederationSettings,

    // Deadline for a whole inbound request
    pub api_timeout: Duration,

    // Run the post-start hook as soon as the server is up
    pub initialize_immediately: bool,

    // Serve and run the peer network; off leaves a plain service-info node
    pub federation_mode: bool,
}

impl Settings {
    /// Settings suitable for an in-process node: no listener, in-memory registry paths
    pub fn for_node(node_url: PeerUrl, registry_url: PeerUrl) -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            listen_port: STANDARD_PORT_HTTP,
            node_url,
            registry_url,
            database: DEFAULT_DATABASE.to_string(),
            base_path: String::new(),
            federation_path: normalize_path_prefix(DEFAULT_FEDERATION_PATH),
            node_api_path: normalize_path_prefix(DEFAULT_NODE_API_PATH),
            service_id: service_type(),
            federation: FederationSettings::default(),
            api_timeout: Duration::from_secs(600),
            initialize_immediately: false,
            federation_mode: true,
        }
    }

    /// Addresses the registry must always contain
    pub fn seed_peers(&self) -> Vec<PeerUrl> {
        vec![self.node_url.clone(), self.registry_url.clone()]
    }
}

/// Turn `"/api/federation/"`, `"api/federation"` etc. into `"api/federation/"`,
/// and any empty-ish value into `""`, so it can be appended to a `PeerUrl`.
pub fn normalize_path_prefix(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Route prefix: `""` or `"/something"` without a trailing slash.
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
