use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use starling::api;
use starling::cli;
use starling::node::FederationNode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "starling=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars; refuse to run without our URLs
    let settings = cli::Cli::parse().into_settings()?;

    // Socket server listen address setup
    let listen_address: IpAddr = settings
        .listen_address
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid ip address {}", settings.listen_address))?;
    let socket_address = SocketAddr::from((listen_address, settings.listen_port));

    let initialize_immediately = settings.initialize_immediately;
    let node = FederationNode::new(settings)?;

    // Build Axum Router
    let api = api::api(node.clone());

    let listener = tokio::net::TcpListener::bind(socket_address).await?;
    info!(
        "Starting Starling on {} as {}",
        socket_address,
        node.settings().node_url
    );

    if initialize_immediately {
        let node = node.clone();
        tokio::spawn(async move {
            if let Err(e) = node.post_start_hook().await {
                error!("Post-start hook failed: {}", e);
            }
        });
    }

    axum::serve(listener, api).await?;

    Ok(())
}
