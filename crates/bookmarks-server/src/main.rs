// ============================================================================
// bookmarks-server — HTTP relay for a user's Twitter bookmarks
// ============================================================================
// Usage:
//   bookmarks-server                        Serve on BIND_ADDRESS:PORT
//   bookmarks-server --port 9000            Override the listen port
//   bookmarks-server --bind 127.0.0.1       Override the listen address
// ============================================================================

mod config;
mod error;
mod handlers;
mod rate_limit;
mod routes;

use anyhow::{Context, Result};
use bookmarks_core::{BookmarksService, TwitterConfig};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Twitter bookmarks relay
#[derive(Parser)]
#[command(name = "bookmarks-server", version, about = "Serve Twitter bookmarks over HTTP")]
struct Cli {
    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Listen address (overrides BIND_ADDRESS)
    #[arg(long)]
    bind: Option<IpAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bookmarks_server=info".parse()?)
                .add_directive("bookmarks_core=info".parse()?),
        )
        .init();

    let twitter = TwitterConfig::from_env()?;
    let mut server = ServerConfig::from_env()?;
    if let Some(port) = cli.port {
        server.port = port;
    }
    if let Some(bind) = cli.bind {
        server.bind = bind;
    }

    if twitter.client_secret.is_none() {
        info!("No TWITTER_CLIENT_SECRET set, using public client flow");
    }
    if twitter.user_id.is_none() {
        info!("TWITTER_USER_ID not set, will resolve via users/me after sign-in");
    }

    let service = Arc::new(BookmarksService::from_config(twitter)?);
    let api = routes::routes(service, &server);

    let addr = SocketAddr::new(server.bind, server.port);
    let (bound, serving) = warp::serve(api)
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Bookmarks server listening on http://{}", bound);
    info!("Open http://{}/login to sign in with Twitter", bound);

    serving.await;
    info!("Server stopped");
    Ok(())
}
