use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use parlance_gateway::{build_router, AppState, ServerConfig};

/// Parlance Gateway - phone-call voice agent orchestrator
#[derive(Parser, Debug)]
#[command(name = "parlance-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (must happen before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Crypto provider must be installed before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        tracing::info!(path = %config_path.display(), "loading configuration file");
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let address = config.address();
    let cors_origins = config.cors_allowed_origins.clone();

    let state = AppState::new(config).map_err(|e| anyhow!(e.to_string()))?;
    let app = build_router(state).layer(cors_layer(cors_origins.as_deref()));

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    tracing::info!("listening on http://{socket_addr}");
    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [AUTHORIZATION, CONTENT_TYPE];

    match origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers),
        Some(list) => {
            let origins: Vec<http::HeaderValue> = list
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(methods)
                .allow_headers(headers)
        }
        // No CORS configured: same-origin only. Telephony webhooks are
        // server-to-server and unaffected.
        None => CorsLayer::new().allow_methods(methods).allow_headers(headers),
    }
}
