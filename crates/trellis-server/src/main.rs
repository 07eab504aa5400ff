//! Trellis gateway binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use trellis_client::CoreClient;
use trellis_core::config::AppConfig;
use trellis_server::{AppState, create_router};
use trellis_store::{FilesystemStore, ResultStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Trellis - result gateway for scaffold compute jobs
#[derive(Parser, Debug)]
#[command(name = "trellisd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "TRELLIS_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("Trellis v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    // Check for TRELLIS_ environment variables (excluding TRELLIS_CONFIG which is just the path)
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("TRELLIS_") && key != "TRELLIS_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: trellisd --config /path/to/config.toml\n  \
             2. Environment variables: TRELLIS_SERVER__BIND=0.0.0.0:8080 \
             TRELLIS_CORE__BASE_URL=https://core.example.com \
             TRELLIS_CORE__CLIENT_ID=... TRELLIS_CORE__CLIENT_SECRET=... trellisd\n\n\
             See config/server.example.toml for example configuration.\n\
             Set TRELLIS_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("TRELLIS_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Initialize the result store and verify it before accepting requests
    let store: Arc<dyn ResultStore> = Arc::new(
        FilesystemStore::new(&config.server.results_dir)
            .await
            .context("failed to initialize result store")?,
    );
    store
        .health_check()
        .await
        .context("result store health check failed")?;
    tracing::info!(
        results_dir = %config.server.results_dir.display(),
        "Result store initialized"
    );

    // Initialize the Core client (token acquisition is lazy)
    let core = Arc::new(CoreClient::from_config(&config.core).context("invalid Core API config")?);
    tracing::info!(base_url = %config.core.base_url, "Core client initialized");

    // Create application state and router
    let state = AppState::new(config.clone(), store, core);
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
