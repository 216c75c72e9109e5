// Copyright (c) 2026 Thor Mesh Contributors. MIT License.
// See LICENSE for details.

//! # Thor Mesh Node
//!
//! Entry point for the `thor-mesh-node` binary. Parses CLI arguments,
//! initializes logging and metrics, connects to the chain node when online,
//! and serves the Construction API.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — serve the Construction API
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use thor_mesh::client::{with_timeout, HttpThorClient, ThorClient};
use thor_mesh::config::{chain_tag_for_network, Mode, ServiceConfig, MESH_API_VERSION};
use thor_mesh::error::NodeCall;
use thor_mesh::transaction::currency::parse_token_list;
use thor_mesh::transaction::types::Currency;
use thor_mesh::ConstructionService;

use cli::{Commands, ThorMeshCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ThorMeshCli::parse();

    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the API server and the metrics endpoint.
async fn run_server(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_DIRECTIVE, args.log_format);

    let expected_tag = chain_tag_for_network(&args.network)
        .with_context(|| format!("unknown network: {}", args.network))?;

    tracing::info!(
        mode = ?args.mode,
        network = %args.network,
        port = args.port,
        metrics_port = args.metrics_port,
        "starting thor-mesh-node"
    );

    // --- Service configuration ---
    let mut config = ServiceConfig::new(args.network.clone(), args.mode);
    config.request_timeout = Duration::from_millis(args.request_timeout_ms);
    if let Some(path) = &args.token_list {
        config.tokens = load_tokens(path)?;
        tracing::info!(path = %path.display(), count = config.tokens.len(), "token list loaded");
    }

    // --- Chain node ---
    let client: Option<Arc<dyn ThorClient>> = match args.mode {
        Mode::Offline => None,
        Mode::Online => {
            let http = HttpThorClient::new(&args.node_url, config.request_timeout)
                .with_context(|| format!("failed to build HTTP client for {}", args.node_url))?;
            let client: Arc<dyn ThorClient> = Arc::new(http);
            check_chain_tag(client.as_ref(), expected_tag, config.request_timeout).await?;
            Some(client)
        }
    };

    let service = ConstructionService::new(config, client)
        .context("failed to build construction service")?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- API server ---
    let app_state = api::AppState {
        service: Arc::new(service),
        metrics: Arc::clone(&node_metrics),
    };
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("Construction API listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("thor-mesh-node stopped");
    Ok(())
}

/// Reads the operator token list.
fn load_tokens(path: &Path) -> Result<Vec<Currency>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read token list {}", path.display()))?;
    parse_token_list(&raw).with_context(|| format!("invalid token list {}", path.display()))
}

/// Refuses to serve a network the chain node is not on. An unreachable
/// node is only logged; requests will surface it as retriable errors.
async fn check_chain_tag(client: &dyn ThorClient, expected: u8, timeout: Duration) -> Result<()> {
    match with_timeout(NodeCall::ChainTag, timeout, client.get_chain_tag()).await {
        Ok(tag) if tag != expected => bail!(
            "chain node reports chain tag 0x{:02x}, expected 0x{:02x}",
            tag,
            expected
        ),
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "chain node not reachable at startup");
            Ok(())
        }
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("thor-mesh-node {}", env!("CARGO_PKG_VERSION"));
    println!("mesh api       {}", MESH_API_VERSION);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use thor_mesh::client::MockThorClient;

    #[test]
    fn token_list_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"symbol": "OCE", "decimals": 18, "metadata": {{"contractAddress": "0x0ce6661b4ba86a0ea7ca2bd86a0de87b0b860f14"}}}}]"#
        )
        .unwrap();
        let tokens = load_tokens(file.path()).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].symbol, "OCE");
    }

    #[test]
    fn missing_token_list_is_error() {
        assert!(load_tokens(Path::new("/nonexistent/tokens.json")).is_err());
    }

    #[tokio::test]
    async fn chain_tag_mismatch_refuses_to_start() {
        let node = MockThorClient::new();
        let timeout = Duration::from_secs(1);
        assert!(check_chain_tag(&node, 0x27, timeout).await.is_ok());
        assert!(check_chain_tag(&node, 0x4a, timeout).await.is_err());
        node.set_unavailable(true);
        assert!(check_chain_tag(&node, 0x4a, timeout).await.is_ok());
    }
}
