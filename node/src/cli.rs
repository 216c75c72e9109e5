//! # CLI Interface
//!
//! Command-line arguments for `thor-mesh-node` using `clap` derive. Every
//! `run` flag falls back to a `THOR_MESH_*` environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use thor_mesh::config::Mode;

use crate::logging::LogFormat;

/// VeChainThor Mesh Construction API server.
#[derive(Parser, Debug)]
#[command(
    name = "thor-mesh-node",
    about = "VeChainThor Mesh Construction API server",
    version,
    propagate_version = true
)]
pub struct ThorMeshCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the Construction API.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// `online` talks to a chain node; `offline` serves only the steps that
    /// need none.
    #[arg(long, env = "THOR_MESH_MODE", default_value = "online")]
    pub mode: Mode,

    /// Network served: main, test or solo.
    #[arg(long, env = "THOR_MESH_NETWORK", default_value = "main")]
    pub network: String,

    /// Thor REST API of the chain node. Ignored offline.
    #[arg(long, env = "THOR_MESH_NODE_URL", default_value = "http://127.0.0.1:8669")]
    pub node_url: String,

    /// Port for the Construction API.
    #[arg(long, env = "THOR_MESH_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "THOR_MESH_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Upper bound on every chain-node call, in milliseconds.
    #[arg(long, env = "THOR_MESH_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// JSON file of extra tokens, each `{symbol, decimals, metadata: {contractAddress}}`.
    #[arg(long, env = "THOR_MESH_TOKEN_LIST")]
    pub token_list: Option<PathBuf>,

    #[arg(long, env = "THOR_MESH_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}
