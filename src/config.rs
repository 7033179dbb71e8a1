//! CLI definition and resolved configuration for the claim server.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "alpha-faucet")]
#[command(about = "Proxy faucet: redeem an Alpha L1 snapshot balance for an L3 mint")]
pub struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Path to the SQLite balance store.
    #[arg(long, env = "DATABASE_PATH", default_value = "faucet.db")]
    pub database_path: PathBuf,

    /// Upstream mint service base URL.
    #[arg(long, env = "UPSTREAM_MINT_URL")]
    pub upstream_mint_url: String,

    /// Source-chain JSON-RPC URL (used for operator diagnostics only; the
    /// server itself does not need L1 access after the snapshot is built).
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Bech32 human-readable prefix for L1 addresses.
    #[arg(long, env = "HRP", default_value = "alpha")]
    pub hrp: String,

    /// CORS allowed origin. `*` allows any origin.
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Log level passed to `tracing_subscriber`'s env filter when `RUST_LOG`
    /// is not already set.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Resolved server configuration, assembled from `Cli` the way the claim
/// coordinator and routes need it.
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub upstream_mint_url: String,
    pub hrp: String,
    pub cors_origin: String,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            database_path: cli.database_path,
            upstream_mint_url: cli.upstream_mint_url,
            hrp: cli.hrp,
            cors_origin: cli.cors_origin,
        }
    }
}
