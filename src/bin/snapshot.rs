//! Operator CLI: build the one-shot balance snapshot (C6) from an L1 node.
//!
//! Run once, before the server ever starts, against an L1 RPC endpoint.
//! Refuses to run against an output path that already exists.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use alpha_faucet::snapshot::{self, SnapshotConfig};

#[derive(Debug, Parser)]
#[command(name = "alpha-faucet-snapshot")]
#[command(about = "Build the one-shot UTXO balance snapshot for the Alpha faucet")]
struct Cli {
    /// L1 JSON-RPC endpoint.
    #[arg(long, env = "RPC_URL")]
    rpc: String,

    /// RPC basic-auth username, if required.
    #[arg(long, env = "RPC_USER")]
    rpc_user: Option<String>,

    /// RPC basic-auth password, if required.
    #[arg(long, env = "RPC_PASS")]
    rpc_pass: Option<String>,

    /// Block height to snapshot at. Defaults to the node's current tip.
    #[arg(long)]
    block: Option<u64>,

    /// Output SQLite database path. Must not already exist.
    #[arg(long, default_value = "faucet.db")]
    output: PathBuf,

    /// Bech32 human-readable prefix for eligible L1 addresses.
    #[arg(long, default_value = "alpha")]
    hrp: String,

    /// Upstream mint endpoint recorded in snapshot metadata (informational).
    #[arg(long, env = "UPSTREAM_MINT_URL", default_value = "")]
    upstream: String,

    /// Rows per `bulk_insert_balances` transaction.
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alpha_faucet_snapshot=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = snapshot::run(SnapshotConfig {
        rpc_url: cli.rpc,
        rpc_user: cli.rpc_user,
        rpc_password: cli.rpc_pass,
        block_height: cli.block,
        output_path: cli.output,
        hrp: cli.hrp,
        upstream_endpoint: cli.upstream,
        batch_size: cli.batch_size,
    })
    .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "snapshot build failed");
        std::process::exit(1);
    }

    Ok(())
}
