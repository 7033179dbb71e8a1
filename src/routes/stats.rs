use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::errors::FaucetError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    success: bool,
    snapshot_block: Option<u64>,
    total_addresses: u64,
    available_addresses: u64,
    minted_addresses: u64,
    created_at: Option<String>,
}

/// `GET /api/v1/faucet/stats`.
async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, FaucetError> {
    let meta = state.store.get_snapshot_meta()?;
    let total = state.store.count_total()?;
    let available = state.store.count_unconsumed()?;

    Ok(Json(StatsResponse {
        success: true,
        snapshot_block: meta.as_ref().map(|m| m.block_height),
        total_addresses: total,
        available_addresses: available,
        minted_addresses: total.saturating_sub(available),
        created_at: meta.map(|m| m.created_at),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/faucet/stats", get(stats))
}
