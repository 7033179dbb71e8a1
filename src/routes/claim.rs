use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::coordinator::ClaimCoordinator;
use crate::errors::FaucetError;
use crate::state::AppState;
use crate::token;

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    l1_addr: String,
    #[serde(rename = "unicityId")]
    unicity_id: String,
    amount: u64,
    signature: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimResponse {
    success: bool,
    addr: String,
    destination_id: String,
    amount: u64,
    amount_coins: f64,
    relay_tx_id: String,
    ok: bool,
}

/// `POST /api/v1/faucet/request`.
async fn request_claim(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, FaucetError> {
    if body.amount == 0 {
        return Err(FaucetError::InvalidInput(
            "amount must be an integer >= 1".to_string(),
        ));
    }

    let coordinator = ClaimCoordinator {
        store: &state.store,
        upstream: &state.upstream,
        hrp: &state.hrp,
        token_name: token::TOKEN_NAME,
    };

    let receipt = coordinator
        .claim(&body.l1_addr, &body.unicity_id, body.amount, &body.signature)
        .await?;

    Ok(Json(ClaimResponse {
        success: true,
        addr: receipt.addr,
        destination_id: receipt.destination_id,
        amount: receipt.amount,
        amount_coins: receipt.amount_coins,
        relay_tx_id: receipt.relay_tx_id,
        ok: true,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/faucet/request", post(request_claim))
}
