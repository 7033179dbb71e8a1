use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::address;
use crate::errors::FaucetError;
use crate::state::AppState;
use crate::token;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    success: bool,
    id: &'static str,
    name: &'static str,
    symbol: &'static str,
    decimals: u8,
    description: &'static str,
    l1_addr: String,
    unicity_id: Option<String>,
    amount: f64,
    amount_in_small_units: u64,
    initial_amount: f64,
    initial_amount_in_small_units: u64,
    spent: bool,
    in_snapshot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    minted_at: Option<String>,
}

/// `GET /api/v1/faucet/balance/:addr`.
async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(addr_raw): Path<String>,
) -> Result<Json<BalanceResponse>, FaucetError> {
    let addr = address::validate(&addr_raw, &state.hrp)?;
    let row = state.store.find(&addr)?;

    let response = match row {
        Some(row) => BalanceResponse {
            success: true,
            id: token::TOKEN_ID,
            name: token::TOKEN_NAME,
            symbol: token::TOKEN_SYMBOL,
            decimals: token::TOKEN_DECIMALS,
            description: token::TOKEN_DESCRIPTION,
            l1_addr: row.l1_address.clone(),
            unicity_id: row.destination_id.clone(),
            amount: if row.consumed { 0.0 } else { token::satoshis_to_coins(row.initial_amount) },
            amount_in_small_units: if row.consumed { 0 } else { row.initial_amount },
            initial_amount: token::satoshis_to_coins(row.initial_amount),
            initial_amount_in_small_units: row.initial_amount,
            spent: row.consumed,
            in_snapshot: true,
            minted_at: row.consumed_at,
        },
        None => BalanceResponse {
            success: true,
            id: token::TOKEN_ID,
            name: token::TOKEN_NAME,
            symbol: token::TOKEN_SYMBOL,
            decimals: token::TOKEN_DECIMALS,
            description: token::TOKEN_DESCRIPTION,
            l1_addr: addr,
            unicity_id: None,
            amount: 0.0,
            amount_in_small_units: 0,
            initial_amount: 0.0,
            initial_amount_in_small_units: 0,
            spent: false,
            in_snapshot: false,
            minted_at: None,
        },
    };

    Ok(Json(response))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/faucet/balance/{addr}", get(get_balance))
}
