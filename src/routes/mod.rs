mod balance;
mod claim;
mod health;
mod stats;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the full router: the faucet claim surface of spec.md §6.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(balance::router())
        .merge(claim::router())
        .merge(stats::router())
        .with_state(state)
}
