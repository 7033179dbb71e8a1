//! Shared application state.

use crate::config::Config;
use crate::store::BalanceStore;
use crate::upstream::UpstreamClient;

pub struct AppState {
    pub store: BalanceStore,
    pub upstream: UpstreamClient,
    pub hrp: String,
}

impl AppState {
    pub fn new(config: &Config, store: BalanceStore) -> Self {
        Self {
            store,
            upstream: UpstreamClient::new(config.upstream_mint_url.clone()),
            hrp: config.hrp.clone(),
        }
    }
}
