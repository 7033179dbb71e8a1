//! Upstream mint relay client (§6, called from the claim coordinator's step 10).
//!
//! `POST <base>/api/v1/faucet/request` with `{unicityId, coin, amount}`. The
//! relay tx id is taken from `data.requestId` if present, else `txId`, else
//! the literal `"unknown"`.

use std::time::Duration;

use serde_json::Value;

use crate::errors::FaucetError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

pub struct RelayResult {
    pub tx_id: String,
    pub response_json: String,
}

impl UpstreamClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        Self { http, base_url }
    }

    /// Relay a mint request to the upstream service. Any timeout, connection
    /// error, or non-2xx status maps to `UpstreamFailure` — the coordinator
    /// leaves the reservation in place on this path (spec.md §4.5 step 10).
    pub async fn relay_mint(
        &self,
        coin_name: &str,
        destination_id: &str,
        amount_coins: f64,
    ) -> Result<RelayResult, FaucetError> {
        let url = format!("{}/api/v1/faucet/request", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "unicityId": destination_id,
            "coin": coin_name,
            "amount": amount_coins,
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FaucetError::UpstreamFailure(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(FaucetError::UpstreamFailure(format!(
                "upstream returned status {}",
                resp.status()
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| FaucetError::UpstreamFailure(format!("invalid upstream body: {e}")))?;

        let tx_id = json
            .get("data")
            .and_then(|d| d.get("requestId"))
            .and_then(|v| v.as_str())
            .or_else(|| json.get("txId").and_then(|v| v.as_str()))
            .unwrap_or("unknown")
            .to_string();

        Ok(RelayResult {
            tx_id,
            response_json: json.to_string(),
        })
    }
}
