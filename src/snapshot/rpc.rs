//! L1 JSON-RPC client used by the snapshot builder.
//!
//! JSON-RPC 2.0 over HTTP with optional HTTP Basic auth. Only the methods
//! the snapshot builder needs are exposed: `getblockchaininfo`,
//! `getblockhash`, `scantxoutset`, `getblock`.

use anyhow::{bail, Context, Result};
use serde_json::Value;

pub struct L1RpcClient {
    http: reqwest::Client,
    url: String,
    user: Option<String>,
    password: Option<String>,
}

impl L1RpcClient {
    pub fn new(url: String, user: Option<String>, password: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            user,
            password,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut builder = self.http.post(&self.url).json(&req);
        if let Some(ref user) = self.user {
            builder = builder.basic_auth(user, self.password.clone());
        }

        let resp: Value = builder
            .send()
            .await
            .with_context(|| format!("RPC request {method} failed"))?
            .json()
            .await
            .with_context(|| format!("RPC response for {method} was not valid JSON"))?;

        if let Some(error) = resp.get("error") {
            if !error.is_null() {
                bail!("RPC error calling {method}: {error}");
            }
        }

        resp.get("result")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("RPC response for {method} has no result"))
    }

    pub async fn get_blockchain_info(&self) -> Result<BlockchainInfo> {
        let result = self.call("getblockchaininfo", serde_json::json!([])).await?;
        let blocks = result
            .get("blocks")
            .and_then(|v| v.as_u64())
            .context("getblockchaininfo: missing blocks")?;
        Ok(BlockchainInfo { blocks })
    }

    pub async fn get_block_hash(&self, height: u64) -> Result<String> {
        let result = self
            .call("getblockhash", serde_json::json!([height]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("getblockhash: expected string result")
    }

    /// `scantxoutset("start", ["combo(*)"])` — whole-UTXO-set scan.
    pub async fn scan_tx_out_set(&self) -> Result<ScanResult> {
        let result = self
            .call(
                "scantxoutset",
                serde_json::json!(["start", ["combo(*)"]]),
            )
            .await?;

        let unspents_raw = result
            .get("unspents")
            .and_then(|v| v.as_array())
            .context("scantxoutset: missing unspents array")?;

        let mut unspents = Vec::with_capacity(unspents_raw.len());
        for u in unspents_raw {
            let txid = u
                .get("txid")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let vout = u.get("vout").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let address = u.get("address").and_then(|v| v.as_str()).map(|s| s.to_string());
            let amount = u.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let height = u.get("height").and_then(|v| v.as_u64());
            unspents.push(Unspent {
                txid,
                vout,
                address,
                amount,
                height,
            });
        }

        Ok(ScanResult { unspents })
    }

    /// `getblock(hash, 2)` — full transaction detail.
    pub async fn get_block_verbose(&self, hash: &str) -> Result<Value> {
        self.call("getblock", serde_json::json!([hash, 2])).await
    }
}

pub struct BlockchainInfo {
    pub blocks: u64,
}

pub struct Unspent {
    pub txid: String,
    pub vout: u32,
    pub address: Option<String>,
    pub amount: f64,
    pub height: Option<u64>,
}

pub struct ScanResult {
    pub unspents: Vec<Unspent>,
}
