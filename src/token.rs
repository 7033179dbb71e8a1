//! Fixed token metadata served alongside balance and stats responses.

/// Satoshis per coin unit (10^8), used to convert between the integer
/// ledger amount and the display/upstream coin-unit form.
pub const SATOSHIS_PER_COIN: u64 = 100_000_000;

pub const TOKEN_ID: &str = "alpha";
pub const TOKEN_NAME: &str = "Alpha";
pub const TOKEN_SYMBOL: &str = "ALPHA";
pub const TOKEN_DECIMALS: u8 = 8;
pub const TOKEN_DESCRIPTION: &str =
    "Proxy faucet token minted 1:1 against the Alpha L1 snapshot balance.";

/// Convert a satoshi amount to its coin-unit decimal form.
pub fn satoshis_to_coins(satoshis: u64) -> f64 {
    satoshis as f64 / SATOSHIS_PER_COIN as f64
}
