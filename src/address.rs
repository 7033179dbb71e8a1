//! Bech32 P2WPKH address codec (C1).
//!
//! Targets witness version 0, a 20-byte witness program, and a configurable
//! human-readable prefix (default `"alpha"`). Bech32, not bech32m — this
//! chain never adopted the v1+ taproot checksum variant.

use bech32::{self, u5, FromBase32, ToBase32, Variant};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::errors::FaucetError;

const MIN_ADDR_LEN: usize = 14;
const MAX_ADDR_LEN: usize = 74;

/// Validate an address against `hrp`, returning its lowercased normal form.
///
/// Implements the seven checks of spec.md §4.1 in order, so the first one
/// that fails determines `reason`.
pub fn validate(addr: &str, hrp: &str) -> Result<String, FaucetError> {
    let normalized = addr.to_lowercase();
    let prefix = format!("{hrp}1");

    if !normalized.starts_with(&prefix) {
        return Err(FaucetError::InvalidAddress(format!(
            "address must start with \"{prefix}\""
        )));
    }

    if normalized.len() < MIN_ADDR_LEN || normalized.len() > MAX_ADDR_LEN {
        return Err(FaucetError::InvalidAddress(format!(
            "address length {} out of range [{}, {}]",
            normalized.len(),
            MIN_ADDR_LEN,
            MAX_ADDR_LEN
        )));
    }

    let data_part = &normalized[prefix.len()..];
    if !data_part.chars().all(is_bech32_char) {
        return Err(FaucetError::InvalidAddress(
            "address contains characters outside the bech32 alphabet".to_string(),
        ));
    }

    let (decoded_hrp, data, variant) = bech32::decode(&normalized).map_err(|e| {
        FaucetError::InvalidAddress(format!("bech32 decode failed: {e}"))
    })?;

    if decoded_hrp != hrp {
        return Err(FaucetError::InvalidAddress(format!(
            "unexpected hrp \"{decoded_hrp}\", expected \"{hrp}\""
        )));
    }

    if variant != Variant::Bech32 {
        return Err(FaucetError::InvalidAddress(
            "address uses bech32m, expected bech32".to_string(),
        ));
    }

    let (witness_version, program) = split_witness(&data)?;
    if witness_version != 0 {
        return Err(FaucetError::InvalidAddress(format!(
            "unsupported witness version {witness_version}, expected 0"
        )));
    }

    if program.len() != 20 {
        return Err(FaucetError::InvalidAddress(format!(
            "witness program is {} bytes, expected 20 (P2WPKH)",
            program.len()
        )));
    }

    Ok(normalized)
}

/// Decode a pre-validated address into its witness version and 20-byte program.
pub fn decode(addr: &str, hrp: &str) -> Result<(u8, [u8; 20]), FaucetError> {
    let normalized = validate(addr, hrp)?;
    let (_, data, _) = bech32::decode(&normalized)
        .map_err(|e| FaucetError::InvalidAddress(format!("bech32 decode failed: {e}")))?;
    let (witness_version, program) = split_witness(&data)?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&program);
    Ok((witness_version, out))
}

/// Encode a 20-byte witness program as a witness-version-0 bech32 address.
pub fn encode(pubkey_hash: &[u8], hrp: &str) -> Result<String, FaucetError> {
    if pubkey_hash.len() != 20 {
        return Err(FaucetError::InvalidAddress(format!(
            "pubkey hash must be 20 bytes, got {}",
            pubkey_hash.len()
        )));
    }

    let mut data = vec![u5::try_from_u8(0).unwrap()];
    data.extend(pubkey_hash.to_base32());

    bech32::encode(hrp, data, Variant::Bech32)
        .map_err(|e| FaucetError::Internal(format!("bech32 encode failed: {e}")))
}

/// Derive a P2WPKH address from a 33-byte compressed public key.
pub fn from_pubkey(compressed_pubkey: &[u8], hrp: &str) -> Result<String, FaucetError> {
    if compressed_pubkey.len() != 33 {
        return Err(FaucetError::InvalidAddress(format!(
            "compressed pubkey must be 33 bytes, got {}",
            compressed_pubkey.len()
        )));
    }

    let sha = Sha256::digest(compressed_pubkey);
    let hash160 = Ripemd160::digest(sha);
    encode(&hash160, hrp)
}

fn split_witness(data: &[u5]) -> Result<(u8, Vec<u8>), FaucetError> {
    let (version_word, program_words) = data
        .split_first()
        .ok_or_else(|| FaucetError::InvalidAddress("empty bech32 data section".to_string()))?;

    let program = Vec::<u8>::from_base32(program_words)
        .map_err(|e| FaucetError::InvalidAddress(format!("invalid witness program: {e}")))?;

    Ok((version_word.to_u8(), program))
}

fn is_bech32_char(c: char) -> bool {
    const ALPHABET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
    ALPHABET.contains(c.to_ascii_lowercase())
}
