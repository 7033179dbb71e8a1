//! Canonical claim message hasher (C2).
//!
//! The message is `"<addr>:<destination_id>:<amount>"` (plain ASCII, decimal
//! amount, no padding). The digest wraps it in Bitcoin's signed-message
//! envelope: `varint(len(prefix)) || prefix || varint(len(message)) || message`,
//! then double-SHA256 of the whole encoding.

use sha2::{Digest, Sha256};

use crate::errors::FaucetError;

const MESSAGE_PREFIX: &[u8] = b"Alpha Signed Message:\n";

/// Build the canonical ASCII message from its three parts.
pub fn canonical_message(addr: &str, destination_id: &str, amount: u64) -> String {
    format!("{addr}:{destination_id}:{amount}")
}

/// Encode a length as Bitcoin's CompactSize varint.
fn compact_size(n: u64) -> Result<Vec<u8>, FaucetError> {
    let mut out = Vec::new();
    if n < 253 {
        out.push(n as u8);
    } else if n < 1 << 16 {
        out.push(0xFD);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n < 1u64 << 32 {
        out.push(0xFE);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        return Err(FaucetError::Internal(
            "compact size value too large to encode".to_string(),
        ));
    }
    Ok(out)
}

/// Compute the 32-byte digest of the prefixed, length-delimited message.
pub fn digest(message: &str) -> Result<[u8; 32], FaucetError> {
    let msg_bytes = message.as_bytes();

    let mut encoding = Vec::with_capacity(MESSAGE_PREFIX.len() + msg_bytes.len() + 10);
    encoding.extend(compact_size(MESSAGE_PREFIX.len() as u64)?);
    encoding.extend_from_slice(MESSAGE_PREFIX);
    encoding.extend(compact_size(msg_bytes.len() as u64)?);
    encoding.extend_from_slice(msg_bytes);

    let first = Sha256::digest(&encoding);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Ok(out)
}

/// Build and hash the canonical message in one call.
pub fn hash_claim(addr: &str, destination_id: &str, amount: u64) -> Result<[u8; 32], FaucetError> {
    digest(&canonical_message(addr, destination_id, amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let m = canonical_message("alpha1qexample", "dead", 100);
        assert_eq!(digest(&m).unwrap(), digest(&m).unwrap());
    }

    #[test]
    fn different_messages_hash_differently() {
        let a = hash_claim("alpha1qexample", "dead", 100).unwrap();
        let b = hash_claim("alpha1qexample", "dead", 101).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn compact_size_boundaries() {
        assert_eq!(compact_size(0).unwrap(), vec![0]);
        assert_eq!(compact_size(252).unwrap(), vec![252]);
        assert_eq!(compact_size(253).unwrap(), vec![0xFD, 253, 0]);
        assert_eq!(compact_size(65535).unwrap(), vec![0xFD, 0xFF, 0xFF]);
        assert_eq!(compact_size(65536).unwrap(), vec![0xFE, 0, 0, 1, 0]);
    }

    #[test]
    fn canonical_message_has_no_padding() {
        let m = canonical_message("alpha1qexample", "0xdead", 150000000);
        assert_eq!(m, "alpha1qexample:0xdead:150000000");
    }
}
