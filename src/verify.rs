//! Recoverable ECDSA signature verifier (C3).
//!
//! Parses a 65-byte recoverable signature (130 hex chars), recovers the
//! candidate public key against the canonical claim digest, rederives the
//! claimed address, and enforces low-S (BIP-62) before calling it valid.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, SecretKey};

use crate::address;
use crate::errors::FaucetError;
use crate::hasher;

/// secp256k1 group order `n`, big-endian.
const ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// `n / 2`, big-endian — the low-S threshold.
const ORDER_HALF: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Result of a successful verification.
pub struct VerifyOutcome {
    pub recovered_pubkey_hex: String,
    pub derived_address: String,
}

fn ge(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a >= b
}

fn is_zero(a: &[u8; 32]) -> bool {
    a.iter().all(|&b| b == 0)
}

/// Parsed signature components.
struct ParsedSig {
    r: [u8; 32],
    s: [u8; 32],
    recovery_id: u8,
}

fn parse_signature(sig_hex: &str) -> Result<ParsedSig, FaucetError> {
    let stripped = sig_hex.strip_prefix("0x").unwrap_or(sig_hex);

    if stripped.len() != 130 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FaucetError::BadSignature(
            "signature must be exactly 130 hex characters".to_string(),
        ));
    }

    let bytes = hex::decode(stripped)
        .map_err(|e| FaucetError::BadSignature(format!("invalid hex: {e}")))?;
    debug_assert_eq!(bytes.len(), 65);

    let v = bytes[0];
    let recovery_id = match v {
        27..=30 => {
            return Err(FaucetError::BadSignature(
                "uncompressed-key recovery tag (27-30) is not supported".to_string(),
            ))
        }
        31..=34 => v - 31,
        39..=42 => v - 39,
        _ => {
            return Err(FaucetError::BadSignature(format!(
                "invalid recovery tag v={v}"
            )))
        }
    };

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[1..33]);
    s.copy_from_slice(&bytes[33..65]);

    if is_zero(&r) || ge(&r, &ORDER) || is_zero(&s) || ge(&s, &ORDER) {
        return Err(FaucetError::BadSignature(
            "r or s out of range [1, n-1]".to_string(),
        ));
    }

    if s > ORDER_HALF {
        return Err(FaucetError::BadSignature(
            "non-canonical signature: s is not low-S".to_string(),
        ));
    }

    Ok(ParsedSig { r, s, recovery_id })
}

/// Verify `(addr, destination_id, amount, sig_hex)`.
pub fn verify(
    addr: &str,
    destination_id: &str,
    amount: u64,
    sig_hex: &str,
    hrp: &str,
) -> Result<VerifyOutcome, FaucetError> {
    let parsed = parse_signature(sig_hex)?;
    let digest = hasher::hash_claim(addr, destination_id, amount)?;
    let message = Message::from_digest(digest);

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&parsed.r);
    compact[32..].copy_from_slice(&parsed.s);

    let recovery_id = RecoveryId::from_i32(parsed.recovery_id as i32)
        .map_err(|_| FaucetError::BadSignature("invalid recovery id".to_string()))?;
    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| FaucetError::BadSignature(format!("malformed signature: {e}")))?;

    let secp = secp256k1::Secp256k1::verification_only();
    let recovered_pubkey = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|e| FaucetError::BadSignature(format!("could not recover public key: {e}")))?;

    let pubkey_bytes = recovered_pubkey.serialize();
    let derived_address = address::from_pubkey(&pubkey_bytes, hrp)?;

    if derived_address != addr.to_lowercase() {
        return Err(FaucetError::AddressMismatch);
    }

    // Defense-in-depth: a standard (non-recovering) ECDSA verify of (r, s)
    // against the recovered key. Recovery already implies this holds, but a
    // library bug in recovery should not be trusted blindly for a faucet.
    let standard_sig = recoverable.to_standard();
    secp.verify_ecdsa(&message, &standard_sig, &recovered_pubkey)
        .map_err(|_| FaucetError::MathCheckFailed)?;

    Ok(VerifyOutcome {
        recovered_pubkey_hex: hex::encode(pubkey_bytes),
        derived_address,
    })
}

/// Deterministic signer used by tests and fixtures. Signs the canonical
/// digest with a low-S signature and brute-forces the recovery index that
/// rederives the signer's own public key, emitting `v = 31 + k`.
pub fn sign(
    secret_key: &SecretKey,
    addr: &str,
    destination_id: &str,
    amount: u64,
) -> Result<String, FaucetError> {
    let secp = secp256k1::Secp256k1::new();
    let digest = hasher::hash_claim(addr, destination_id, amount)?;
    let message = Message::from_digest(digest);

    let recoverable = secp.sign_ecdsa_recoverable(&message, secret_key);
    let (_recid, compact) = recoverable.serialize_compact();
    let expected_pubkey = PublicKey::from_secret_key(&secp, secret_key);

    for k in 0..4u8 {
        let recid = match RecoveryId::from_i32(k as i32) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let candidate = match RecoverableSignature::from_compact(&compact, recid) {
            Ok(c) => c,
            Err(_) => continue,
        };
        if let Ok(recovered) = secp.recover_ecdsa(&message, &candidate) {
            if recovered == expected_pubkey {
                let v = 31 + k;
                let mut out = Vec::with_capacity(65);
                out.push(v);
                out.extend_from_slice(&compact);
                return Ok(hex::encode(out));
            }
        }
    }

    Err(FaucetError::Internal(
        "could not find a recovery id matching the signer's key".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::rand::rngs::OsRng;
    use secp256k1::Secp256k1;

    fn keypair() -> (SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        secp.generate_keypair(&mut OsRng)
    }

    #[test]
    fn verify_after_sign_succeeds() {
        let (sk, pk) = keypair();
        let addr = address::from_pubkey(&pk.serialize(), "alpha").unwrap();
        let sig = sign(&sk, &addr, "0xdead", 150_000_000).unwrap();
        let outcome = verify(&addr, "0xdead", 150_000_000, &sig, "alpha").unwrap();
        assert_eq!(outcome.derived_address, addr);
    }

    #[test]
    fn flipped_amount_rejected() {
        let (sk, pk) = keypair();
        let addr = address::from_pubkey(&pk.serialize(), "alpha").unwrap();
        let sig = sign(&sk, &addr, "0xdead", 150_000_000).unwrap();
        assert!(verify(&addr, "0xdead", 150_000_001, &sig, "alpha").is_err());
    }

    #[test]
    fn altered_destination_rejected() {
        let (sk, pk) = keypair();
        let addr = address::from_pubkey(&pk.serialize(), "alpha").unwrap();
        let sig = sign(&sk, &addr, "0xdead", 150_000_000).unwrap();
        assert!(verify(&addr, "0xbeef", 150_000_000, &sig, "alpha").is_err());
    }

    #[test]
    fn wrong_signer_is_address_mismatch() {
        let (sk_a, pk_a) = keypair();
        let (sk_b, _pk_b) = keypair();
        let addr_a = address::from_pubkey(&pk_a.serialize(), "alpha").unwrap();
        let sig = sign(&sk_b, &addr_a, "0xdead", 1000).unwrap();
        let err = verify(&addr_a, "0xdead", 1000, &sig, "alpha").unwrap_err();
        assert!(matches!(err, FaucetError::AddressMismatch));
    }

    #[test]
    fn non_hex_signature_rejected() {
        let err = verify("alpha1qexample", "0xdead", 1, "zz".repeat(65).as_str(), "alpha")
            .unwrap_err();
        assert!(matches!(err, FaucetError::BadSignature(_)));
    }

    #[test]
    fn wrong_length_signature_rejected() {
        let err = verify("alpha1qexample", "0xdead", 1, "00", "alpha").unwrap_err();
        assert!(matches!(err, FaucetError::BadSignature(_)));
    }

    #[test]
    fn recovery_tag_out_of_range_rejected() {
        let mut bytes = vec![0x1bu8]; // 27, explicitly unsupported uncompressed range
        bytes.extend(vec![1u8; 64]);
        let err = verify("alpha1qexample", "0xdead", 1, &hex::encode(bytes), "alpha")
            .unwrap_err();
        assert!(matches!(err, FaucetError::BadSignature(_)));

        let mut bytes2 = vec![200u8]; // outside all known ranges
        bytes2.extend(vec![1u8; 64]);
        let err2 = verify("alpha1qexample", "0xdead", 1, &hex::encode(bytes2), "alpha")
            .unwrap_err();
        assert!(matches!(err2, FaucetError::BadSignature(_)));
    }

    #[test]
    fn high_s_rejected() {
        let (sk, pk) = keypair();
        let addr = address::from_pubkey(&pk.serialize(), "alpha").unwrap();
        let sig_hex = sign(&sk, &addr, "0xdead", 1000).unwrap();
        let mut bytes = hex::decode(&sig_hex).unwrap();
        // Force s = ORDER - 1 (definitely > n/2), keep r and v untouched.
        bytes[33..65].copy_from_slice(&{
            let mut s = ORDER;
            s[31] -= 1;
            s
        });
        let err = verify(&addr, "0xdead", 1000, &hex::encode(bytes), "alpha").unwrap_err();
        assert!(matches!(err, FaucetError::BadSignature(_)));
    }

    #[test]
    fn zero_r_rejected() {
        let mut bytes = vec![31u8];
        bytes.extend(vec![0u8; 32]); // r = 0
        bytes.extend(vec![1u8; 32]);
        let err = verify("alpha1qexample", "0xdead", 1, &hex::encode(bytes), "alpha")
            .unwrap_err();
        assert!(matches!(err, FaucetError::BadSignature(_)));
    }
}
