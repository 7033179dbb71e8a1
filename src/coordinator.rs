//! Claim coordinator (C5): verify → reserve → relay → finalize, with
//! well-defined unwinding on every failure path (spec.md §4.5).

use crate::address;
use crate::errors::FaucetError;
use crate::store::{BalanceStore, ClaimStatus, ConsumeOutcome};
use crate::token;
use crate::upstream::UpstreamClient;
use crate::verify;

pub struct ClaimReceipt {
    pub addr: String,
    pub destination_id: String,
    pub amount: u64,
    pub amount_coins: f64,
    pub relay_tx_id: String,
}

pub struct ClaimCoordinator<'a> {
    pub store: &'a BalanceStore,
    pub upstream: &'a UpstreamClient,
    pub hrp: &'a str,
    pub token_name: &'a str,
}

impl<'a> ClaimCoordinator<'a> {
    pub async fn claim(
        &self,
        addr_raw: &str,
        destination_id: &str,
        amount: u64,
        sig_hex: &str,
    ) -> Result<ClaimReceipt, FaucetError> {
        // 1. Canonicalize the address.
        let addr = address::validate(addr_raw, self.hrp)?;

        // 2. Validate destination: non-empty, otherwise policy-opaque.
        if destination_id.trim().is_empty() {
            return Err(FaucetError::InvalidInput(
                "destination id must not be empty".to_string(),
            ));
        }

        // 3. Validate amount.
        if amount == 0 {
            return Err(FaucetError::InvalidInput(
                "amount must be greater than zero".to_string(),
            ));
        }

        // 4. Log ingress. Every failure from here on must finalize this row.
        let req_id = self
            .store
            .log_claim_request(&addr, destination_id, amount, sig_hex)?;

        match self.run_after_log(&addr, destination_id, amount, sig_hex, req_id).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                let _ = self.store.update_claim_request(
                    req_id,
                    ClaimStatus::Failed,
                    Some(&e.user_message()),
                    None,
                );
                Err(e)
            }
        }
    }

    async fn run_after_log(
        &self,
        addr: &str,
        destination_id: &str,
        amount: u64,
        sig_hex: &str,
        req_id: i64,
    ) -> Result<ClaimReceipt, FaucetError> {
        // 5. Lookup.
        let row = self.store.find(addr)?.ok_or(FaucetError::NotFound)?;

        // 6. Already-consumed short-circuit.
        if row.consumed {
            return Err(FaucetError::AlreadyConsumed {
                destination_id: row.destination_id.clone(),
            });
        }

        // 7. Amount equality, exact.
        if amount != row.initial_amount {
            return Err(FaucetError::AmountMismatch {
                requested: amount,
                available: row.initial_amount,
            });
        }

        // 8. Verify signature.
        verify::verify(addr, destination_id, amount, sig_hex, self.hrp)?;

        // 9. Reserve.
        let reserved = match self
            .store
            .atomic_consume(addr, destination_id, "pending")?
        {
            ConsumeOutcome::Success(row) => row,
            ConsumeOutcome::Raced | ConsumeOutcome::AlreadyConsumed(_) => {
                return Err(FaucetError::AlreadyConsumed {
                    destination_id: Some(destination_id.to_string()),
                })
            }
            ConsumeOutcome::NotFound => return Err(FaucetError::NotFound),
        };

        let amount_coins = token::satoshis_to_coins(reserved.initial_amount);

        // 10. Relay. On failure the reservation stays as-is ("pending"); the
        // operator reconciles manually (spec.md §4.5 step 10, §7).
        let relay = self
            .upstream
            .relay_mint(self.token_name, destination_id, amount_coins)
            .await?;

        // 11. Finalize.
        self.store
            .finalize_relay_tx_id(addr, destination_id, &relay.tx_id)?;
        self.store.update_claim_request(
            req_id,
            ClaimStatus::Success,
            None,
            Some(&relay.response_json),
        )?;

        // 12. Return.
        Ok(ClaimReceipt {
            addr: addr.to_string(),
            destination_id: destination_id.to_string(),
            amount,
            amount_coins,
            relay_tx_id: relay.tx_id,
        })
    }
}
