//! Gas fee accounting
//!
//! Fees on the chain are paid into a system account (the stake pot), which
//! shows up as a `balances.Deposit` event for that account. The fee of a
//! set of transactions is the sum of those deposits.

use crate::error::BlockError;
use crate::types::{EventRecord, MethodId};
use crate::wrap::WrappedTransaction;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where fee deposits are credited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Account receiving fees
    pub system_account: String,
    /// Event crediting the account: data = [account, amount]
    pub deposit_event: MethodId,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            system_account: "YQnbw3h6couUX48Ghs3qyzhdbyxA3Gu9KQCoi8z2CPBf9N3".to_string(),
            deposit_event: MethodId::new("balances", "Deposit"),
        }
    }
}

impl FeeConfig {
    /// Sum the fee deposits of all successful transactions.
    ///
    /// Failed transactions contribute nothing regardless of their events.
    /// An unparsable amount on a matching deposit aborts the block.
    pub fn gas_used(&self, txs: &[WrappedTransaction<'_>]) -> Result<U256, BlockError> {
        let mut total = U256::ZERO;
        for tx in txs.iter().filter(|tx| tx.success) {
            for evt in &tx.events {
                if let Some(amount) = self.deposit_amount(evt) {
                    let amount = amount.map_err(|reason| BlockError::decode(tx.index, reason))?;
                    total = total.saturating_add(amount);
                }
            }
        }
        Ok(total)
    }

    /// Amount of a deposit to the system account, or None for any other event.
    fn deposit_amount(&self, evt: &EventRecord) -> Option<Result<U256, String>> {
        if evt.event != self.deposit_event {
            return None;
        }
        if evt.field_str(0).as_deref() != Some(self.system_account.as_str()) {
            return None;
        }
        Some(parse_amount(evt.data.get(1).unwrap_or(&Value::Null)))
    }
}

/// Parse an unsigned amount from a JSON number, decimal string or 0x-hex string.
pub fn parse_amount(value: &Value) -> Result<U256, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("amount {} is not an unsigned integer", n)),
        Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x") {
                Some(hex) if hex.is_empty() => Ok(U256::ZERO),
                Some(hex) => U256::from_str_radix(hex, 16),
                None => U256::from_str_radix(s, 10),
            };
            parsed.map_err(|e| format!("invalid amount {:?}: {}", s, e))
        }
        other => Err(format!("unexpected amount value {}", other)),
    }
}
