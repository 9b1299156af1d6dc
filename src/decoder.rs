//! EVM call decoding
//!
//! Turns an `ethereum.transact` extrinsic into the `{from, to, data, success}`
//! view the metrics are built from.

use crate::error::BlockError;
use crate::types::{parse_evm_address, parse_hex_bytes, MethodId};
use crate::wrap::WrappedTransaction;
use alloy_primitives::Address;
use serde_json::Value;

/// Decoded EVM call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmCall {
    /// Caller, unknown when the dispatch failed before the EVM ran
    pub from: Option<Address>,
    /// Callee, or the created contract for a deployment
    pub to: Option<Address>,
    /// Call input / init code
    pub data: Vec<u8>,
    /// Same flag as the wrapping extrinsic's `success`
    pub success: bool,
}

/// Decodes EVM-classified transactions into calls.
///
/// Decoding must succeed for every EVM transaction; an error aborts the block.
pub trait EvmCallDecoder {
    fn decode(&self, tx: &WrappedTransaction<'_>) -> Result<EvmCall, BlockError>;
}

/// Decoder for Frontier's `ethereum` pallet.
///
/// `from` and `to` come from the `ethereum.Executed` event
/// (data = [from, to_or_contract, tx_hash, exit_reason]), the payload from
/// the `input` of the extrinsic's `transaction` argument. A reverted call
/// still dispatches successfully, so the EVM exit reason does not affect
/// `success`.
///
/// A failed dispatch emits no `Executed` event. Such a transaction decodes
/// to an unsuccessful call with whatever the `transaction` argument carries.
#[derive(Debug, Clone)]
pub struct FrontierDecoder {
    executed_event: MethodId,
}

impl FrontierDecoder {
    pub fn new(executed_event: MethodId) -> Self {
        Self { executed_event }
    }
}

impl Default for FrontierDecoder {
    fn default() -> Self {
        Self::new(MethodId::new("ethereum", "Executed"))
    }
}

impl EvmCallDecoder for FrontierDecoder {
    fn decode(&self, tx: &WrappedTransaction<'_>) -> Result<EvmCall, BlockError> {
        let index = tx.index;
        let transaction = tx.extrinsic.arg("transaction");

        let Some(executed) = tx.events.iter().find(|evt| evt.event == self.executed_event) else {
            if tx.success {
                return Err(BlockError::decode(
                    index,
                    format!("no {} event", self.executed_event),
                ));
            }
            return Ok(EvmCall {
                from: tx.extrinsic.signer.as_deref().and_then(parse_evm_address),
                to: transaction.and_then(find_call_target),
                data: transaction
                    .and_then(find_input)
                    .and_then(|input| parse_hex_bytes(input).ok())
                    .unwrap_or_default(),
                success: false,
            });
        };

        let address_field = |pos: usize, name: &str| {
            executed
                .field_str(pos)
                .as_deref()
                .and_then(parse_evm_address)
                .ok_or_else(|| BlockError::decode(index, format!("malformed `{}` address", name)))
        };
        let from = address_field(0, "from")?;
        let to = address_field(1, "to")?;

        let transaction =
            transaction.ok_or_else(|| BlockError::decode(index, "missing `transaction` argument"))?;
        let input = find_input(transaction)
            .ok_or_else(|| BlockError::decode(index, "transaction has no `input`"))?;
        let data = parse_hex_bytes(input)
            .map_err(|e| BlockError::decode(index, format!("invalid input hex: {}", e)))?;

        Ok(EvmCall {
            from: Some(from),
            to: Some(to),
            data,
            success: tx.success,
        })
    }
}

/// Field of a transaction, either directly or inside a typed envelope
/// (`{"legacy": {..}}`, `{"eip1559": {..}}`, ...).
fn envelope_field<'v>(transaction: &'v Value, name: &str) -> Option<&'v Value> {
    let obj = transaction.as_object()?;
    if let Some(value) = obj.get(name) {
        return Some(value);
    }
    obj.values()
        .filter_map(Value::as_object)
        .find_map(|inner| inner.get(name))
}

fn find_input(transaction: &Value) -> Option<&str> {
    envelope_field(transaction, "input")?.as_str()
}

/// Callee named by the transaction's `action`: `{"call": "0x.."}`.
/// Creations (`"create"`) have no target before execution.
fn find_call_target(transaction: &Value) -> Option<Address> {
    let action = envelope_field(transaction, "action")?.as_object()?;
    action
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("call"))
        .and_then(|(_, v)| v.as_str())
        .and_then(parse_evm_address)
}
