//! Raw block types
//!
//! Type definitions for blocks, extrinsics and events as delivered by a
//! block source. Blocks carry two transaction universes: native extrinsics
//! and EVM transactions routed through `ethereum.transact`.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A `section.method` pair identifying a call or an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodId {
    /// Pallet / module name (e.g. `balances`)
    pub section: String,
    /// Call or event name within the section (e.g. `transfer`, `Deposit`)
    pub method: String,
}

impl MethodId {
    pub fn new(section: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.method)
    }
}

/// Block with all extrinsics and the events they emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block height
    pub height: u64,

    /// Block timestamp (Unix epoch milliseconds in JSON)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Extrinsics in block order
    #[serde(default)]
    pub extrinsics: Vec<Extrinsic>,

    /// Events in emission order, each tagged with its phase
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

/// A single extrinsic (transaction) in a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extrinsic {
    /// Dispatched call
    pub method: MethodId,

    /// Signer address (None for unsigned / inherent extrinsics)
    #[serde(default)]
    pub signer: Option<String>,

    /// Call arguments in declaration order
    #[serde(default)]
    pub args: Vec<CallArg>,
}

impl Extrinsic {
    /// Look up a call argument by name.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

/// Named call argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallArg {
    pub name: String,
    pub value: Value,
}

/// Phase in which an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Emitted while applying the extrinsic at this index
    ApplyExtrinsic(u32),
    Finalization,
    Initialization,
}

/// Event with its phase and positional data fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub phase: Phase,
    pub event: MethodId,
    #[serde(default)]
    pub data: Vec<Value>,
}

impl EventRecord {
    /// Check whether this event was emitted by the extrinsic at `index`.
    pub fn belongs_to(&self, index: usize) -> bool {
        matches!(self.phase, Phase::ApplyExtrinsic(i) if i as usize == index)
    }

    /// Positional data field rendered as a string (strings are returned as-is).
    pub fn field_str(&self, index: usize) -> Option<String> {
        match self.data.get(index)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// Hex helpers

/// Pad an odd-length hex string with a leading zero.
fn pad_hex_string(s: &str) -> String {
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

/// Decode a hex string (with or without 0x prefix) into bytes.
///
/// `"0x"` and `""` both decode to an empty payload.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(pad_hex_string(s))
}

/// Parse a 20-byte EVM address from a hex string.
pub fn parse_evm_address(s: &str) -> Option<Address> {
    let bytes = parse_hex_bytes(s.trim()).ok()?;
    if bytes.len() != 20 {
        return None;
    }
    Some(Address::from_slice(&bytes))
}

/// Render an EVM address in its normalised form: lowercase, 0x-prefixed.
pub fn format_evm_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr.as_slice()))
}
