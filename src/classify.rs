//! Call payload classification
//!
//! Byte-prefix heuristics over EVM call data. A creation payload is
//! recognised by the solc deployment preamble (`PUSH1 0x.. PUSH1 0x40`),
//! not by decoding; false positives and negatives are accepted.

use serde::{Deserialize, Serialize};

/// Byte markers identifying contract-creation bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadMarkers {
    /// Expected first byte (PUSH1)
    pub creation_opcode: u8,
    /// Expected bytes at offset 2..4 (PUSH1 0x40)
    pub creation_secondary: [u8; 2],
}

impl Default for PayloadMarkers {
    fn default() -> Self {
        Self {
            creation_opcode: 0x60,
            creation_secondary: [0x60, 0x40],
        }
    }
}

impl PayloadMarkers {
    /// Check whether a call payload looks like contract-creation bytecode.
    ///
    /// Payloads shorter than 4 bytes never match.
    pub fn is_contract_creation(&self, payload: &[u8]) -> bool {
        payload.len() >= 4
            && payload[0] == self.creation_opcode
            && payload[2..4] == self.creation_secondary
    }
}

/// True iff the payload is empty after stripping leading zero bytes.
pub fn is_zero_payload(payload: &[u8]) -> bool {
    payload.iter().all(|b| *b == 0)
}

/// True iff the payload carries anything beyond leading zeros, i.e. it is a
/// contract call rather than a plain value transfer.
pub fn is_contract_invocation(payload: &[u8]) -> bool {
    !is_zero_payload(payload)
}
