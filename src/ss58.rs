//! SS58 account addresses
//!
//! Layout of the base58-decoded bytes:
//! `network prefix (1 or 2 bytes) || account id (32 bytes) || checksum (2 bytes)`,
//! where the checksum is the first two bytes of
//! `blake2b-512("SS58PRE" || prefix || account id)`.

use anyhow::{Context, Result};
use blake2::{Blake2b512, Digest};

const CHECKSUM_PREAMBLE: &[u8] = b"SS58PRE";
const ACCOUNT_LEN: usize = 32;
const CHECKSUM_LEN: usize = 2;

/// A decoded SS58 account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ss58Account {
    /// Network identifier (e.g. 5 for Astar, 42 for generic Substrate)
    pub network: u16,
    pub account: [u8; ACCOUNT_LEN],
}

/// Decode an SS58 account address, verifying its length and checksum.
pub fn decode_account(addr: &str) -> Result<Ss58Account> {
    let data = bs58::decode(addr)
        .into_vec()
        .context("not valid base58")?;

    let (prefix_len, network) = match data.first() {
        Some(&b) if b < 64 => (1, b as u16),
        Some(&b) if b < 128 => {
            let second = *data.get(1).context("truncated network prefix")?;
            // Two-byte form: low 6 bits of the first byte and top 2 bits of the
            // second give the low byte; the second byte's low 6 bits the high one.
            let lower = (b << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            (2, lower as u16 | (upper as u16) << 8)
        }
        Some(&b) => anyhow::bail!("reserved network prefix byte {}", b),
        None => anyhow::bail!("empty address"),
    };

    let expected = prefix_len + ACCOUNT_LEN + CHECKSUM_LEN;
    if data.len() != expected {
        anyhow::bail!("decoded length {} (expected {})", data.len(), expected);
    }

    let (body, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    let mut hasher = Blake2b512::new();
    hasher.update(CHECKSUM_PREAMBLE);
    hasher.update(body);
    if hasher.finalize()[..CHECKSUM_LEN] != *checksum {
        anyhow::bail!("checksum mismatch");
    }

    let mut account = [0u8; ACCOUNT_LEN];
    account.copy_from_slice(&body[prefix_len..]);
    Ok(Ss58Account { network, account })
}
