//! Utility functions for generating participant addresses

use super::types::{ADDRESS_LEN, Address};
use uuid7::uuid7;

// hashes the seed and keeps the leading 20 bytes
fn address_from_seed(seed: &[u8]) -> anyhow::Result<Address> {
    let digest = hex::decode(sha256::digest(seed))?;
    Ok(Address::try_from(&digest[..ADDRESS_LEN])?)
}

/// A fresh, practically unique address derived from a uuid7.
pub fn new_address() -> anyhow::Result<Address> {
    address_from_seed(uuid7().as_bytes())
}

/// Deterministic address for a human readable label, handy for fixtures.
pub fn address_for(label: &str) -> anyhow::Result<Address> {
    if label.is_empty() {
        anyhow::bail!("address label must not be empty");
    }
    address_from_seed(label.as_bytes())
}
