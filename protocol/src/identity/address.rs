//! # Addresses
//!
//! Every participant, asset, account, and record in PAWN is named by a
//! 32-byte [`Address`]. There are three ways to get one:
//!
//! ```text
//! Address::from_label("alice")            -> BLAKE3-derive-key("pawn-label", "alice")
//! Address::derive(program_id, seeds)      -> SHA-256(len||seed ... || program_id || marker)
//! "9f2c...e1".parse::<Address>()           -> raw hex
//! ```
//!
//! Derived addresses are how the program owns things without a registry:
//! the custody account for a collateral deposit, the loan record, each
//! offer and its escrow are all pure functions of their logical keys. Two
//! submissions that would create the same record compute the same address
//! and the second one finds it occupied.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::crypto::hash::{domain_separated_hash, sha256_multi};

/// BLAKE3 context string for label-derived identities.
const LABEL_CONTEXT: &str = "pawn 2026-01-01 label identity";

/// Trailing marker mixed into every program-derived address.
const DERIVED_ADDRESS_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Address length in bytes.
pub const ADDRESS_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced when parsing an address.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The string is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded bytes have the wrong length.
    #[error("invalid address length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte identifier for an identity, asset, account, or record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address. Never produced by derivation in practice.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded address.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != ADDRESS_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_LENGTH,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Derives a stable identity from a human label.
    ///
    /// Used by clients and tests that want `@alice` to mean the same
    /// participant on every run.
    pub fn from_label(label: &str) -> Self {
        Self(domain_separated_hash(LABEL_CONTEXT, label.as_bytes()))
    }

    /// Derives a program-owned address from `seeds` under `program_id`.
    ///
    /// Each seed is prefixed with its length as a little-endian `u64`, so
    /// `["ab", "c"]` and `["a", "bc"]` derive different addresses.
    pub fn derive(program_id: &Address, seeds: &[&[u8]]) -> Self {
        let lengths: Vec<[u8; 8]> = seeds
            .iter()
            .map(|seed| (seed.len() as u64).to_le_bytes())
            .collect();

        let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len() * 2 + 2);
        for (seed, len) in seeds.iter().zip(lengths.iter()) {
            parts.push(len.as_slice());
            parts.push(seed);
        }
        parts.push(program_id.as_bytes());
        parts.push(DERIVED_ADDRESS_MARKER);

        Self(sha256_multi(&parts))
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}...)", self.short())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Serialized as a hex string so addresses work as JSON map keys.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
