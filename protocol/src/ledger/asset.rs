//! # Asset Registry Types
//!
//! Two kinds of asset live on the ledger: fungible settlement assets
//! (principal, interest, rent) and unique assets (one indivisible unit,
//! used as collateral). Asset ids are content-addressed from the symbol
//! and issuer, so registering the same asset twice is detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ASSET_ID_CONTEXT;
use crate::crypto::hash::domain_separated_hash;
use crate::identity::Address;

/// Asset ids share the address namespace.
pub type AssetId = Address;

/// Whether an asset is divisible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// Divisible, any supply.
    Fungible,
    /// Exactly one unit may ever exist; zero decimals.
    Unique,
}

impl AssetKind {
    fn tag(&self) -> u8 {
        match self {
            AssetKind::Fungible => 0x01,
            AssetKind::Unique => 0x02,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Fungible => write!(f, "Fungible"),
            AssetKind::Unique => write!(f, "Unique"),
        }
    }
}

impl std::str::FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fungible" => Ok(AssetKind::Fungible),
            "unique" => Ok(AssetKind::Unique),
            other => Err(format!("unknown asset kind '{}'", other)),
        }
    }
}

/// Registry entry for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Content-addressed id.
    pub id: AssetId,
    /// Ticker or collection symbol, upper-cased.
    pub symbol: String,
    /// Fungible or unique.
    pub kind: AssetKind,
    /// Decimal places; always zero for unique assets.
    pub decimals: u8,
    /// Identity that registered the asset.
    pub issuer: Address,
    /// Units minted so far.
    pub total_supply: u64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl AssetInfo {
    /// Derives the id for `(symbol, kind, issuer)`.
    ///
    /// The symbol is upper-cased first, so `"usdc"` and `"USDC"` from the
    /// same issuer are the same asset.
    pub fn derive_id(symbol: &str, kind: AssetKind, issuer: &Address) -> AssetId {
        let symbol = symbol.to_uppercase();
        let mut preimage = Vec::with_capacity(symbol.len() + 2 + 32);
        preimage.extend_from_slice(symbol.as_bytes());
        preimage.push(0x00);
        preimage.push(kind.tag());
        preimage.extend_from_slice(issuer.as_bytes());
        Address::from_bytes(domain_separated_hash(ASSET_ID_CONTEXT, &preimage))
    }
}
