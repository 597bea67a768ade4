//! # Authenticity Oracles
//!
//! Before the custody vault accepts a collateral deposit it asks an
//! [`AuthenticityOracle`] whether the asset is a genuine, unique item.
//! Metadata provenance is outside the protocol; the oracle is the single
//! point where that judgement enters.
//!
//! Two oracles ship with the library:
//!
//! - [`SupplyOracle`]: accepts any registered unique asset whose supply is
//!   exactly one unit. Enough for local networks and tests.
//! - [`AllowListOracle`]: accepts only assets an operator has explicitly
//!   verified, and still insists they are unique on the ledger.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::ledger::{AssetId, AssetKind, Ledger};

/// Answers whether an asset may be taken into custody as collateral.
pub trait AuthenticityOracle: Send + Sync {
    /// `true` if `asset` is a verified, unique, authentic item.
    fn is_unique_authentic(&self, ledger: &Ledger, asset: &AssetId) -> bool;
}

fn is_single_unit(ledger: &Ledger, asset: &AssetId) -> bool {
    ledger
        .asset(asset)
        .map(|info| info.kind == AssetKind::Unique && info.decimals == 0 && info.total_supply == 1)
        .unwrap_or(false)
}

/// Accepts registered unique assets with a supply of exactly one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SupplyOracle;

impl AuthenticityOracle for SupplyOracle {
    fn is_unique_authentic(&self, ledger: &Ledger, asset: &AssetId) -> bool {
        is_single_unit(ledger, asset)
    }
}

/// Accepts only explicitly verified unique assets.
#[derive(Debug, Default)]
pub struct AllowListOracle {
    verified: RwLock<HashSet<AssetId>>,
}

impl AllowListOracle {
    /// Creates an oracle with nothing verified.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `asset` as verified.
    pub fn verify(&self, asset: AssetId) {
        self.verified.write().insert(asset);
    }

    /// Withdraws verification. Assets already in custody are unaffected.
    pub fn revoke(&self, asset: &AssetId) -> bool {
        self.verified.write().remove(asset)
    }
}

impl AuthenticityOracle for AllowListOracle {
    fn is_unique_authentic(&self, ledger: &Ledger, asset: &AssetId) -> bool {
        self.verified.read().contains(asset) && is_single_unit(ledger, asset)
    }
}
