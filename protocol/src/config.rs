//! # Protocol Configuration & Constants
//!
//! Every magic number in PAWN lives here: the basis-point denominator, the
//! default protocol fee, the rent model for record allocation, and the seed
//! tags that feed address derivation.
//!
//! Constants are fixed at compile time. The handful of values a deployment
//! chooses (program id, fee, treasury, rent price) are grouped into
//! [`ProtocolConfig`], which the node loads from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::identity::Address;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Basis points in one whole. 500 bps = 5.00%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default share of the interest kept by the protocol, in basis points of
/// the interest (not of the principal). 1_000 bps = 10% of the interest.
pub const DEFAULT_PROTOCOL_FEE_BPS: u32 = 1_000;

/// Upper bound for the protocol fee. A fee above 100% of the interest
/// would eat into the lender's principal.
pub const MAX_PROTOCOL_FEE_BPS: u32 = 10_000;

// ---------------------------------------------------------------------------
// Native Asset
// ---------------------------------------------------------------------------

/// Symbol of the native asset used to pay record rent.
pub const NATIVE_ASSET_SYMBOL: &str = "PAWN";

/// Decimal places of the native asset.
pub const NATIVE_ASSET_DECIMALS: u8 = 9;

// ---------------------------------------------------------------------------
// Rent
// ---------------------------------------------------------------------------

/// Fixed per-record overhead charged on top of the record's own size.
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

/// Default rent price, in native base units per byte of record space.
pub const DEFAULT_RENT_PER_BYTE: u64 = 6_960;

// ---------------------------------------------------------------------------
// Derivation Seeds
// ---------------------------------------------------------------------------

/// Seed tag for loan records: `[LOAN_SEED, borrower, holding_account]`.
pub const LOAN_SEED: &[u8] = b"pawn_loan";

/// Seed tag for collateral custody accounts: `[CUSTODY_SEED, borrower, asset]`.
pub const CUSTODY_SEED: &[u8] = b"custody";

/// Seed tag for offer records: `[OFFER_SEED, loan, lender]`.
pub const OFFER_SEED: &[u8] = b"offer";

/// Seed tag for offer escrow accounts: `[ESCROW_SEED, offer]`.
pub const ESCROW_SEED: &[u8] = b"escrow";

/// Seed tag for the fee treasury: `[TREASURY_SEED]`.
pub const TREASURY_SEED: &[u8] = b"treasury";

/// BLAKE3 context string for asset ids.
pub const ASSET_ID_CONTEXT: &str = "pawn 2026-01-01 asset id";

/// Label the default program id is derived from.
pub const DEFAULT_PROGRAM_LABEL: &str = "pawn-program";

// ---------------------------------------------------------------------------
// ProtocolConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`ProtocolConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured fee exceeds [`MAX_PROTOCOL_FEE_BPS`].
    #[error("protocol fee {fee_bps} bps exceeds the maximum of {max_bps} bps")]
    FeeTooHigh {
        /// Configured fee.
        fee_bps: u32,
        /// Allowed maximum.
        max_bps: u32,
    },

    /// The rent price must be non-zero or records would be free to squat.
    #[error("rent_per_byte must be greater than zero")]
    ZeroRent,
}

/// Deployment-time parameters of a PAWN program instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Address every record and custody account is derived under.
    pub program_id: Address,
    /// Share of the interest paid to the treasury, in basis points.
    pub protocol_fee_bps: u32,
    /// Recipient of protocol fees.
    pub treasury: Address,
    /// Rent price per byte of record space, in native base units.
    pub rent_per_byte: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let program_id = Address::from_label(DEFAULT_PROGRAM_LABEL);
        Self {
            treasury: treasury_address(&program_id),
            program_id,
            protocol_fee_bps: DEFAULT_PROTOCOL_FEE_BPS,
            rent_per_byte: DEFAULT_RENT_PER_BYTE,
        }
    }
}

impl ProtocolConfig {
    /// Checks the configured values against protocol bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_fee_bps > MAX_PROTOCOL_FEE_BPS {
            return Err(ConfigError::FeeTooHigh {
                fee_bps: self.protocol_fee_bps,
                max_bps: MAX_PROTOCOL_FEE_BPS,
            });
        }
        if self.rent_per_byte == 0 {
            return Err(ConfigError::ZeroRent);
        }
        Ok(())
    }

    /// Reads and validates a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ProtocolConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the config as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Rent deposit for a record of `space` bytes.
    ///
    /// Returns `None` on overflow.
    pub fn rent_for(&self, space: usize) -> Option<u64> {
        (space as u64)
            .checked_add(ACCOUNT_STORAGE_OVERHEAD)?
            .checked_mul(self.rent_per_byte)
    }
}

/// The fee treasury derived under `program_id`.
pub fn treasury_address(program_id: &Address) -> Address {
    Address::derive(program_id, &[TREASURY_SEED])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ProtocolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.treasury, treasury_address(&config.program_id));
    }

    #[test]
    fn fee_above_maximum_rejected() {
        let config = ProtocolConfig {
            protocol_fee_bps: MAX_PROTOCOL_FEE_BPS + 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FeeTooHigh { fee_bps: 10_001, .. })
        ));
    }

    #[test]
    fn zero_rent_rejected() {
        let config = ProtocolConfig {
            rent_per_byte: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRent)));
    }

    #[test]
    fn rent_includes_overhead() {
        let config = ProtocolConfig {
            rent_per_byte: 10,
            ..Default::default()
        };
        assert_eq!(config.rent_for(0), Some(ACCOUNT_STORAGE_OVERHEAD * 10));
        assert_eq!(config.rent_for(72), Some((72 + ACCOUNT_STORAGE_OVERHEAD) * 10));
    }

    #[test]
    fn rent_overflow_is_none() {
        let config = ProtocolConfig {
            rent_per_byte: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.rent_for(1), None);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ProtocolConfig {
            protocol_fee_bps: 250,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = ProtocolConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_rejects_invalid_fee() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ProtocolConfig {
            protocol_fee_bps: 20_000,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert!(ProtocolConfig::load(&path).is_err());
    }

    #[test]
    fn seed_tags_are_distinct() {
        let tags = [LOAN_SEED, CUSTODY_SEED, OFFER_SEED, ESCROW_SEED, TREASURY_SEED];
        for (i, a) in tags.iter().enumerate() {
            for b in tags.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
