//! # Balance Sheets
//!
//! A [`BalanceSheet`] is the complete set of asset balances held at one
//! address. It enforces the two rules money needs: you can never spend
//! more than you have, and a credit never wraps around `u64::MAX`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::asset::AssetId;

/// Outcome of a rejected balance operation. The ledger attaches the owner
/// address before surfacing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceFault {
    /// Debit larger than the current balance.
    Insufficient {
        /// Current balance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },
    /// Credit would exceed `u64::MAX`.
    Overflow {
        /// Current balance.
        current: u64,
        /// Amount credited.
        credit: u64,
    },
}

/// Per-address asset balances.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    balances: HashMap<AssetId, u64>,
}

impl BalanceSheet {
    /// Creates an empty balance sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `asset`, zero if never credited.
    pub fn get(&self, asset: &AssetId) -> u64 {
        self.balances.get(asset).copied().unwrap_or(0)
    }

    /// Returns the balance `credit` would produce, without applying it.
    pub fn check_credit(&self, asset: &AssetId, amount: u64) -> Result<u64, BalanceFault> {
        let current = self.get(asset);
        current.checked_add(amount).ok_or(BalanceFault::Overflow {
            current,
            credit: amount,
        })
    }

    /// Returns the balance `debit` would leave, without applying it.
    pub fn check_debit(&self, asset: &AssetId, amount: u64) -> Result<u64, BalanceFault> {
        let available = self.get(asset);
        available
            .checked_sub(amount)
            .ok_or(BalanceFault::Insufficient {
                available,
                requested: amount,
            })
    }

    /// Adds `amount` of `asset`. Returns the new balance.
    pub fn credit(&mut self, asset: AssetId, amount: u64) -> Result<u64, BalanceFault> {
        let new_amount = self.check_credit(&asset, amount)?;
        self.balances.insert(asset, new_amount);
        Ok(new_amount)
    }

    /// Removes `amount` of `asset`. Returns the remaining balance.
    ///
    /// Entries that reach zero are dropped so empty custody accounts leave
    /// nothing behind.
    pub fn debit(&mut self, asset: AssetId, amount: u64) -> Result<u64, BalanceFault> {
        let remaining = self.check_debit(&asset, amount)?;
        if remaining == 0 {
            self.balances.remove(&asset);
        } else {
            self.balances.insert(asset, remaining);
        }
        Ok(remaining)
    }

    /// All non-zero balances.
    pub fn all_balances(&self) -> Vec<(AssetId, u64)> {
        let mut out: Vec<(AssetId, u64)> = self
            .balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(id, amount)| (*id, *amount))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// `true` if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.balances.values().all(|amount| *amount == 0)
    }
}
