//! # Ledger
//!
//! The ledger the lending program runs on: an asset registry, per-address
//! balance sheets, and record allocations. It plays three of the external
//! collaborator roles at once:
//!
//! - **Fungible transfer service**: [`Ledger::transfer`] moves an amount
//!   or fails with [`LedgerError::InsufficientBalance`].
//! - **Unique asset custody**: the same `transfer` moves the single unit
//!   of a unique asset; [`Ledger::holder_of`] answers who has it.
//! - **Allocation service**: [`Ledger::allocate`] reserves a record
//!   address against a refundable rent deposit in the native asset, and
//!   [`Ledger::deallocate`] releases it.
//!
//! The ledger has no notion of signers. Whoever holds `&mut Ledger` can
//! move anything, so the program keeps its ledger private and only its own
//! operations ever mutate it.
//!
//! Every mutating method validates all of its effects before applying any
//! of them: a failed call leaves the ledger untouched.

pub mod asset;
pub mod balance;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{NATIVE_ASSET_DECIMALS, NATIVE_ASSET_SYMBOL};
use crate::identity::Address;

pub use asset::{AssetId, AssetInfo, AssetKind};
pub use balance::{BalanceFault, BalanceSheet};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The source account cannot cover the debit.
    #[error("insufficient balance at {owner}: available {available}, requested {requested} (asset {asset})")]
    InsufficientBalance {
        /// Account being debited.
        owner: Address,
        /// Asset being debited.
        asset: AssetId,
        /// Current balance.
        available: u64,
        /// Requested amount.
        requested: u64,
    },

    /// A credit would overflow `u64`.
    #[error("balance overflow at {owner}: current {current}, credit {credit} (asset {asset})")]
    Overflow {
        /// Account being credited.
        owner: Address,
        /// Asset being credited.
        asset: AssetId,
        /// Current balance.
        current: u64,
        /// Amount credited.
        credit: u64,
    },

    /// The asset was never registered.
    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),

    /// An asset with the same id is already registered.
    #[error("asset already registered: {0}")]
    DuplicateAsset(AssetId),

    /// Unique assets are minted once, as a single unit.
    #[error("unique asset {asset} can only be minted once as a single unit")]
    UniqueSupplyExceeded {
        /// The unique asset.
        asset: AssetId,
    },

    /// Unique assets have zero decimals.
    #[error("unique assets must have zero decimals, got {0}")]
    InvalidDecimals(u8),

    /// The record address is already allocated.
    #[error("account already in use: {0}")]
    AccountInUse(Address),

    /// The record address has no allocation.
    #[error("account not allocated: {0}")]
    NotAllocated(Address),
}

impl LedgerError {
    fn from_fault(fault: BalanceFault, owner: Address, asset: AssetId) -> Self {
        match fault {
            BalanceFault::Insufficient {
                available,
                requested,
            } => LedgerError::InsufficientBalance {
                owner,
                asset,
                available,
                requested,
            },
            BalanceFault::Overflow { current, credit } => LedgerError::Overflow {
                owner,
                asset,
                current,
                credit,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// A record address reserved against a rent deposit.
///
/// The deposit sits at the record address itself, in the native asset,
/// until [`Ledger::deallocate`] sends it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Who paid the deposit.
    pub payer: Address,
    /// Record size in bytes.
    pub space: usize,
    /// Deposit held, in native base units.
    pub deposit: u64,
    /// When the record was allocated.
    pub allocated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// In-memory ledger state. Cloneable so callers can stage a batch of
/// operations on a copy and keep or discard it as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    native_asset: AssetId,
    assets: HashMap<AssetId, AssetInfo>,
    accounts: HashMap<Address, BalanceSheet>,
    allocations: HashMap<Address, Allocation>,
}

impl Ledger {
    /// Creates a ledger with the native asset registered and nothing minted.
    pub fn new() -> Self {
        let native_asset =
            AssetInfo::derive_id(NATIVE_ASSET_SYMBOL, AssetKind::Fungible, &Address::ZERO);
        let native = AssetInfo {
            id: native_asset,
            symbol: NATIVE_ASSET_SYMBOL.to_string(),
            kind: AssetKind::Fungible,
            decimals: NATIVE_ASSET_DECIMALS,
            issuer: Address::ZERO,
            total_supply: 0,
            created_at: Utc::now(),
        };

        let mut assets = HashMap::new();
        assets.insert(native_asset, native);

        Self {
            native_asset,
            assets,
            accounts: HashMap::new(),
            allocations: HashMap::new(),
        }
    }

    /// The asset rent deposits are paid in.
    pub fn native_asset(&self) -> AssetId {
        self.native_asset
    }

    // -- Asset registry -----------------------------------------------------

    /// Registers a new asset and returns its id.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateAsset`] if `(symbol, kind, issuer)` is taken.
    /// [`LedgerError::InvalidDecimals`] for a unique asset with decimals.
    pub fn register_asset(
        &mut self,
        symbol: &str,
        kind: AssetKind,
        decimals: u8,
        issuer: Address,
    ) -> Result<AssetId, LedgerError> {
        if kind == AssetKind::Unique && decimals != 0 {
            return Err(LedgerError::InvalidDecimals(decimals));
        }

        let id = AssetInfo::derive_id(symbol, kind, &issuer);
        if self.assets.contains_key(&id) {
            return Err(LedgerError::DuplicateAsset(id));
        }

        self.assets.insert(
            id,
            AssetInfo {
                id,
                symbol: symbol.to_uppercase(),
                kind,
                decimals,
                issuer,
                total_supply: 0,
                created_at: Utc::now(),
            },
        );

        tracing::debug!(asset = %id, symbol, %kind, "asset registered");
        Ok(id)
    }

    /// Registry entry for `asset`.
    pub fn asset(&self, asset: &AssetId) -> Option<&AssetInfo> {
        self.assets.get(asset)
    }

    /// Registered assets whose symbol matches `symbol`, ignoring case.
    pub fn assets_by_symbol(&self, symbol: &str) -> Vec<&AssetInfo> {
        let mut found: Vec<&AssetInfo> = self
            .assets
            .values()
            .filter(|info| info.symbol.eq_ignore_ascii_case(symbol))
            .collect();
        found.sort_by_key(|info| info.id);
        found
    }

    /// Total minted supply, zero for unknown assets.
    pub fn total_supply(&self, asset: &AssetId) -> u64 {
        self.assets.get(asset).map(|a| a.total_supply).unwrap_or(0)
    }

    /// Mints `amount` of `asset` to `to`. Returns the recipient's new balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownAsset`], [`LedgerError::UniqueSupplyExceeded`]
    /// (unique assets mint exactly one unit, once), or
    /// [`LedgerError::Overflow`].
    pub fn mint(&mut self, asset: AssetId, to: Address, amount: u64) -> Result<u64, LedgerError> {
        let info = self
            .assets
            .get(&asset)
            .ok_or(LedgerError::UnknownAsset(asset))?;

        if info.kind == AssetKind::Unique && (info.total_supply != 0 || amount != 1) {
            return Err(LedgerError::UniqueSupplyExceeded { asset });
        }

        let new_supply = info
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                owner: to,
                asset,
                current: info.total_supply,
                credit: amount,
            })?;

        let new_balance = self
            .accounts
            .get(&to)
            .map(|sheet| sheet.check_credit(&asset, amount))
            .unwrap_or(Ok(amount))
            .map_err(|fault| LedgerError::from_fault(fault, to, asset))?;

        // Both checks passed; apply.
        if let Some(info) = self.assets.get_mut(&asset) {
            info.total_supply = new_supply;
        }
        self.accounts
            .entry(to)
            .or_default()
            .credit(asset, amount)
            .map_err(|fault| LedgerError::from_fault(fault, to, asset))?;

        Ok(new_balance)
    }

    // -- Balances -----------------------------------------------------------

    /// Balance of `asset` held at `owner`.
    pub fn balance_of(&self, owner: &Address, asset: &AssetId) -> u64 {
        self.accounts
            .get(owner)
            .map(|sheet| sheet.get(asset))
            .unwrap_or(0)
    }

    /// All non-zero balances at `owner`.
    pub fn balances(&self, owner: &Address) -> Vec<(AssetId, u64)> {
        self.accounts
            .get(owner)
            .map(|sheet| sheet.all_balances())
            .unwrap_or_default()
    }

    /// Current holder of a unique asset, if it has been minted.
    pub fn holder_of(&self, asset: &AssetId) -> Option<Address> {
        self.accounts
            .iter()
            .find(|(_, sheet)| sheet.get(asset) > 0)
            .map(|(owner, _)| *owner)
    }

    /// Moves `amount` of `asset` from `from` to `to`.
    ///
    /// A zero amount is a no-op. Nothing moves unless both the debit and
    /// the credit are valid.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownAsset`], [`LedgerError::InsufficientBalance`],
    /// or [`LedgerError::Overflow`].
    pub fn transfer(
        &mut self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if !self.assets.contains_key(&asset) {
            return Err(LedgerError::UnknownAsset(asset));
        }
        if amount == 0 {
            return Ok(());
        }

        let source = self.accounts.get(&from).cloned().unwrap_or_default();
        source
            .check_debit(&asset, amount)
            .map_err(|fault| LedgerError::from_fault(fault, from, asset))?;

        if from == to {
            return Ok(());
        }

        if let Some(dest) = self.accounts.get(&to) {
            dest.check_credit(&asset, amount)
                .map_err(|fault| LedgerError::from_fault(fault, to, asset))?;
        }

        self.accounts
            .entry(from)
            .or_default()
            .debit(asset, amount)
            .map_err(|fault| LedgerError::from_fault(fault, from, asset))?;
        self.accounts
            .entry(to)
            .or_default()
            .credit(asset, amount)
            .map_err(|fault| LedgerError::from_fault(fault, to, asset))?;

        Ok(())
    }

    // -- Allocation ---------------------------------------------------------

    /// Reserves `address` for a record of `space` bytes, moving `deposit`
    /// native units from `payer` to the record address.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountInUse`] if already allocated, or
    /// [`LedgerError::InsufficientBalance`] if `payer` cannot cover the
    /// deposit.
    pub fn allocate(
        &mut self,
        address: Address,
        payer: Address,
        space: usize,
        deposit: u64,
    ) -> Result<(), LedgerError> {
        if self.allocations.contains_key(&address) {
            return Err(LedgerError::AccountInUse(address));
        }

        self.transfer(self.native_asset, payer, address, deposit)?;
        self.allocations.insert(
            address,
            Allocation {
                payer,
                space,
                deposit,
                allocated_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Releases the allocation at `address`, refunding its deposit to
    /// `refund_to`. Returns the refunded amount.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotAllocated`] if nothing is allocated there.
    pub fn deallocate(&mut self, address: Address, refund_to: Address) -> Result<u64, LedgerError> {
        let allocation = self
            .allocations
            .get(&address)
            .ok_or(LedgerError::NotAllocated(address))?;
        let deposit = allocation.deposit;

        self.transfer(self.native_asset, address, refund_to, deposit)?;
        self.allocations.remove(&address);
        Ok(deposit)
    }

    /// `true` if a record is allocated at `address`.
    pub fn is_allocated(&self, address: &Address) -> bool {
        self.allocations.contains_key(address)
    }

    /// Allocation details for `address`.
    pub fn allocation(&self, address: &Address) -> Option<&Allocation> {
        self.allocations.get(address)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
