//! # Settlement Engine
//!
//! Computes what a borrower owes and performs the terminal fund and
//! collateral movements for a loan.
//!
//! ## Repayment Math
//!
//! ```text
//! interest          = floor(principal * interest_rate_bps / 10_000)
//! fee_to_protocol   = floor(interest * protocol_fee_bps / 10_000)
//! to_lender         = principal + interest - fee_to_protocol
//! total_due         = principal + interest
//! ```
//!
//! Interest is a lump sum for the whole term. Repaying on the first day
//! costs the same as repaying on the last.

use serde::{Deserialize, Serialize};

use pawn_protocol::config::BPS_DENOMINATOR;
use pawn_protocol::identity::Address;
use pawn_protocol::ledger::{AssetId, Ledger};

use crate::custody;
use crate::error::PawnError;
use crate::loan::PawnLoan;
use crate::terms::LoanTerms;

// ---------------------------------------------------------------------------
// Repayment Split
// ---------------------------------------------------------------------------

/// How a repayment is divided between lender and treasury.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentSplit {
    /// Principal returned to the lender.
    pub principal_to_lender: u64,
    /// Interest credited to the lender, net of the protocol fee.
    pub interest_to_lender: u64,
    /// Protocol's share of the interest.
    pub fee_to_protocol: u64,
}

impl RepaymentSplit {
    /// Gross interest.
    pub fn interest(&self) -> u64 {
        // fee <= interest by construction, so the sum is the original interest.
        self.interest_to_lender + self.fee_to_protocol
    }

    /// Everything the lender receives.
    pub fn to_lender(&self) -> Option<u64> {
        self.principal_to_lender.checked_add(self.interest_to_lender)
    }

    /// Everything the borrower pays. `None` if it does not fit a `u64`.
    pub fn total_due(&self) -> Option<u64> {
        self.principal_to_lender.checked_add(self.interest())
    }
}

fn bps_of(amount: u64, bps: u32) -> Result<u64, PawnError> {
    let scaled = (amount as u128) * (bps as u128) / (BPS_DENOMINATOR as u128);
    u64::try_from(scaled).map_err(|_| PawnError::ArithmeticOverflow)
}

/// Splits the repayment of `terms` under a protocol fee of `protocol_fee_bps`.
///
/// # Errors
///
/// [`PawnError::ArithmeticOverflow`] if the interest exceeds `u64`.
pub fn compute_repayment(
    terms: &LoanTerms,
    protocol_fee_bps: u32,
) -> Result<RepaymentSplit, PawnError> {
    let interest = bps_of(terms.principal, terms.interest_rate_bps)?;
    let fee = bps_of(interest, protocol_fee_bps)?;
    let interest_to_lender = interest
        .checked_sub(fee)
        .ok_or(PawnError::ArithmeticOverflow)?;

    Ok(RepaymentSplit {
        principal_to_lender: terms.principal,
        interest_to_lender,
        fee_to_protocol: fee,
    })
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Receipt for a completed repayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// The repaid loan.
    pub loan: Address,
    /// Borrower who paid.
    pub borrower: Address,
    /// Lender who was paid.
    pub lender: Address,
    /// Asset the repayment moved in.
    pub settlement_asset: AssetId,
    /// How the payment was divided.
    pub split: RepaymentSplit,
    /// Timestamp of settlement.
    pub settled_at: i64,
}

/// What an active loan costs to close right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentQuote {
    pub loan: Address,
    pub settlement_asset: AssetId,
    pub split: RepaymentSplit,
    pub total_due: u64,
    /// Last second at which repayment is accepted.
    pub due_at: i64,
}

// ---------------------------------------------------------------------------
// Terminal Movements
// ---------------------------------------------------------------------------

/// Pays the lender and treasury from the borrower and returns the
/// collateral to the borrower.
///
/// The caller has already checked state, authority, and deadline. This
/// checks funds up front so the reported shortfall is the full amount due
/// rather than whichever leg happened to fail.
pub(crate) fn settle_repayment(
    ledger: &mut Ledger,
    loan: &PawnLoan,
    treasury: Address,
    protocol_fee_bps: u32,
    now: i64,
) -> Result<Settlement, PawnError> {
    let (terms, lender) = match (loan.active_terms, loan.lender) {
        (Some(terms), Some(lender)) => (terms, lender),
        _ => return Err(PawnError::InvariantViolation("active loan without terms")),
    };

    let split = compute_repayment(&terms, protocol_fee_bps)?;
    let total = split.total_due().ok_or(PawnError::ArithmeticOverflow)?;
    let to_lender = split.to_lender().ok_or(PawnError::ArithmeticOverflow)?;

    let available = ledger.balance_of(&loan.borrower, &terms.settlement_asset);
    if available < total {
        return Err(PawnError::InsufficientFunds {
            owner: loan.borrower,
            asset: terms.settlement_asset,
            available,
            requested: total,
        });
    }

    ledger.transfer(terms.settlement_asset, loan.borrower, lender, to_lender)?;
    ledger.transfer(
        terms.settlement_asset,
        loan.borrower,
        treasury,
        split.fee_to_protocol,
    )?;
    custody::release(
        ledger,
        loan.collateral_holding_account,
        loan.collateral_asset,
        loan.borrower,
    )?;

    Ok(Settlement {
        loan: loan.id,
        borrower: loan.borrower,
        lender,
        settlement_asset: terms.settlement_asset,
        split,
        settled_at: now,
    })
}

/// Hands the collateral to the lender. No funds move.
pub(crate) fn settle_default(ledger: &mut Ledger, loan: &PawnLoan) -> Result<Address, PawnError> {
    let lender = loan
        .lender
        .ok_or(PawnError::InvariantViolation("active loan without lender"))?;
    custody::release(
        ledger,
        loan.collateral_holding_account,
        loan.collateral_asset,
        lender,
    )?;
    Ok(lender)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
