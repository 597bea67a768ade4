//! # Loan Terms & Terms Matcher
//!
//! [`LoanTerms`] is the value both sides of a loan agree on. It is never
//! mutated once attached to a loan or an offer.
//!
//! [`matches`] is exact equality, field by field. There is no tolerance:
//! a candidate one basis point off, or quoted in a different settlement
//! asset, does not match.

use serde::{Deserialize, Serialize};

use pawn_protocol::ledger::{AssetId, AssetKind, Ledger};

use crate::error::PawnError;
use crate::settlement::compute_repayment;

/// Principal, settlement asset, rate, and duration of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Amount lent, in base units of `settlement_asset`.
    pub principal: u64,
    /// Fungible asset principal and interest are paid in.
    pub settlement_asset: AssetId,
    /// Interest over the whole term, in basis points of the principal.
    /// Owed in full whenever the loan is repaid.
    pub interest_rate_bps: u32,
    /// Seconds from activation to the due date.
    pub term_duration_secs: u64,
}

impl LoanTerms {
    /// Serialized size: principal + asset + rate + duration.
    pub const SPACE: usize = 8 + 32 + 4 + 8;

    /// Builds a set of terms.
    pub fn new(
        principal: u64,
        settlement_asset: AssetId,
        interest_rate_bps: u32,
        term_duration_secs: u64,
    ) -> Self {
        Self {
            principal,
            settlement_asset,
            interest_rate_bps,
            term_duration_secs,
        }
    }

    /// Shape checks that need no ledger access.
    ///
    /// # Errors
    ///
    /// [`PawnError::InvalidTerms`] for a zero principal, a zero duration, a
    /// duration that does not fit a timestamp, or an amount due that
    /// overflows `u64`.
    pub fn validate(&self) -> Result<(), PawnError> {
        if self.principal == 0 {
            return Err(PawnError::InvalidTerms("principal must be positive"));
        }
        if self.term_duration_secs == 0 {
            return Err(PawnError::InvalidTerms("term duration must be positive"));
        }
        if i64::try_from(self.term_duration_secs).is_err() {
            return Err(PawnError::InvalidTerms("term duration too long"));
        }
        let split = compute_repayment(self, 0)
            .map_err(|_| PawnError::InvalidTerms("amount due overflows"))?;
        if split.total_due().is_none() {
            return Err(PawnError::InvalidTerms("amount due overflows"));
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus: the settlement asset must be a
    /// registered fungible asset.
    pub fn validate_on(&self, ledger: &Ledger) -> Result<(), PawnError> {
        self.validate()?;
        match ledger.asset(&self.settlement_asset) {
            Some(info) if info.kind == AssetKind::Fungible => Ok(()),
            Some(_) => Err(PawnError::InvalidTerms("settlement asset must be fungible")),
            None => Err(PawnError::InvalidTerms("settlement asset is not registered")),
        }
    }
}

/// `true` iff `candidate` is exactly `desired`.
pub fn matches(desired: &LoanTerms, candidate: &LoanTerms) -> bool {
    // Destructured so a new field cannot be added without deciding here.
    let LoanTerms {
        principal,
        settlement_asset,
        interest_rate_bps,
        term_duration_secs,
    } = desired;

    *principal == candidate.principal
        && *settlement_asset == candidate.settlement_asset
        && *interest_rate_bps == candidate.interest_rate_bps
        && *term_duration_secs == candidate.term_duration_secs
}
