//! # Program Errors
//!
//! One error type for every operation the program exposes. Each variant is
//! detected before anything is committed, so receiving an error always
//! means the program state is exactly what it was before the call.

use pawn_protocol::identity::Address;
use pawn_protocol::ledger::{AssetId, LedgerError};
use thiserror::Error;

/// Errors returned by PAWN program operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PawnError {
    /// Malformed terms: zero principal, zero duration, an unusable
    /// settlement asset, or a repayment that cannot be represented.
    #[error("invalid terms: {0}")]
    InvalidTerms(&'static str),

    /// The authenticity oracle rejected the collateral.
    #[error("asset {0} is not a verified unique asset")]
    InvalidAsset(AssetId),

    /// The depositing account does not hold the collateral unit.
    #[error("asset {asset} is not held by {owner}")]
    AlreadyInCustody {
        /// The collateral asset.
        asset: AssetId,
        /// The account that was expected to hold it.
        owner: Address,
    },

    /// The custody account is already empty.
    #[error("custody account {account} does not hold {asset}")]
    NotInCustody {
        /// The custody account.
        account: Address,
        /// The asset expected inside it.
        asset: AssetId,
    },

    /// Proposed terms differ from the terms they must match exactly.
    #[error("terms mismatch")]
    TermsMismatch,

    /// A fungible transfer cannot be covered.
    #[error("insufficient funds at {owner}: available {available}, requested {requested} (asset {asset})")]
    InsufficientFunds {
        /// Account being debited.
        owner: Address,
        /// Asset being debited.
        asset: AssetId,
        /// Current balance.
        available: u64,
        /// Requested amount.
        requested: u64,
    },

    /// The record is no longer in the state the operation requires.
    #[error("stale state: {record} is {current}, expected {expected}")]
    StaleState {
        /// The loan whose state was checked.
        record: Address,
        /// Its current state.
        current: String,
        /// The state the operation needs.
        expected: String,
    },

    /// Seizure attempted at or before the due date.
    #[error("loan not due: due at {due_at}, now {now}")]
    NotDue {
        /// Due timestamp.
        due_at: i64,
        /// Submission timestamp.
        now: i64,
    },

    /// Repayment attempted after the due date.
    #[error("loan overdue: due at {due_at}, now {now}")]
    Overdue {
        /// Due timestamp.
        due_at: i64,
        /// Submission timestamp.
        now: i64,
    },

    /// The caller is not the borrower or lender the operation requires.
    #[error("unauthorized: {caller} is not {required}")]
    Unauthorized {
        /// Who submitted the operation.
        caller: Address,
        /// Who is allowed to.
        required: Address,
    },

    /// No loan record at this address.
    #[error("loan not found: {0}")]
    LoanNotFound(Address),

    /// No open offer at this address.
    #[error("offer not found: {0}")]
    OfferNotFound(Address),

    /// The offer was made against a different loan, or against an earlier
    /// request that lived at the same loan address.
    #[error("offer {offer} was made on {offer_loan} (request #{offer_seq}), not {loan} (request #{loan_seq})")]
    OfferLoanMismatch {
        /// The offer.
        offer: Address,
        /// The loan the offer references.
        offer_loan: Address,
        /// Request sequence number the offer was made against.
        offer_seq: u64,
        /// The loan named by the caller.
        loan: Address,
        /// Request sequence number of that loan.
        loan_seq: u64,
    },

    /// The address belongs to the program (a custody account, an offer
    /// escrow, a live record, or the treasury) and cannot act as a
    /// participant.
    #[error("{0} is a program-owned account")]
    ProgramAccount(Address),

    /// The clock reads earlier than the last committed operation.
    #[error("clock regression: now {now}, last commit at {last_committed_at}")]
    ClockRegression {
        /// Submission timestamp.
        now: i64,
        /// Timestamp of the latest committed operation.
        last_committed_at: i64,
    },

    /// A record already occupies the derived address.
    #[error("record already exists at {0}")]
    RecordExists(Address),

    /// Checked arithmetic failed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// A protocol invariant would be broken. Indicates a bug, not bad input.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),

    /// Any other ledger failure.
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for PawnError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                owner,
                asset,
                available,
                requested,
            } => PawnError::InsufficientFunds {
                owner,
                asset,
                available,
                requested,
            },
            LedgerError::AccountInUse(address) => PawnError::RecordExists(address),
            other => PawnError::Ledger(other),
        }
    }
}
