//! # Loan State Machine
//!
//! ```text
//!   request ──▶ Requested ──underwrite/accept──▶ Active ──repay──▶ Repaid
//!                                                   │
//!                                                   └──seize──▶ Defaulted
//! ```
//!
//! A loan is created by [`request`], which takes the collateral into
//! custody. It becomes `Active` exactly once, either by direct funding
//! ([`underwrite`]) or by the borrower accepting an offer (see
//! [`crate::offer`]). From `Active` it reaches exactly one terminal state.
//! Closing releases the custody account, refunds the record's rent to the
//! borrower, and moves the record to the archive.
//!
//! ## Deadline
//!
//! `due_at = activated_at + term_duration_secs`. Repayment is accepted up
//! to and including `due_at`; seizure only strictly after it. Exactly one
//! of the two is possible at every instant.

use serde::{Deserialize, Serialize};

use pawn_protocol::config::LOAN_SEED;
use pawn_protocol::identity::Address;
use pawn_protocol::ledger::AssetId;

use crate::custody;
use crate::error::PawnError;
use crate::events::{ActivationPath, PawnEvent};
use crate::program::{Execution, ProgramState};
use crate::settlement::{self, Settlement};
use crate::terms::{self, LoanTerms};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle state of a pawn loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanState {
    /// Collateral in custody, waiting for funding.
    Requested,
    /// Funded; the deadline clock is running.
    Active,
    /// Repaid in time. Collateral returned to the borrower.
    Repaid,
    /// Seized after the deadline. Collateral went to the lender.
    Defaulted,
}

impl LoanState {
    /// `true` for `Repaid` and `Defaulted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanState::Repaid | LoanState::Defaulted)
    }
}

impl std::fmt::Display for LoanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoanState::Requested => write!(f, "Requested"),
            LoanState::Active => write!(f, "Active"),
            LoanState::Repaid => write!(f, "Repaid"),
            LoanState::Defaulted => write!(f, "Defaulted"),
        }
    }
}

/// One collateral deposit and the loan drawn against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PawnLoan {
    /// Derived from `(borrower, collateral_holding_account)`.
    pub id: Address,
    pub borrower: Address,
    pub collateral_asset: AssetId,
    pub collateral_holding_account: Address,
    /// What the borrower asked for. Cleared on activation.
    pub desired_terms: Option<LoanTerms>,
    /// What was actually funded. Write-once.
    pub active_terms: Option<LoanTerms>,
    /// Who funded it. Write-once.
    pub lender: Option<Address>,
    /// When it was funded. Write-once.
    pub activated_at: Option<i64>,
    pub state: LoanState,
    /// Program-wide request counter. Tells apart successive loans that
    /// reuse one address.
    pub request_seq: u64,
    pub requested_at: i64,
    /// Set when the loan reaches a terminal state.
    pub closed_at: Option<i64>,
}

impl PawnLoan {
    /// Record size used for rent: four addresses, two optional terms, an
    /// optional lender, three timestamps, the request sequence number, and
    /// the state tag.
    pub const SPACE: usize =
        32 * 4 + 2 * (1 + LoanTerms::SPACE) + (1 + 32) + (1 + 8) + 8 + (1 + 8) + 8 + 1;

    /// Deterministic loan address.
    pub fn address(program_id: &Address, borrower: &Address, holding_account: &Address) -> Address {
        Address::derive(
            program_id,
            &[LOAN_SEED, borrower.as_bytes(), holding_account.as_bytes()],
        )
    }

    /// Deadline for repayment. `None` until activation.
    pub fn due_at(&self) -> Option<i64> {
        let terms = self.active_terms?;
        let duration = i64::try_from(terms.term_duration_secs).ok()?;
        self.activated_at?.checked_add(duration)
    }

    /// Fails with [`PawnError::StaleState`] unless the loan is in `expected`.
    pub fn ensure_state(&self, expected: LoanState) -> Result<(), PawnError> {
        if self.state != expected {
            return Err(PawnError::StaleState {
                record: self.id,
                current: self.state.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(())
    }

    /// Transitions `Requested -> Active`, writing the activation fields.
    ///
    /// Activation fields are written here and nowhere else. Finding any of
    /// them already set is an invariant violation.
    pub(crate) fn activate(
        &mut self,
        terms: LoanTerms,
        lender: Address,
        now: i64,
    ) -> Result<(), PawnError> {
        self.ensure_state(LoanState::Requested)?;
        if self.active_terms.is_some() || self.lender.is_some() || self.activated_at.is_some() {
            return Err(PawnError::InvariantViolation(
                "activation fields already written",
            ));
        }
        self.active_terms = Some(terms);
        self.lender = Some(lender);
        self.activated_at = Some(now);
        self.desired_terms = None;
        self.state = LoanState::Active;
        Ok(())
    }

    fn close(&mut self, state: LoanState, now: i64) {
        self.state = state;
        self.closed_at = Some(now);
    }

    fn activated_event(&self, path: ActivationPath) -> Result<PawnEvent, PawnError> {
        match (self.active_terms, self.lender, self.activated_at, self.due_at()) {
            (Some(terms), Some(lender), Some(activated_at), Some(due_at)) => {
                Ok(PawnEvent::LoanActivated {
                    loan: self.id,
                    borrower: self.borrower,
                    lender,
                    terms,
                    activated_at,
                    due_at,
                    path,
                })
            }
            _ => Err(PawnError::InvariantViolation("activation fields missing")),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Takes `collateral_asset` into custody and opens a loan request.
pub(crate) fn request(
    ex: &mut Execution<'_>,
    borrower: Address,
    collateral_asset: AssetId,
    desired_terms: LoanTerms,
) -> Result<PawnLoan, PawnError> {
    desired_terms.validate_on(&ex.state.ledger)?;
    ex.ensure_participant(&borrower)?;

    let program_id = ex.config.program_id;
    let holding =
        custody::deposit(&mut ex.state.ledger, ex.oracle, &program_id, collateral_asset, borrower)?;
    let id = PawnLoan::address(&program_id, &borrower, &holding);

    let rent = ex
        .config
        .rent_for(PawnLoan::SPACE)
        .ok_or(PawnError::ArithmeticOverflow)?;
    ex.state.ledger.allocate(id, borrower, PawnLoan::SPACE, rent)?;

    let request_seq = ex.state.next_request_seq;
    ex.state.next_request_seq = request_seq
        .checked_add(1)
        .ok_or(PawnError::ArithmeticOverflow)?;

    let loan = PawnLoan {
        id,
        borrower,
        collateral_asset,
        collateral_holding_account: holding,
        desired_terms: Some(desired_terms),
        active_terms: None,
        lender: None,
        activated_at: None,
        state: LoanState::Requested,
        request_seq,
        requested_at: ex.now,
        closed_at: None,
    };
    ex.state.loans.insert(id, loan.clone());
    ex.emit(PawnEvent::LoanRequested {
        loan: id,
        borrower,
        collateral_asset,
        desired_terms,
        requested_at: ex.now,
    });
    Ok(loan)
}

/// Funds a requested loan directly at exactly the desired terms.
pub(crate) fn underwrite(
    ex: &mut Execution<'_>,
    loan_id: Address,
    lender: Address,
    offered_terms: LoanTerms,
) -> Result<PawnLoan, PawnError> {
    let mut loan = ex.state.loan_in(&loan_id, LoanState::Requested)?.clone();
    ex.ensure_participant(&lender)?;
    let desired = loan
        .desired_terms
        .ok_or(PawnError::InvariantViolation("requested loan without terms"))?;
    if !terms::matches(&desired, &offered_terms) {
        return Err(PawnError::TermsMismatch);
    }

    ex.state.ledger.transfer(
        offered_terms.settlement_asset,
        lender,
        loan.borrower,
        offered_terms.principal,
    )?;
    loan.activate(offered_terms, lender, ex.now)?;

    let event = loan.activated_event(ActivationPath::Underwritten)?;
    ex.state.loans.insert(loan_id, loan.clone());
    ex.emit(event);
    Ok(loan)
}

/// Repays an active loan and returns the collateral to the borrower.
pub(crate) fn repay(
    ex: &mut Execution<'_>,
    loan_id: Address,
    caller: Address,
) -> Result<Settlement, PawnError> {
    let mut loan = ex.state.loan_in(&loan_id, LoanState::Active)?.clone();
    if caller != loan.borrower {
        return Err(PawnError::Unauthorized {
            caller,
            required: loan.borrower,
        });
    }
    let due_at = loan
        .due_at()
        .ok_or(PawnError::InvariantViolation("active loan without deadline"))?;
    if ex.now > due_at {
        return Err(PawnError::Overdue {
            due_at,
            now: ex.now,
        });
    }

    let receipt = settlement::settle_repayment(
        &mut ex.state.ledger,
        &loan,
        ex.config.treasury,
        ex.config.protocol_fee_bps,
        ex.now,
    )?;
    loan.close(LoanState::Repaid, ex.now);
    ex.state.archive_loan(loan)?;

    ex.emit(PawnEvent::LoanRepaid {
        loan: loan_id,
        borrower: receipt.borrower,
        lender: receipt.lender,
        settlement_asset: receipt.settlement_asset,
        split: receipt.split,
        repaid_at: ex.now,
    });
    Ok(receipt)
}

/// Hands the collateral of an overdue loan to its lender.
pub(crate) fn seize(
    ex: &mut Execution<'_>,
    loan_id: Address,
    caller: Address,
) -> Result<PawnLoan, PawnError> {
    let mut loan = ex.state.loan_in(&loan_id, LoanState::Active)?.clone();
    let lender = loan
        .lender
        .ok_or(PawnError::InvariantViolation("active loan without lender"))?;
    if caller != lender {
        return Err(PawnError::Unauthorized {
            caller,
            required: lender,
        });
    }
    let due_at = loan
        .due_at()
        .ok_or(PawnError::InvariantViolation("active loan without deadline"))?;
    if ex.now <= due_at {
        return Err(PawnError::NotDue {
            due_at,
            now: ex.now,
        });
    }

    settlement::settle_default(&mut ex.state.ledger, &loan)?;
    loan.close(LoanState::Defaulted, ex.now);
    ex.state.archive_loan(loan.clone())?;

    ex.emit(PawnEvent::CollateralSeized {
        loan: loan_id,
        lender,
        collateral_asset: loan.collateral_asset,
        seized_at: ex.now,
    });
    Ok(loan)
}

/// Activates `loan` with the terms of an accepted offer. Shared with the
/// offer escrow so both activation paths go through one write.
pub(crate) fn activate_from_offer(
    state: &mut ProgramState,
    mut loan: PawnLoan,
    terms: LoanTerms,
    lender: Address,
    offer: Address,
    now: i64,
) -> Result<(PawnLoan, PawnEvent), PawnError> {
    loan.activate(terms, lender, now)?;
    let event = loan.activated_event(ActivationPath::OfferAccepted { offer })?;
    state.loans.insert(loan.id, loan.clone());
    Ok((loan, event))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
