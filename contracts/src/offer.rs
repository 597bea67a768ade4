//! # Offer Escrow
//!
//! Lenders compete for a requested loan by opening offers. Each offer
//! locks its principal in an escrow account derived from the offer
//! address, so the borrower can accept it without the lender being
//! online.
//!
//! An offer is `Open` until it is accepted or cancelled; either way the
//! principal leaves the escrow and the record is destroyed. Several lenders
//! may hold open offers on the same loan. Accepting one does not touch the
//! others: their lenders cancel them to recover the principal.
//!
//! A closed loan's address is reused when the borrower pawns the same asset
//! again. Offers remember the request sequence number they were made
//! against, so an offer left over from an earlier request can be cancelled
//! but never accepted.

use serde::{Deserialize, Serialize};

use pawn_protocol::config::{ESCROW_SEED, OFFER_SEED};
use pawn_protocol::identity::Address;

use crate::error::PawnError;
use crate::events::PawnEvent;
use crate::loan::{self, LoanState, PawnLoan};
use crate::program::Execution;
use crate::terms::{self, LoanTerms};

/// Lifecycle state of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferState {
    /// Escrow funded, waiting for the borrower.
    Open,
    /// Accepted or cancelled. The record no longer exists.
    Consumed,
}

impl std::fmt::Display for OfferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferState::Open => write!(f, "Open"),
            OfferState::Consumed => write!(f, "Consumed"),
        }
    }
}

/// A lender's standing offer to fund a loan at specific terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Derived from `(loan, loan_request_seq, lender)`.
    pub id: Address,
    /// The loan this offer funds.
    pub loan: Address,
    /// Request the offer was made against. A later loan at the same
    /// address cannot accept it.
    pub loan_request_seq: u64,
    pub lender: Address,
    /// Exactly what activation will write into the loan.
    pub terms: LoanTerms,
    /// Holds `terms.principal` while the offer is open.
    pub escrow_account: Address,
    pub state: OfferState,
    pub opened_at: i64,
}

impl Offer {
    /// Record size used for rent.
    pub const SPACE: usize = 32 * 4 + 8 + LoanTerms::SPACE + 1 + 8;

    /// Deterministic offer address. One per lender and loan request at a
    /// time.
    pub fn address(
        program_id: &Address,
        loan: &Address,
        loan_request_seq: u64,
        lender: &Address,
    ) -> Address {
        Address::derive(
            program_id,
            &[
                OFFER_SEED,
                loan.as_bytes(),
                &loan_request_seq.to_le_bytes(),
                lender.as_bytes(),
            ],
        )
    }

    /// Escrow account owned by the offer at `offer`.
    pub fn escrow_address(program_id: &Address, offer: &Address) -> Address {
        Address::derive(program_id, &[ESCROW_SEED, offer.as_bytes()])
    }
}

/// Locks `terms.principal` from `lender` in a new offer on `loan_id`.
pub(crate) fn open(
    ex: &mut Execution<'_>,
    loan_id: Address,
    lender: Address,
    terms: LoanTerms,
) -> Result<Offer, PawnError> {
    terms.validate_on(&ex.state.ledger)?;
    let loan_request_seq = ex.state.loan_in(&loan_id, LoanState::Requested)?.request_seq;
    ex.ensure_participant(&lender)?;

    let program_id = ex.config.program_id;
    let id = Offer::address(&program_id, &loan_id, loan_request_seq, &lender);
    if ex.state.offers.contains_key(&id) {
        return Err(PawnError::RecordExists(id));
    }
    let escrow_account = Offer::escrow_address(&program_id, &id);

    let rent = ex
        .config
        .rent_for(Offer::SPACE)
        .ok_or(PawnError::ArithmeticOverflow)?;
    ex.state.ledger.allocate(id, lender, Offer::SPACE, rent)?;
    ex.state
        .ledger
        .transfer(terms.settlement_asset, lender, escrow_account, terms.principal)?;

    let offer = Offer {
        id,
        loan: loan_id,
        loan_request_seq,
        lender,
        terms,
        escrow_account,
        state: OfferState::Open,
        opened_at: ex.now,
    };
    ex.state.offers.insert(id, offer.clone());
    ex.emit(PawnEvent::OfferOpened {
        offer: id,
        loan: loan_id,
        lender,
        terms,
        escrow_account,
    });
    Ok(offer)
}

/// Borrower takes `offer_id`, provided its terms are still `expected_terms`.
pub(crate) fn accept(
    ex: &mut Execution<'_>,
    loan_id: Address,
    offer_id: Address,
    caller: Address,
    expected_terms: &LoanTerms,
) -> Result<PawnLoan, PawnError> {
    let loan = ex.state.loan_in(&loan_id, LoanState::Requested)?.clone();
    if caller != loan.borrower {
        return Err(PawnError::Unauthorized {
            caller,
            required: loan.borrower,
        });
    }
    let offer = ex
        .state
        .offers
        .get(&offer_id)
        .cloned()
        .ok_or(PawnError::OfferNotFound(offer_id))?;
    if offer.loan != loan_id || offer.loan_request_seq != loan.request_seq {
        return Err(PawnError::OfferLoanMismatch {
            offer: offer_id,
            offer_loan: offer.loan,
            offer_seq: offer.loan_request_seq,
            loan: loan_id,
            loan_seq: loan.request_seq,
        });
    }
    if !terms::matches(&offer.terms, expected_terms) {
        return Err(PawnError::TermsMismatch);
    }

    drain_escrow(ex, &offer, loan.borrower)?;
    ex.state.ledger.deallocate(offer_id, offer.lender)?;
    ex.state.offers.remove(&offer_id);

    let (loan, event) = loan::activate_from_offer(
        ex.state,
        loan,
        offer.terms,
        offer.lender,
        offer_id,
        ex.now,
    )?;
    ex.emit(event);
    Ok(loan)
}

/// Lender withdraws `offer_id` and recovers the escrowed principal.
pub(crate) fn cancel(
    ex: &mut Execution<'_>,
    offer_id: Address,
    caller: Address,
) -> Result<Offer, PawnError> {
    let mut offer = ex
        .state
        .offers
        .get(&offer_id)
        .cloned()
        .ok_or(PawnError::OfferNotFound(offer_id))?;
    if caller != offer.lender {
        return Err(PawnError::Unauthorized {
            caller,
            required: offer.lender,
        });
    }

    drain_escrow(ex, &offer, offer.lender)?;
    ex.state.ledger.deallocate(offer_id, offer.lender)?;
    ex.state.offers.remove(&offer_id);

    ex.emit(PawnEvent::OfferCancelled {
        offer: offer_id,
        loan: offer.loan,
        lender: offer.lender,
        refunded: offer.terms.principal,
    });
    offer.state = OfferState::Consumed;
    Ok(offer)
}

fn drain_escrow(ex: &mut Execution<'_>, offer: &Offer, to: Address) -> Result<(), PawnError> {
    let asset = offer.terms.settlement_asset;
    let held = ex.state.ledger.balance_of(&offer.escrow_account, &asset);
    if held < offer.terms.principal {
        return Err(PawnError::InvariantViolation(
            "escrow holds less than the offer principal",
        ));
    }
    ex.state
        .ledger
        .transfer(asset, offer.escrow_account, to, offer.terms.principal)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_offer_address_per_request_and_lender() {
        let program = Address::from_label("program");
        let loan = Address::from_label("loan");
        let bob = Address::from_label("bob");
        let carol = Address::from_label("carol");

        assert_eq!(
            Offer::address(&program, &loan, 0, &bob),
            Offer::address(&program, &loan, 0, &bob)
        );
        assert_ne!(
            Offer::address(&program, &loan, 0, &bob),
            Offer::address(&program, &loan, 0, &carol)
        );
        assert_ne!(
            Offer::address(&program, &loan, 0, &bob),
            Offer::address(&program, &loan, 1, &bob)
        );
    }

    #[test]
    fn escrow_is_distinct_from_offer() {
        let program = Address::from_label("program");
        let offer = Offer::address(
            &program,
            &Address::from_label("loan"),
            0,
            &Address::from_label("bob"),
        );
        assert_ne!(Offer::escrow_address(&program, &offer), offer);
    }

    #[test]
    fn state_display() {
        assert_eq!(OfferState::Open.to_string(), "Open");
        assert_eq!(OfferState::Consumed.to_string(), "Consumed");
    }
}
