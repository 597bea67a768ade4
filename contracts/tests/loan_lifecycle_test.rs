//! Integration tests for the loan lifecycle.
//!
//! Request, direct underwriting, repayment, and seizure, driven through
//! `PawnProgram` on a manual clock.

mod common;

use std::sync::Arc;

use common::{Harness, DAY, NATIVE_FLOAT, START};
use pawn_contracts::{
    ActivationPath, LoanState, LoanTerms, PawnError, PawnEvent, PawnLoan, PawnProgram,
};
use pawn_protocol::clock::ManualClock;
use pawn_protocol::config::{treasury_address, ProtocolConfig};
use pawn_protocol::identity::Address;
use pawn_protocol::ledger::AssetKind;
use pawn_protocol::oracle::SupplyOracle;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[test]
fn request_takes_collateral_into_custody() {
    let h = Harness::new();
    let loan = h.request();

    assert_eq!(loan.state, LoanState::Requested);
    assert_eq!(loan.borrower, h.alice);
    assert_eq!(loan.desired_terms, Some(h.terms()));
    assert!(loan.active_terms.is_none());
    assert!(loan.lender.is_none());
    assert!(loan.activated_at.is_none());
    assert_eq!(loan.id, h.program.loan_address(&h.alice, &h.art));

    assert_eq!(h.program.holder_of(&h.art), Some(loan.collateral_holding_account));
    assert_eq!(h.program.balance_of(&h.alice, &h.art), 0);
    assert_eq!(h.program.loan(&loan.id), Some(loan));
}

#[test]
fn request_charges_rent_to_borrower() {
    let h = Harness::new();
    let loan = h.request();

    let rent = h.program.rent_deposit(&loan.id).unwrap();
    assert_eq!(
        Some(rent),
        h.program.config().rent_for(PawnLoan::SPACE)
    );
    assert_eq!(h.native_of(&h.alice), NATIVE_FLOAT - rent);
}

#[test]
fn request_with_zero_principal_is_invalid_terms() {
    let h = Harness::new();
    let terms = LoanTerms {
        principal: 0,
        ..h.terms()
    };
    let err = h.program.request(h.alice, h.art, terms).unwrap_err();
    assert!(matches!(err, PawnError::InvalidTerms(_)));
    assert_eq!(h.program.holder_of(&h.art), Some(h.alice));
}

#[test]
fn request_with_zero_duration_is_invalid_terms() {
    let h = Harness::new();
    let terms = LoanTerms {
        term_duration_secs: 0,
        ..h.terms()
    };
    let err = h.program.request(h.alice, h.art, terms).unwrap_err();
    assert!(matches!(err, PawnError::InvalidTerms(_)));
}

#[test]
fn request_with_fungible_collateral_is_invalid_asset() {
    let h = Harness::new();
    let err = h.program.request(h.alice, h.usdc, h.terms()).unwrap_err();
    assert_eq!(err, PawnError::InvalidAsset(h.usdc));
}

#[test]
fn pawning_the_same_asset_twice_fails() {
    let h = Harness::new();
    h.request();
    let err = h.program.request(h.alice, h.art, h.terms()).unwrap_err();
    assert_eq!(
        err,
        PawnError::AlreadyInCustody {
            asset: h.art,
            owner: h.alice
        }
    );
}

#[test]
fn only_the_holder_can_pawn() {
    let h = Harness::new();
    let err = h.program.request(h.bob, h.art, h.terms()).unwrap_err();
    assert!(matches!(err, PawnError::AlreadyInCustody { .. }));
}

// ---------------------------------------------------------------------------
// Underwrite
// ---------------------------------------------------------------------------

#[test]
fn underwrite_activates_and_pays_borrower() {
    let h = Harness::new();
    let loan = h.request();
    h.clock.advance(10);

    let active = h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();

    assert_eq!(active.state, LoanState::Active);
    assert_eq!(active.lender, Some(h.bob));
    assert_eq!(active.active_terms, Some(h.terms()));
    assert_eq!(active.activated_at, Some(common::START + 10));
    assert!(active.desired_terms.is_none());
    assert_eq!(h.usdc_of(&h.alice), 2_000);
    assert_eq!(h.usdc_of(&h.bob), 999_000);
}

#[test]
fn underwrite_rejects_any_difference() {
    let h = Harness::new();
    let loan = h.request();

    let off_by_one_bp = LoanTerms {
        interest_rate_bps: 499,
        ..h.terms()
    };
    assert_eq!(
        h.program.underwrite(loan.id, h.bob, off_by_one_bp),
        Err(PawnError::TermsMismatch)
    );

    let other_asset = h
        .program
        .register_asset("USDT", AssetKind::Fungible, 6, h.bob)
        .unwrap();
    let wrong_asset = LoanTerms {
        settlement_asset: other_asset,
        ..h.terms()
    };
    assert_eq!(
        h.program.underwrite(loan.id, h.bob, wrong_asset),
        Err(PawnError::TermsMismatch)
    );
    assert_eq!(h.program.loan(&loan.id).unwrap().state, LoanState::Requested);
}

#[test]
fn underwrite_without_funds_fails() {
    let h = Harness::new();
    let loan = h.request();
    let dave = Address::from_label("dave");

    let err = h.program.underwrite(loan.id, dave, h.terms()).unwrap_err();
    assert_eq!(
        err,
        PawnError::InsufficientFunds {
            owner: dave,
            asset: h.usdc,
            available: 0,
            requested: 1_000
        }
    );
    assert_eq!(h.program.loan(&loan.id).unwrap().state, LoanState::Requested);
}

#[test]
fn second_underwrite_is_stale() {
    let h = Harness::new();
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();

    let err = h.program.underwrite(loan.id, h.carol, h.terms()).unwrap_err();
    assert!(matches!(err, PawnError::StaleState { .. }));
    assert_eq!(h.usdc_of(&h.carol), 1_000_000);
    assert_eq!(h.program.loan(&loan.id).unwrap().lender, Some(h.bob));
}

// ---------------------------------------------------------------------------
// Repay
// ---------------------------------------------------------------------------

#[test]
fn repay_before_activation_is_stale() {
    let h = Harness::new();
    let loan = h.request();
    let err = h.program.repay(loan.id, h.alice).unwrap_err();
    assert!(matches!(err, PawnError::StaleState { .. }));
}

#[test]
fn reference_round_trip() {
    let h = Harness::new();
    let treasury = h.program.config().treasury;
    let loan = h.request();
    let active = h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    let activated_at = active.activated_at.unwrap();

    h.clock.set(activated_at + 1);
    let receipt = h.program.repay(loan.id, h.alice).unwrap();

    // 1000 + 50 interest, 10% of the interest to the treasury.
    assert_eq!(receipt.split.principal_to_lender, 1_000);
    assert_eq!(receipt.split.interest_to_lender, 45);
    assert_eq!(receipt.split.fee_to_protocol, 5);
    assert_eq!(h.usdc_of(&h.bob), 1_000_000 - 1_000 + 1_045);
    assert_eq!(h.usdc_of(&treasury), 5);
    assert_eq!(h.usdc_of(&h.alice), 2_000 - 1_050);

    assert_eq!(h.program.holder_of(&h.art), Some(h.alice));
    assert!(h.program.loan(&loan.id).is_none());
    let closed = h.program.archived_loan(&loan.id).unwrap();
    assert_eq!(closed.state, LoanState::Repaid);
    assert_eq!(closed.closed_at, Some(activated_at + 1));
}

#[test]
fn repay_refunds_rent() {
    let h = Harness::new();
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    h.program.repay(loan.id, h.alice).unwrap();

    assert_eq!(h.native_of(&h.alice), NATIVE_FLOAT);
    assert_eq!(h.program.rent_deposit(&loan.id), None);
}

#[test]
fn repay_at_exact_deadline_is_allowed() {
    let h = Harness::new();
    let loan = h.request();
    let active = h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();

    h.clock.set(active.due_at().unwrap());
    assert!(h.program.repay(loan.id, h.alice).is_ok());
}

#[test]
fn repay_after_deadline_is_overdue() {
    let h = Harness::new();
    let loan = h.request();
    let active = h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    let due_at = active.due_at().unwrap();

    h.clock.set(due_at + 1);
    assert_eq!(
        h.program.repay(loan.id, h.alice),
        Err(PawnError::Overdue {
            due_at,
            now: due_at + 1
        })
    );
}

#[test]
fn only_borrower_repays() {
    let h = Harness::new();
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();

    assert_eq!(
        h.program.repay(loan.id, h.carol),
        Err(PawnError::Unauthorized {
            caller: h.carol,
            required: h.alice
        })
    );
}

#[test]
fn repay_without_interest_money_leaves_loan_active() {
    let h = Harness::without_borrower_funds();
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();

    let err = h.program.repay(loan.id, h.alice).unwrap_err();
    assert_eq!(
        err,
        PawnError::InsufficientFunds {
            owner: h.alice,
            asset: h.usdc,
            available: 1_000,
            requested: 1_050
        }
    );
    assert_eq!(h.program.loan(&loan.id).unwrap().state, LoanState::Active);
    assert_eq!(h.usdc_of(&h.alice), 1_000);
    assert_eq!(h.usdc_of(&h.bob), 999_000);
}

#[test]
fn repay_twice_is_stale() {
    let h = Harness::new();
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    h.program.repay(loan.id, h.alice).unwrap();

    let err = h.program.repay(loan.id, h.alice).unwrap_err();
    assert_eq!(
        err,
        PawnError::StaleState {
            record: loan.id,
            current: "Repaid".into(),
            expected: "Active".into(),
        }
    );
}

#[test]
fn zero_fee_config_pays_all_interest_to_lender() {
    let config = ProtocolConfig {
        protocol_fee_bps: 0,
        ..ProtocolConfig::default()
    };
    let h = Harness::with_config(config);
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    h.program.repay(loan.id, h.alice).unwrap();

    assert_eq!(h.usdc_of(&h.bob), 1_000_050);
    let treasury = treasury_address(&h.program.config().program_id);
    assert_eq!(h.usdc_of(&treasury), 0);
}

// ---------------------------------------------------------------------------
// Seize
// ---------------------------------------------------------------------------

#[test]
fn seize_after_deadline_gives_lender_collateral() {
    let h = Harness::new();
    let loan = h.request();
    let active = h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    let activated_at = active.activated_at.unwrap();

    h.clock.set(activated_at + DAY as i64 + 1);
    let seized = h.program.seize(loan.id, h.bob).unwrap();

    assert_eq!(seized.state, LoanState::Defaulted);
    assert_eq!(h.program.holder_of(&h.art), Some(h.bob));
    // No money moves on default.
    assert_eq!(h.usdc_of(&h.bob), 999_000);
    assert_eq!(h.usdc_of(&h.alice), 2_000);
    // Rent still goes back to the borrower.
    assert_eq!(h.native_of(&h.alice), NATIVE_FLOAT);
}

#[test]
fn seize_before_deadline_is_not_due() {
    let h = Harness::new();
    let loan = h.request();
    let active = h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    let due_at = active.due_at().unwrap();

    h.clock.set(due_at - 1);
    assert_eq!(
        h.program.seize(loan.id, h.bob),
        Err(PawnError::NotDue {
            due_at,
            now: due_at - 1
        })
    );

    h.clock.set(due_at);
    assert!(matches!(
        h.program.seize(loan.id, h.bob),
        Err(PawnError::NotDue { .. })
    ));
    assert_eq!(h.program.holder_of(&h.art), Some(active.collateral_holding_account));
}

#[test]
fn only_lender_seizes() {
    let h = Harness::new();
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    h.clock.advance(2 * DAY);

    assert_eq!(
        h.program.seize(loan.id, h.alice),
        Err(PawnError::Unauthorized {
            caller: h.alice,
            required: h.bob
        })
    );
}

#[test]
fn seize_of_requested_loan_is_stale() {
    let h = Harness::new();
    let loan = h.request();
    assert!(matches!(
        h.program.seize(loan.id, h.bob),
        Err(PawnError::StaleState { .. })
    ));
}

#[test]
fn repaid_loan_cannot_be_seized() {
    let h = Harness::new();
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    h.program.repay(loan.id, h.alice).unwrap();
    h.clock.advance(2 * DAY);

    assert!(matches!(
        h.program.seize(loan.id, h.bob),
        Err(PawnError::StaleState { .. })
    ));
    assert_eq!(h.program.holder_of(&h.art), Some(h.alice));
}

// ---------------------------------------------------------------------------
// Re-pawning & events
// ---------------------------------------------------------------------------

#[test]
fn asset_can_be_pawned_again_after_repayment() {
    let h = Harness::new();
    let first = h.request();
    h.program.underwrite(first.id, h.bob, h.terms()).unwrap();
    h.program.repay(first.id, h.alice).unwrap();

    let second = h.request();
    assert_eq!(second.id, first.id);
    assert_eq!(second.state, LoanState::Requested);
    assert_eq!(h.program.archive().len(), 1);
}

#[test]
fn events_follow_committed_operations() {
    let h = Harness::new();
    let loan = h.request();
    let _ = h.program.underwrite(loan.id, h.bob, LoanTerms { principal: 1, ..h.terms() });
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    h.program.repay(loan.id, h.alice).unwrap();

    let events = h.program.drain_events();
    let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["loan_requested", "loan_activated", "loan_repaid"]);
    assert!(matches!(
        events[1],
        PawnEvent::LoanActivated {
            path: ActivationPath::Underwritten,
            ..
        }
    ));
    assert!(h.program.drain_events().is_empty());
}

#[test]
fn quote_matches_repayment() {
    let h = Harness::new();
    let loan = h.request();
    let active = h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();

    let quote = h.program.quote_repayment(&loan.id).unwrap();
    assert_eq!(quote.total_due, 1_050);
    assert_eq!(quote.due_at, active.due_at().unwrap());

    let receipt = h.program.repay(loan.id, h.alice).unwrap();
    assert_eq!(receipt.split, quote.split);
}

// ---------------------------------------------------------------------------
// Custody isolation & time
// ---------------------------------------------------------------------------

#[test]
fn custody_and_record_accounts_cannot_act_as_participants() {
    let h = Harness::new();
    let loan = h.request();
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    let holding = loan.collateral_holding_account;

    assert_eq!(
        h.program.mint(h.native, holding, 1_000_000),
        Err(PawnError::ProgramAccount(holding))
    );
    assert_eq!(
        h.program.mint(h.native, loan.id, 1),
        Err(PawnError::ProgramAccount(loan.id))
    );
    // The holding account holds the art, but it cannot pawn it onwards.
    assert_eq!(
        h.program.request(holding, h.art, h.terms()),
        Err(PawnError::ProgramAccount(holding))
    );
    assert_eq!(h.program.holder_of(&h.art), Some(holding));

    h.program.repay(loan.id, h.alice).unwrap();
    assert_eq!(h.program.holder_of(&h.art), Some(h.alice));
}

#[test]
fn treasury_cannot_fund_loans() {
    let h = Harness::new();
    let loan = h.request();
    let treasury = h.program.config().treasury;
    assert_eq!(
        h.program.underwrite(loan.id, treasury, h.terms()),
        Err(PawnError::ProgramAccount(treasury))
    );
    assert_eq!(h.program.loan(&loan.id).unwrap().state, LoanState::Requested);
}

#[test]
fn restored_program_refuses_a_lagging_clock() {
    let h = Harness::new();
    let loan = h.request();
    h.clock.advance(1_000);
    h.program.underwrite(loan.id, h.bob, h.terms()).unwrap();
    assert_eq!(h.program.last_committed_at(), START + 1_000);

    let lagging = Arc::new(ManualClock::new(START - 5 * DAY as i64));
    let restored =
        PawnProgram::restore(h.program.snapshot(), lagging.clone(), Arc::new(SupplyOracle))
            .unwrap();

    assert_eq!(
        restored.repay(loan.id, h.alice),
        Err(PawnError::ClockRegression {
            now: START - 5 * DAY as i64,
            last_committed_at: START + 1_000,
        })
    );
    assert_eq!(restored.loan(&loan.id).unwrap().state, LoanState::Active);

    // Once the clock catches up past the deadline, the loan is overdue.
    lagging.set(START + 1_000 + DAY as i64 + 1);
    assert!(matches!(
        restored.repay(loan.id, h.alice),
        Err(PawnError::Overdue { .. })
    ));
    restored.seize(loan.id, h.bob).unwrap();
}

