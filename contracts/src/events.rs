//! Events emitted by committed operations.
//!
//! Events are recorded only when an operation commits. A rejected
//! operation leaves no trace here.

use serde::{Deserialize, Serialize};

use pawn_protocol::identity::Address;
use pawn_protocol::ledger::AssetId;

use crate::settlement::RepaymentSplit;
use crate::terms::LoanTerms;

/// How a loan got funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPath {
    /// A lender matched the desired terms directly.
    Underwritten,
    /// The borrower accepted an open offer.
    OfferAccepted { offer: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PawnEvent {
    LoanRequested {
        loan: Address,
        borrower: Address,
        collateral_asset: AssetId,
        desired_terms: LoanTerms,
        requested_at: i64,
    },
    LoanActivated {
        loan: Address,
        borrower: Address,
        lender: Address,
        terms: LoanTerms,
        activated_at: i64,
        due_at: i64,
        path: ActivationPath,
    },
    OfferOpened {
        offer: Address,
        loan: Address,
        lender: Address,
        terms: LoanTerms,
        escrow_account: Address,
    },
    OfferCancelled {
        offer: Address,
        loan: Address,
        lender: Address,
        refunded: u64,
    },
    LoanRepaid {
        loan: Address,
        borrower: Address,
        lender: Address,
        settlement_asset: AssetId,
        split: RepaymentSplit,
        repaid_at: i64,
    },
    CollateralSeized {
        loan: Address,
        lender: Address,
        collateral_asset: AssetId,
        seized_at: i64,
    },
}

impl PawnEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PawnEvent::LoanRequested { .. } => "loan_requested",
            PawnEvent::LoanActivated { .. } => "loan_activated",
            PawnEvent::OfferOpened { .. } => "offer_opened",
            PawnEvent::OfferCancelled { .. } => "offer_cancelled",
            PawnEvent::LoanRepaid { .. } => "loan_repaid",
            PawnEvent::CollateralSeized { .. } => "collateral_seized",
        }
    }

    /// The loan every event concerns.
    pub fn loan(&self) -> Address {
        match self {
            PawnEvent::LoanRequested { loan, .. }
            | PawnEvent::LoanActivated { loan, .. }
            | PawnEvent::OfferOpened { loan, .. }
            | PawnEvent::OfferCancelled { loan, .. }
            | PawnEvent::LoanRepaid { loan, .. }
            | PawnEvent::CollateralSeized { loan, .. } => *loan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_carries_event_tag() {
        let event = PawnEvent::CollateralSeized {
            loan: Address::from_label("loan"),
            lender: Address::from_label("bob"),
            collateral_asset: Address::from_label("art"),
            seized_at: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "collateral_seized");
        assert_eq!(json["seized_at"], 42);
        assert_eq!(json["loan"], Address::from_label("loan").to_hex());
        assert_eq!(event.kind(), "collateral_seized");
    }

    #[test]
    fn activation_path_json() {
        let offer = Address::from_label("offer");
        let json = serde_json::to_value(ActivationPath::OfferAccepted { offer }).unwrap();
        assert_eq!(json["offer_accepted"]["offer"], offer.to_hex());
        assert_eq!(
            serde_json::to_value(ActivationPath::Underwritten).unwrap(),
            "underwritten"
        );
    }
}
