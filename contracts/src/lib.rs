//! # PAWN Lending Program
//!
//! Peer-to-peer loans against unique collateral. A borrower pawns a unique
//! asset and names the terms they want; lenders either fund those terms
//! directly or escrow competing offers; the borrower repays by the deadline
//! to get the asset back, or the lender seizes it afterwards.
//!
//! - **custody**: Holding accounts for pawned collateral.
//! - **terms**: Loan terms and exact-match comparison.
//! - **offer**: Escrowed competing offers.
//! - **loan**: The loan state machine.
//! - **settlement**: Repayment math and terminal movements.
//! - **program**: The [`PawnProgram`] every operation goes through.
//!
//! ## Design Principles
//!
//! 1. Every operation is all-or-nothing. Errors leave state untouched.
//! 2. Record addresses are derived, never chosen by callers.
//! 3. State transitions are explicit enum variants, checked on entry.
//! 4. Money arithmetic is checked, and intermediate products are widened.

pub mod custody;
pub mod error;
pub mod events;
pub mod loan;
pub mod offer;
pub mod program;
pub mod settlement;
pub mod terms;

pub use error::PawnError;
pub use events::{ActivationPath, PawnEvent};
pub use loan::{LoanState, PawnLoan};
pub use offer::{Offer, OfferState};
pub use program::{PawnProgram, ProgramSnapshot, ProgramState};
pub use settlement::{compute_repayment, RepaymentQuote, RepaymentSplit, Settlement};
pub use terms::{matches, LoanTerms};
