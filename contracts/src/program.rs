//! # PAWN Program
//!
//! The single entry point for every operation. A [`PawnProgram`] owns the
//! ledger and all loan and offer records behind one mutex.
//!
//! ## Atomicity
//!
//! Each operation:
//!
//! 1. takes the lock and reads the clock,
//! 2. clones the committed state into a working copy,
//! 3. runs every precondition check and movement against the copy,
//! 4. swaps the copy in only if the whole operation succeeded.
//!
//! Two conflicting submissions therefore serialize. The second one sees the
//! first one's committed state and fails its own precondition.
//!
//! ## Time
//!
//! The state remembers when the last operation committed. A clock reading
//! earlier than that is refused with [`PawnError::ClockRegression`], so a
//! program restored on a lagging clock cannot reopen a deadline that the
//! committed history has already passed.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use pawn_protocol::clock::Clock;
use pawn_protocol::config::{ConfigError, ProtocolConfig};
use pawn_protocol::identity::Address;
use pawn_protocol::ledger::{AssetId, AssetInfo, AssetKind, Ledger};
use pawn_protocol::oracle::AuthenticityOracle;

use crate::custody;
use crate::error::PawnError;
use crate::events::PawnEvent;
use crate::loan::{self, LoanState, PawnLoan};
use crate::offer::{self, Offer};
use crate::settlement::{self, RepaymentQuote, Settlement};
use crate::terms::LoanTerms;

// ---------------------------------------------------------------------------
// Program State
// ---------------------------------------------------------------------------

/// Everything a program instance persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramState {
    pub(crate) ledger: Ledger,
    pub(crate) loans: BTreeMap<Address, PawnLoan>,
    pub(crate) offers: BTreeMap<Address, Offer>,
    /// Closed loans, oldest first.
    pub(crate) archive: Vec<PawnLoan>,
    /// Sequence number the next request gets.
    #[serde(default)]
    pub(crate) next_request_seq: u64,
    /// Timestamp of the latest committed operation.
    #[serde(default)]
    pub(crate) last_committed_at: i64,
}

impl ProgramState {
    /// Looks up a live loan and checks it is in `expected`.
    ///
    /// A loan that only exists in the archive has already closed, which is
    /// a stale-state failure rather than a missing record.
    pub(crate) fn loan_in(
        &self,
        id: &Address,
        expected: LoanState,
    ) -> Result<&PawnLoan, PawnError> {
        if let Some(loan) = self.loans.get(id) {
            loan.ensure_state(expected)?;
            return Ok(loan);
        }
        match self.archived(id) {
            Some(closed) => Err(PawnError::StaleState {
                record: *id,
                current: closed.state.to_string(),
                expected: expected.to_string(),
            }),
            None => Err(PawnError::LoanNotFound(*id)),
        }
    }

    /// `true` for addresses the program controls: live records, their
    /// custody and escrow accounts.
    pub(crate) fn is_program_account(&self, address: &Address) -> bool {
        self.ledger.is_allocated(address)
            || self
                .loans
                .values()
                .any(|loan| loan.collateral_holding_account == *address)
            || self
                .offers
                .values()
                .any(|offer| offer.escrow_account == *address)
    }

    fn archived(&self, id: &Address) -> Option<&PawnLoan> {
        self.archive.iter().rev().find(|loan| loan.id == *id)
    }

    /// Frees a closed loan's address, refunding its rent to the borrower.
    pub(crate) fn archive_loan(&mut self, loan: PawnLoan) -> Result<(), PawnError> {
        if !loan.state.is_terminal() {
            return Err(PawnError::InvariantViolation("archiving an open loan"));
        }
        self.ledger.deallocate(loan.id, loan.borrower)?;
        self.loans.remove(&loan.id);
        self.archive.push(loan);
        Ok(())
    }
}

/// A persisted program: its configuration plus its state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSnapshot {
    pub config: ProtocolConfig,
    pub state: ProgramState,
}

// ---------------------------------------------------------------------------
// Execution Context
// ---------------------------------------------------------------------------

/// What an operation sees while it runs: the working copy of the state,
/// the deployment config, the oracle, and the submission timestamp.
pub(crate) struct Execution<'a> {
    pub(crate) state: &'a mut ProgramState,
    pub(crate) config: &'a ProtocolConfig,
    pub(crate) oracle: &'a dyn AuthenticityOracle,
    pub(crate) now: i64,
    events: Vec<PawnEvent>,
}

impl Execution<'_> {
    pub(crate) fn emit(&mut self, event: PawnEvent) {
        self.events.push(event);
    }

    /// Rejects program-owned addresses as participants.
    pub(crate) fn ensure_participant(&self, who: &Address) -> Result<(), PawnError> {
        if *who == self.config.treasury || self.state.is_program_account(who) {
            return Err(PawnError::ProgramAccount(*who));
        }
        Ok(())
    }
}

struct Inner {
    state: ProgramState,
    events: Vec<PawnEvent>,
}

// ---------------------------------------------------------------------------
// PawnProgram
// ---------------------------------------------------------------------------

/// A running PAWN program instance.
pub struct PawnProgram {
    config: ProtocolConfig,
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    oracle: Arc<dyn AuthenticityOracle>,
}

impl PawnProgram {
    /// Starts a program with an empty ledger.
    pub fn new(
        config: ProtocolConfig,
        clock: Arc<dyn Clock>,
        oracle: Arc<dyn AuthenticityOracle>,
    ) -> Result<Self, ConfigError> {
        Self::restore(
            ProgramSnapshot {
                config,
                state: ProgramState::default(),
            },
            clock,
            oracle,
        )
    }

    /// Resumes a program from a snapshot.
    pub fn restore(
        snapshot: ProgramSnapshot,
        clock: Arc<dyn Clock>,
        oracle: Arc<dyn AuthenticityOracle>,
    ) -> Result<Self, ConfigError> {
        snapshot.config.validate()?;
        tracing::info!(
            program = %snapshot.config.program_id.short(),
            loans = snapshot.state.loans.len(),
            offers = snapshot.state.offers.len(),
            "program loaded"
        );
        Ok(Self {
            config: snapshot.config,
            inner: Mutex::new(Inner {
                state: snapshot.state,
                events: Vec::new(),
            }),
            clock,
            oracle,
        })
    }

    /// Copy of the committed state for persistence.
    pub fn snapshot(&self) -> ProgramSnapshot {
        ProgramSnapshot {
            config: self.config.clone(),
            state: self.inner.lock().state.clone(),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Current reading of the program's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    fn execute<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Execution<'_>) -> Result<T, PawnError>,
    ) -> Result<T, PawnError> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        if now < inner.state.last_committed_at {
            let err = PawnError::ClockRegression {
                now,
                last_committed_at: inner.state.last_committed_at,
            };
            tracing::warn!(op, error = %err, "rejected");
            return Err(err);
        }
        let mut working = inner.state.clone();

        let mut ex = Execution {
            state: &mut working,
            config: &self.config,
            oracle: self.oracle.as_ref(),
            now,
            events: Vec::new(),
        };

        match f(&mut ex) {
            Ok(value) => {
                let events = std::mem::take(&mut ex.events);
                working.last_committed_at = now;
                inner.state = working;
                for event in &events {
                    tracing::info!(op, event = event.kind(), loan = %event.loan().short(), now, "committed");
                }
                inner.events.extend(events);
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(op, error = %err, now, "rejected");
                Err(err)
            }
        }
    }

    // -- Loan operations ----------------------------------------------------

    /// Pawns `collateral_asset` and requests a loan at `desired_terms`.
    ///
    /// # Errors
    ///
    /// `InvalidTerms`, `InvalidAsset`, `AlreadyInCustody`, or
    /// `InsufficientFunds` if the borrower cannot cover the record rent.
    pub fn request(
        &self,
        borrower: Address,
        collateral_asset: AssetId,
        desired_terms: LoanTerms,
    ) -> Result<PawnLoan, PawnError> {
        self.execute("request", |ex| {
            loan::request(ex, borrower, collateral_asset, desired_terms)
        })
    }

    /// Funds `loan` directly at exactly its desired terms.
    ///
    /// # Errors
    ///
    /// `StaleState` unless the loan is `Requested`, `TermsMismatch`, or
    /// `InsufficientFunds`.
    pub fn underwrite(
        &self,
        loan: Address,
        lender: Address,
        offered_terms: LoanTerms,
    ) -> Result<PawnLoan, PawnError> {
        self.execute("underwrite", |ex| {
            loan::underwrite(ex, loan, lender, offered_terms)
        })
    }

    /// Repays `loan`. Only the borrower, only until the deadline.
    pub fn repay(&self, loan: Address, caller: Address) -> Result<Settlement, PawnError> {
        self.execute("repay", |ex| loan::repay(ex, loan, caller))
    }

    /// Seizes the collateral of `loan`. Only the lender, only after the deadline.
    pub fn seize(&self, loan: Address, caller: Address) -> Result<PawnLoan, PawnError> {
        self.execute("seize", |ex| loan::seize(ex, loan, caller))
    }

    // -- Offer operations ---------------------------------------------------

    /// Escrows `terms.principal` from `lender` as an offer on `loan`.
    pub fn open_offer(
        &self,
        loan: Address,
        lender: Address,
        terms: LoanTerms,
    ) -> Result<Offer, PawnError> {
        self.execute("open", |ex| offer::open(ex, loan, lender, terms))
    }

    /// Accepts `offer` on `loan` if its terms are still `expected_terms`.
    pub fn accept_offer(
        &self,
        loan: Address,
        offer: Address,
        caller: Address,
        expected_terms: &LoanTerms,
    ) -> Result<PawnLoan, PawnError> {
        self.execute("accept", |ex| {
            offer::accept(ex, loan, offer, caller, expected_terms)
        })
    }

    /// Cancels `offer` and refunds its escrow to the lender.
    pub fn cancel_offer(&self, offer: Address, caller: Address) -> Result<Offer, PawnError> {
        self.execute("cancel", |ex| offer::cancel(ex, offer, caller))
    }

    // -- Ledger administration ----------------------------------------------

    /// Registers an asset on the program's ledger.
    pub fn register_asset(
        &self,
        symbol: &str,
        kind: AssetKind,
        decimals: u8,
        issuer: Address,
    ) -> Result<AssetId, PawnError> {
        self.execute("register_asset", |ex| {
            Ok(ex.state.ledger.register_asset(symbol, kind, decimals, issuer)?)
        })
    }

    /// Mints `amount` of `asset` to `to`. Returns the recipient's new balance.
    ///
    /// Program-owned accounts cannot be minted to.
    pub fn mint(&self, asset: AssetId, to: Address, amount: u64) -> Result<u64, PawnError> {
        self.execute("mint", |ex| {
            ex.ensure_participant(&to)?;
            Ok(ex.state.ledger.mint(asset, to, amount)?)
        })
    }

    // -- Queries ------------------------------------------------------------

    /// A live (requested or active) loan.
    pub fn loan(&self, id: &Address) -> Option<PawnLoan> {
        self.inner.lock().state.loans.get(id).cloned()
    }

    /// The most recently closed loan at `id`.
    pub fn archived_loan(&self, id: &Address) -> Option<PawnLoan> {
        self.inner.lock().state.archived(id).cloned()
    }

    /// All closed loans, oldest first.
    pub fn archive(&self) -> Vec<PawnLoan> {
        self.inner.lock().state.archive.clone()
    }

    /// All live loans.
    pub fn loans(&self) -> Vec<PawnLoan> {
        self.inner.lock().state.loans.values().cloned().collect()
    }

    /// An open offer.
    pub fn offer(&self, id: &Address) -> Option<Offer> {
        self.inner.lock().state.offers.get(id).cloned()
    }

    /// Every open offer naming `loan`, including offers left over from an
    /// earlier request at the same address.
    pub fn offers_for_loan(&self, loan: &Address) -> Vec<Offer> {
        self.inner
            .lock()
            .state
            .offers
            .values()
            .filter(|offer| offer.loan == *loan)
            .cloned()
            .collect()
    }

    pub fn balance_of(&self, owner: &Address, asset: &AssetId) -> u64 {
        self.inner.lock().state.ledger.balance_of(owner, asset)
    }

    /// Every non-zero balance of `owner`.
    pub fn balances(&self, owner: &Address) -> Vec<(AssetId, u64)> {
        self.inner.lock().state.ledger.balances(owner)
    }

    /// Current holder of a unique asset.
    pub fn holder_of(&self, asset: &AssetId) -> Option<Address> {
        self.inner.lock().state.ledger.holder_of(asset)
    }

    pub fn asset(&self, asset: &AssetId) -> Option<AssetInfo> {
        self.inner.lock().state.ledger.asset(asset).cloned()
    }

    /// Registered assets with this symbol.
    pub fn assets_by_symbol(&self, symbol: &str) -> Vec<AssetInfo> {
        self.inner
            .lock()
            .state
            .ledger
            .assets_by_symbol(symbol)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The asset rent is paid in.
    pub fn native_asset(&self) -> AssetId {
        self.inner.lock().state.ledger.native_asset()
    }

    /// Rent deposit currently held for the record at `address`.
    pub fn rent_deposit(&self, address: &Address) -> Option<u64> {
        self.inner
            .lock()
            .state
            .ledger
            .allocation(address)
            .map(|allocation| allocation.deposit)
    }

    /// Address the loan for `(borrower, asset)` lives at.
    pub fn loan_address(&self, borrower: &Address, asset: &AssetId) -> Address {
        let holding = custody::holding_account(&self.config.program_id, borrower, asset);
        PawnLoan::address(&self.config.program_id, borrower, &holding)
    }

    /// Address `lender`'s offer on the live loan at `loan` would live at.
    /// `None` if no loan is live there.
    pub fn offer_address(&self, loan: &Address, lender: &Address) -> Option<Address> {
        let inner = self.inner.lock();
        let live = inner.state.loans.get(loan)?;
        Some(Offer::address(
            &self.config.program_id,
            loan,
            live.request_seq,
            lender,
        ))
    }

    /// Timestamp of the latest committed operation.
    pub fn last_committed_at(&self) -> i64 {
        self.inner.lock().state.last_committed_at
    }

    /// Amount due and deadline for an active loan.
    pub fn quote_repayment(&self, id: &Address) -> Result<RepaymentQuote, PawnError> {
        let inner = self.inner.lock();
        let loan = inner.state.loan_in(id, LoanState::Active)?;
        let terms = loan
            .active_terms
            .ok_or(PawnError::InvariantViolation("active loan without terms"))?;
        let due_at = loan
            .due_at()
            .ok_or(PawnError::InvariantViolation("active loan without deadline"))?;
        let split = settlement::compute_repayment(&terms, self.config.protocol_fee_bps)?;
        let total_due = split.total_due().ok_or(PawnError::ArithmeticOverflow)?;

        Ok(RepaymentQuote {
            loan: *id,
            settlement_asset: terms.settlement_asset,
            split,
            total_due,
            due_at,
        })
    }

    /// Takes every event committed since the last drain.
    pub fn drain_events(&self) -> Vec<PawnEvent> {
        std::mem::take(&mut self.inner.lock().events)
    }
}

impl std::fmt::Debug for PawnProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PawnProgram")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
