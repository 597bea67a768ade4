//! Shared setup for the integration tests.
//!
//! A `Harness` is a program on a manual clock with one unique collateral
//! asset owned by the borrower, a fungible settlement asset, and native
//! balances for everyone so rent never gets in the way.

#![allow(dead_code)]

use std::sync::Arc;

use pawn_contracts::{LoanTerms, PawnLoan, PawnProgram};
use pawn_protocol::clock::ManualClock;
use pawn_protocol::config::ProtocolConfig;
use pawn_protocol::identity::Address;
use pawn_protocol::ledger::{AssetId, AssetKind};
use pawn_protocol::oracle::SupplyOracle;

pub const START: i64 = 1_700_000_000;
pub const DAY: u64 = 86_400;
pub const NATIVE_FLOAT: u64 = 1_000_000_000_000;

pub struct Harness {
    pub program: Arc<PawnProgram>,
    pub clock: Arc<ManualClock>,
    pub alice: Address,
    pub bob: Address,
    pub carol: Address,
    pub art: AssetId,
    pub usdc: AssetId,
    pub native: AssetId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    pub fn with_config(config: ProtocolConfig) -> Self {
        Self::build(config, 1_000)
    }

    /// Alice starts with no USDC: she can spend the principal but not the
    /// interest.
    pub fn without_borrower_funds() -> Self {
        Self::build(ProtocolConfig::default(), 0)
    }

    fn build(config: ProtocolConfig, alice_usdc: u64) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let program =
            Arc::new(PawnProgram::new(config, clock.clone(), Arc::new(SupplyOracle)).unwrap());

        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let carol = Address::from_label("carol");
        let issuer = Address::from_label("issuer");

        let art = program
            .register_asset("ART", AssetKind::Unique, 0, issuer)
            .unwrap();
        program.mint(art, alice, 1).unwrap();

        let usdc = program
            .register_asset("USDC", AssetKind::Fungible, 6, issuer)
            .unwrap();
        program.mint(usdc, bob, 1_000_000).unwrap();
        program.mint(usdc, carol, 1_000_000).unwrap();
        // Enough for the interest in the reference scenarios.
        if alice_usdc > 0 {
            program.mint(usdc, alice, alice_usdc).unwrap();
        }

        let native = program.native_asset();
        for who in [alice, bob, carol] {
            program.mint(native, who, NATIVE_FLOAT).unwrap();
        }
        program.drain_events();

        Self {
            program,
            clock,
            alice,
            bob,
            carol,
            art,
            usdc,
            native,
        }
    }

    /// 1000 USDC at 500 bps for one day.
    pub fn terms(&self) -> LoanTerms {
        LoanTerms::new(1_000, self.usdc, 500, DAY)
    }

    /// Alice pawns the art at [`Harness::terms`].
    pub fn request(&self) -> PawnLoan {
        self.program
            .request(self.alice, self.art, self.terms())
            .unwrap()
    }

    pub fn usdc_of(&self, who: &Address) -> u64 {
        self.program.balance_of(who, &self.usdc)
    }

    pub fn native_of(&self, who: &Address) -> u64 {
        self.program.balance_of(who, &self.native)
    }
}
