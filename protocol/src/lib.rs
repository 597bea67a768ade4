// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PAWN Protocol: Core Library
//!
//! Everything the lending program needs from the world around it, and
//! nothing about lending itself:
//!
//! - **config**: Protocol constants and deployment parameters.
//! - **crypto**: Hashes behind addresses and asset ids.
//! - **identity**: The 32-byte [`Address`](identity::Address) namespace
//!   and program-derived addresses.
//! - **ledger**: Asset registry, balances, transfers, and record
//!   allocation with rent deposits.
//! - **oracle**: Authenticity oracles for collateral.
//! - **clock**: Clock sources for deadline checks.
//! - **storage**: Snapshot persistence over sled.
//!
//! The lending state machine lives in the `pawn-contracts` crate.
//!
//! ## Design Philosophy
//!
//! 1. Money arithmetic is checked. Always.
//! 2. A failed operation changes nothing.
//! 3. If it touches money, it has tests. Plural.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod ledger;
pub mod oracle;
pub mod storage;
