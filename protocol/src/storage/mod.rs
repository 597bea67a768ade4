//! # Storage Module
//!
//! Persistence for program state between node invocations. The program
//! itself is purely in-memory; the node commits a snapshot after every
//! operation that succeeds.
//!
//! Bincode is the on-disk format. JSON is for configs and terminal output.

pub mod db;

pub use db::{DbError, DbResult, PawnDB};
