//! # Identity Module
//!
//! Participants, assets, and records share one namespace of 32-byte
//! addresses. Key management lives outside the protocol: by the time an
//! operation reaches the program, the caller has already been
//! authenticated and is represented by its [`Address`].

pub mod address;

pub use address::{Address, AddressError, ADDRESS_LENGTH};
