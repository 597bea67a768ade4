//! # Cryptographic Primitives for PAWN
//!
//! Hashing is all the program needs: record addresses and label identities
//! are digests, and nothing is signed or encrypted at this layer.
//!
//! - **SHA-256** for derived record addresses.
//! - **BLAKE3** for domain-separated labels and asset ids.

pub mod hash;

pub use hash::{domain_separated_hash, sha256_multi};
