//! # Hashing Utilities
//!
//! The two hash functions PAWN uses, and the jobs they do:
//!
//! - **SHA-256**: program-derived addresses. Loan, offer, custody, and
//!   escrow addresses are SHA-256 digests over their seeds plus the program
//!   id, the same construction account-based ledgers use for PDAs, so a
//!   client in any language can recompute them.
//!
//! - **BLAKE3**: label identities and asset ids, through its
//!   `derive_key` mode for domain separation.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of several byte slices fed in order.
///
/// Returns `[u8; 32]`. Equivalent to hashing the concatenation of `parts`
/// without allocating the concatenation.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// `domain_separated_hash("pawn-asset", data)` and
/// `domain_separated_hash("pawn-label", data)` never collide, even for
/// identical `data`.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        let hash = sha256_multi(&[b""]);
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn sha256_multi_matches_concatenation() {
        let multi = sha256_multi(&[b"pawn", b"_loan"]);
        let single = sha256_multi(&[b"pawn_loan"]);
        assert_eq!(multi, single);
    }

    #[test]
    fn test_domain_separation() {
        let data = b"same data";
        let hash_a = domain_separated_hash("context-a", data);
        let hash_b = domain_separated_hash("context-b", data);
        assert_ne!(hash_a, hash_b);
        assert_ne!(hash_a, *blake3::hash(data).as_bytes());
    }

    #[test]
    fn domain_separated_hash_is_deterministic() {
        assert_eq!(
            domain_separated_hash("pawn-test", b"pawn"),
            domain_separated_hash("pawn-test", b"pawn")
        );
        assert_ne!(
            domain_separated_hash("pawn-test", b"pawn"),
            domain_separated_hash("pawn-test", b"Pawn")
        );
    }
}
