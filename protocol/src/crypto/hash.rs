//! # Hashing Utilities
//!
//! Two hash functions, each for a fixed job:
//!
//! - **BLAKE2b-256** — transaction signing hashes and ids, as defined by
//!   the chain.
//! - **Keccak-256** — address derivation from public keys and the 4-byte
//!   ABI method selectors.

use blake2::{digest::consts::U32, Blake2b, Digest};
use tiny_keccak::{Hasher, Keccak};

type Blake2b256 = Blake2b<U32>;

/// Compute the BLAKE2b-256 hash of the input data.
///
/// # Example
///
/// ```
/// use thor_mesh::crypto::blake2b256;
///
/// let hash = blake2b256(b"thor");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    blake2b256_concat(&[data])
}

/// BLAKE2b-256 over the concatenation of `parts`, without allocating the
/// concatenation.
pub fn blake2b256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Compute the Keccak-256 hash (the pre-standard SHA-3 variant).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b256_known_vector() {
        // BLAKE2b-256 of the empty string.
        assert_eq!(
            hex::encode(blake2b256(b"")),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    #[test]
    fn keccak256_known_vector() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn concat_equals_hash_of_concatenation() {
        let joined = [b"signing".as_slice(), b"hash".as_slice()].concat();
        assert_eq!(
            blake2b256_concat(&[b"signing", b"hash"]),
            blake2b256(&joined)
        );
    }

    #[test]
    fn hashes_are_deterministic_and_distinct() {
        assert_eq!(blake2b256(b"a"), blake2b256(b"a"));
        assert_ne!(blake2b256(b"a"), blake2b256(b"b"));
        assert_ne!(blake2b256(b"a"), keccak256(b"a"));
    }
}
