//! # Cryptographic Primitives
//!
//! Thin wrappers over audited implementations:
//!
//! - **BLAKE2b-256** for signing hashes and transaction ids.
//! - **Keccak-256** for address derivation and ABI selectors.
//! - **secp256k1** recoverable ECDSA for signer recovery.

pub mod hash;
pub mod keys;

pub use hash::{blake2b256, blake2b256_concat, keccak256};
pub use keys::{address_from_public_key, recover_address, sign_hash};
