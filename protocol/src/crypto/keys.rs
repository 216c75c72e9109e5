//! # Key Handling
//!
//! secp256k1 public keys and recoverable signatures. Addresses are the last
//! 20 bytes of the Keccak-256 hash of the uncompressed public key (without
//! its `0x04` tag byte).
//!
//! Key bytes are never logged.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

use super::hash::keccak256;
use crate::address::Address;
use crate::config::SIGNATURE_LENGTH;
use crate::error::{MeshError, Result};

/// Derives the account address of a SEC1-encoded public key, compressed
/// (33 bytes) or uncompressed (65 bytes).
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address> {
    let key = PublicKey::from_sec1_bytes(public_key)
        .map_err(|_| MeshError::InvalidPublicKey("not a valid secp256k1 point".to_string()))?;
    Ok(address_from_point(&key))
}

fn address_from_point(key: &PublicKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

/// Recovers the signer of a 32-byte hash from a 65-byte `r ‖ s ‖ v`
/// signature, `v` being 0 or 1.
pub fn recover_address(hash: &[u8; 32], signature: &[u8]) -> Result<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(MeshError::InvalidSignature(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| MeshError::InvalidSignature(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(signature[64])
        .ok_or_else(|| MeshError::InvalidSignature("recovery id must be 0 or 1".to_string()))?;
    let key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|e| MeshError::InvalidSignature(e.to_string()))?;
    Ok(address_from_point(&PublicKey::from(&key)))
}

/// Signs a 32-byte hash, returning the 65-byte recoverable form the chain
/// expects. Used by tooling and tests; the service itself never signs.
pub fn sign_hash(key: &SigningKey, hash: &[u8; 32]) -> Result<[u8; SIGNATURE_LENGTH]> {
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(hash)
        .map_err(|e| MeshError::InvalidSignature(e.to_string()))?;
    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&sig.to_bytes());
    out[64] = recovery_id.to_byte();
    Ok(out)
}

/// Address controlled by a signing key.
pub fn signing_key_address(key: &SigningKey) -> Address {
    address_from_point(&PublicKey::from(key.verifying_key()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::blake2b256;

    fn key(byte: u8) -> SigningKey {
        SigningKey::from_slice(&[byte; 32]).unwrap()
    }

    #[test]
    fn known_private_key_address() {
        // Private key 1 maps to the well-known generator-point address.
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let sk = SigningKey::from_slice(&secret).unwrap();
        assert_eq!(
            signing_key_address(&sk).to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn compressed_and_uncompressed_agree() {
        let sk = key(3);
        let vk = sk.verifying_key();
        let compressed = vk.to_encoded_point(true);
        let uncompressed = vk.to_encoded_point(false);
        let a = address_from_public_key(compressed.as_bytes()).unwrap();
        let b = address_from_public_key(uncompressed.as_bytes()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, signing_key_address(&sk));
    }

    #[test]
    fn sign_then_recover() {
        let sk = key(9);
        let hash = blake2b256(b"payload");
        let sig = sign_hash(&sk, &hash).unwrap();
        assert!(sig[64] <= 1);
        assert_eq!(recover_address(&hash, &sig).unwrap(), signing_key_address(&sk));
    }

    #[test]
    fn recover_rejects_bad_input() {
        let hash = blake2b256(b"payload");
        assert!(matches!(
            recover_address(&hash, &[0u8; 64]),
            Err(MeshError::InvalidSignature(_))
        ));
        let mut sig = sign_hash(&key(9), &hash).unwrap();
        sig[64] = 7;
        assert!(recover_address(&hash, &sig).is_err());
    }

    #[test]
    fn invalid_public_key_rejected() {
        assert!(matches!(
            address_from_public_key(&[0x02; 10]),
            Err(MeshError::InvalidPublicKey(_))
        ));
    }
}
