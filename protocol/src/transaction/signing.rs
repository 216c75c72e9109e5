//! Signing hashes, signature attachment and signer recovery.
//!
//! A transaction needs one recoverable secp256k1 signature from its origin
//! over the signing hash. A fee-delegated transaction additionally needs
//! the delegator's signature over `blake2b256(signingHash ‖ origin)`, and
//! the two are concatenated origin first.

use k256::ecdsa::SigningKey;

use super::builder::Transaction;
use super::codec;
use crate::address::Address;
use crate::config::SIGNATURE_LENGTH;
use crate::crypto::{blake2b256, blake2b256_concat, recover_address, sign_hash};
use crate::crypto::keys::signing_key_address;
use crate::error::{MeshError, Result};

impl Transaction {
    /// Hash the origin signs.
    pub fn signing_hash(&self) -> [u8; 32] {
        blake2b256(&codec::encode_signing_body(self))
    }

    /// Hash the delegator signs, binding the origin that asked for
    /// sponsorship.
    pub fn delegator_signing_hash(&self, origin: &Address) -> [u8; 32] {
        blake2b256_concat(&[&self.signing_hash(), origin.as_bytes()])
    }

    /// Chain-level transaction identifier.
    pub fn id(&self, origin: &Address) -> [u8; 32] {
        blake2b256_concat(&[&self.signing_hash(), origin.as_bytes()])
    }

    /// Recovers the origin from the first signature slot.
    pub fn recover_origin(&self) -> Result<Address> {
        let slot = self
            .signature
            .get(..SIGNATURE_LENGTH)
            .ok_or_else(|| MeshError::InvalidSignature("transaction is not signed".into()))?;
        recover_address(&self.signing_hash(), slot)
    }

    /// Recovers the delegator from the second slot. `None` unless the
    /// transaction is fee-delegated.
    pub fn recover_delegator(&self, origin: &Address) -> Result<Option<Address>> {
        if !self.is_delegated() {
            return Ok(None);
        }
        let slot = self
            .signature
            .get(SIGNATURE_LENGTH..2 * SIGNATURE_LENGTH)
            .ok_or_else(|| MeshError::InvalidSignature("missing delegator signature".into()))?;
        recover_address(&self.delegator_signing_hash(origin), slot).map(Some)
    }
}

/// The hashes each signer must sign, origin first.
pub fn signing_payloads(tx: &Transaction, origin: &Address) -> Vec<[u8; 32]> {
    let mut payloads = vec![tx.signing_hash()];
    if tx.is_delegated() {
        payloads.push(tx.delegator_signing_hash(origin));
    }
    payloads
}

/// Signs with the origin key and returns a signed copy.
pub fn sign_transaction(tx: &Transaction, origin_key: &SigningKey) -> Result<Transaction> {
    let signature = sign_hash(origin_key, &tx.signing_hash())?;
    Ok(tx.with_signature(signature.to_vec()))
}

/// Signs a fee-delegated transaction with both keys.
pub fn sign_delegated(
    tx: &Transaction,
    origin_key: &SigningKey,
    delegator_key: &SigningKey,
) -> Result<Transaction> {
    if !tx.is_delegated() {
        return Err(MeshError::InvalidSignature(
            "transaction is not fee-delegated".into(),
        ));
    }
    let origin = signing_key_address(origin_key);
    let origin_sig = sign_hash(origin_key, &tx.signing_hash())?;
    let delegator_sig = sign_hash(delegator_key, &tx.delegator_signing_hash(&origin))?;

    let mut signature = Vec::with_capacity(2 * SIGNATURE_LENGTH);
    signature.extend_from_slice(&origin_sig);
    signature.extend_from_slice(&delegator_sig);
    Ok(tx.with_signature(signature))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::builder::TransactionBuilder;
    use crate::transaction::clause::Clause;
    use primitive_types::U256;

    fn key(byte: u8) -> SigningKey {
        SigningKey::from_slice(&[byte; 32]).unwrap()
    }

    fn sample_tx(delegated: bool) -> Transaction {
        TransactionBuilder::new(0x27)
            .block_ref(1)
            .expiration(720)
            .clause(Clause::transfer(Address::from_bytes([0x09; 20]), U256::one()))
            .gas(21_000)
            .nonce(99)
            .delegated(delegated)
            .build()
    }

    #[test]
    fn signing_recovers_origin() {
        let k = key(0x11);
        let signed = sign_transaction(&sample_tx(false), &k).unwrap();
        assert_eq!(signed.signature.len(), 65);
        assert_eq!(signed.recover_origin().unwrap(), signing_key_address(&k));
        assert_eq!(signed.recover_delegator(&signing_key_address(&k)).unwrap(), None);
    }

    #[test]
    fn signing_does_not_change_signing_hash() {
        let tx = sample_tx(false);
        let signed = sign_transaction(&tx, &key(0x11)).unwrap();
        assert_eq!(tx.signing_hash(), signed.signing_hash());
    }

    #[test]
    fn delegated_signing_recovers_both() {
        let origin_key = key(0x11);
        let delegator_key = key(0x22);
        let origin = signing_key_address(&origin_key);

        let signed = sign_delegated(&sample_tx(true), &origin_key, &delegator_key).unwrap();
        assert_eq!(signed.signature.len(), 130);
        assert_eq!(signed.recover_origin().unwrap(), origin);
        assert_eq!(
            signed.recover_delegator(&origin).unwrap(),
            Some(signing_key_address(&delegator_key))
        );
    }

    #[test]
    fn sign_delegated_requires_feature() {
        assert!(sign_delegated(&sample_tx(false), &key(1), &key(2)).is_err());
    }

    #[test]
    fn payloads_follow_signer_order() {
        let origin = Address::from_bytes([0x44; 20]);
        let tx = sample_tx(true);
        let payloads = signing_payloads(&tx, &origin);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], tx.signing_hash());
        assert_eq!(payloads[1], tx.delegator_signing_hash(&origin));
        assert_eq!(signing_payloads(&sample_tx(false), &origin).len(), 1);
    }

    #[test]
    fn id_depends_on_origin() {
        let tx = sample_tx(false);
        assert_ne!(
            tx.id(&Address::from_bytes([1; 20])),
            tx.id(&Address::from_bytes([2; 20]))
        );
    }

    #[test]
    fn unsigned_has_no_origin() {
        assert!(sample_tx(false).recover_origin().is_err());
    }
}
