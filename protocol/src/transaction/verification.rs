//! Signature checks against declared signers.
//!
//! Checks run cheapest first: slot widths, then origin recovery, then
//! delegator recovery. The first failure is returned.

use super::builder::Transaction;
use crate::address::Address;
use crate::config::SIGNATURE_LENGTH;
use crate::crypto::recover_address;
use crate::error::{MeshError, Result};

/// Which signer a signature slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    Origin,
    Delegator,
}

/// Verifies that `signature` over `hash` was produced by `expected`.
pub fn verify_slot(
    hash: &[u8; 32],
    signature: &[u8],
    expected: &Address,
    role: SignerRole,
) -> Result<()> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(MeshError::InvalidSignature(format!(
            "{:?} signature must be {} bytes, got {}",
            role,
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }
    let actual = recover_address(hash, signature)?;
    if actual != *expected {
        let (expected, actual) = (expected.to_string(), actual.to_string());
        return Err(match role {
            SignerRole::Origin => MeshError::OriginMismatch { expected, actual },
            SignerRole::Delegator => MeshError::DelegatorMismatch { expected, actual },
        });
    }
    Ok(())
}

/// Verifies a signed transaction against the origin and delegator it
/// claims.
pub fn verify_signers(
    tx: &Transaction,
    origin: &Address,
    delegator: Option<&Address>,
) -> Result<()> {
    let expected_len = tx.signer_count() * SIGNATURE_LENGTH;
    if tx.signature.len() != expected_len {
        return Err(MeshError::InvalidSignature(format!(
            "expected {} signature bytes, got {}",
            expected_len,
            tx.signature.len()
        )));
    }
    if tx.is_delegated() != delegator.is_some() {
        return Err(MeshError::InvalidSignature(
            "delegation flag does not match delegator".into(),
        ));
    }

    verify_slot(
        &tx.signing_hash(),
        &tx.signature[..SIGNATURE_LENGTH],
        origin,
        SignerRole::Origin,
    )?;

    if let Some(delegator) = delegator {
        verify_slot(
            &tx.delegator_signing_hash(origin),
            &tx.signature[SIGNATURE_LENGTH..],
            delegator,
            SignerRole::Delegator,
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
