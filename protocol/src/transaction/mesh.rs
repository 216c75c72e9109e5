//! The envelope that carries a transaction between construction steps.
//!
//! The native format cannot say who the origin and delegator are until the
//! transaction is signed, so the envelope records them beside the raw
//! bytes:
//!
//! ```text
//! rlp([version = 1, origin (20 bytes), delegator (0 | 20 bytes), raw])
//! ```
//!
//! An absent delegator is encoded as an empty byte string, never omitted.

use rlp::{Rlp, RlpStream};

use super::builder::Transaction;
use super::codec::{self, decode_optional_address, expect_exact_list};
use super::currency::CurrencyResolver;
use super::mapper::map_clauses;
use super::signing::signing_payloads;
use super::types::{decode_hex_bytes, encode_hex_bytes, Operation};
use super::verification::verify_signers;
use crate::address::Address;
use crate::config::SIGNATURE_LENGTH;
use crate::error::{MeshError, Result};

/// Current envelope version.
pub const ENVELOPE_VERSION: u8 = 1;

/// A native transaction plus its declared signers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshTransaction {
    pub tx: Transaction,
    pub origin: Address,
    pub delegator: Option<Address>,
}

impl MeshTransaction {
    /// Wraps `tx`. The delegation feature bit must agree with `delegator`.
    pub fn new(tx: Transaction, origin: Address, delegator: Option<Address>) -> Result<Self> {
        let mesh = Self {
            tx,
            origin,
            delegator,
        };
        mesh.check_delegation()?;
        Ok(mesh)
    }

    /// Origin first, then the delegator when there is one.
    pub fn signers(&self) -> Vec<Address> {
        let mut signers = vec![self.origin];
        signers.extend(self.delegator);
        signers
    }

    /// One hash per signer, in [`signers`](Self::signers) order.
    pub fn signing_payloads(&self) -> Vec<[u8; 32]> {
        signing_payloads(&self.tx, &self.origin)
    }

    /// Returns a new envelope carrying `signature`.
    pub fn with_signature(&self, signature: Vec<u8>) -> Self {
        Self {
            tx: self.tx.with_signature(signature),
            origin: self.origin,
            delegator: self.delegator,
        }
    }

    pub fn id(&self) -> [u8; 32] {
        self.tx.id(&self.origin)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(4);
        s.append(&ENVELOPE_VERSION);
        s.append(&self.origin.as_bytes().to_vec());
        match &self.delegator {
            Some(d) => {
                s.append(&d.as_bytes().to_vec());
            }
            None => {
                s.append_empty_data();
            }
        }
        s.append(&codec::encode(&self.tx));
        s.out().to_vec()
    }

    pub fn encode_hex(&self) -> String {
        encode_hex_bytes(&self.encode())
    }

    /// Decodes an envelope whose transaction must not be signed yet.
    pub fn decode_unsigned(bytes: &[u8]) -> Result<Self> {
        let mesh = Self::decode(bytes)?;
        if mesh.tx.is_signed() {
            return Err(MeshError::Decode("expected an unsigned transaction".into()));
        }
        Ok(mesh)
    }

    /// Decodes an envelope whose transaction carries one signature per
    /// signer.
    pub fn decode_signed(bytes: &[u8]) -> Result<Self> {
        let mesh = Self::decode(bytes)?;
        let expected = mesh.signers().len() * SIGNATURE_LENGTH;
        if mesh.tx.signature.len() != expected {
            return Err(MeshError::Decode(format!(
                "expected {} signature bytes, got {}",
                expected,
                mesh.tx.signature.len()
            )));
        }
        Ok(mesh)
    }

    pub fn decode_unsigned_hex(s: &str) -> Result<Self> {
        Self::decode_unsigned(&decode_hex_bytes(s)?)
    }

    pub fn decode_signed_hex(s: &str) -> Result<Self> {
        Self::decode_signed(&decode_hex_bytes(s)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let rlp = Rlp::new(bytes);
        expect_exact_list(&rlp, bytes.len())?;
        if rlp.item_count()? != 4 {
            return Err(MeshError::Decode("envelope must have 4 fields".into()));
        }
        let version: u8 = rlp.val_at(0)?;
        if version != ENVELOPE_VERSION {
            return Err(MeshError::Decode(format!(
                "unsupported envelope version {}",
                version
            )));
        }
        let origin = decode_optional_address(&rlp.at(1)?)?
            .ok_or_else(|| MeshError::Decode("envelope has no origin".into()))?;
        let delegator = decode_optional_address(&rlp.at(2)?)?;
        let raw: Vec<u8> = rlp.val_at(3)?;
        let tx = codec::decode(&raw)?;

        let mesh = Self {
            tx,
            origin,
            delegator,
        };
        mesh.check_delegation()
            .map_err(|e| MeshError::Decode(e.to_string()))?;
        Ok(mesh)
    }

    fn check_delegation(&self) -> Result<()> {
        if self.tx.is_delegated() != self.delegator.is_some() {
            return Err(MeshError::InvalidRequest(
                "delegation feature does not match delegator".into(),
            ));
        }
        Ok(())
    }

    /// Checks the signatures against the declared origin and delegator.
    pub fn verify_signatures(&self) -> Result<()> {
        verify_signers(&self.tx, &self.origin, self.delegator.as_ref())
    }
}

/// Operations of `mesh` plus its signer list.
///
/// The mapper runs over the envelope's own clauses, gas, origin and
/// delegator. `include_signers == false` yields an empty signer list, as
/// for unsigned transactions whose signers are not yet proven.
pub async fn derive_signers_and_operations(
    resolver: &dyn CurrencyResolver,
    mesh: &MeshTransaction,
    include_signers: bool,
) -> Result<(Vec<Operation>, Vec<Address>)> {
    let ops = map_clauses(
        resolver,
        &mesh.tx.clauses,
        &mesh.origin,
        mesh.delegator.as_ref(),
        mesh.tx.gas,
        None,
    )
    .await?;
    let signers = if include_signers {
        mesh.signers()
    } else {
        Vec::new()
    };
    Ok((ops, signers))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
