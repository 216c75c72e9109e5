//! RLP wire codec for native transactions.
//!
//! ```text
//! legacy:   rlp([chainTag, blockRef, expiration, clauses, gasPriceCoef,
//!                gas, dependsOn, nonce, reserved, signature])
//! dynamic:  0x51 ‖ rlp([chainTag, blockRef, expiration, clauses,
//!                maxPriorityFeePerGas, maxFeePerGas, gas, dependsOn,
//!                nonce, reserved, signature])
//! ```
//!
//! The signing body is the same list without its trailing signature item.
//! Decoding is strict: every integer must be canonical, every fixed-width
//! field must have its exact width, and no bytes may follow the list.

use primitive_types::U256;
use rlp::{Rlp, RlpStream};

use super::builder::{FeeParams, Reserved, Transaction};
use super::clause::Clause;
use crate::address::{Address, ADDRESS_LENGTH};
use crate::config::DYNAMIC_FEE_TX_TYPE;
use crate::error::{MeshError, Result};

const LEGACY_FIELDS: usize = 10;
const DYNAMIC_FIELDS: usize = 11;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Full wire encoding, signature included (empty when unsigned).
pub fn encode(tx: &Transaction) -> Vec<u8> {
    encode_body(tx, true)
}

/// Encoding hashed for signing: identical to [`encode`] minus the signature.
pub fn encode_signing_body(tx: &Transaction) -> Vec<u8> {
    encode_body(tx, false)
}

fn encode_body(tx: &Transaction, with_signature: bool) -> Vec<u8> {
    let fields = match tx.fee {
        FeeParams::Legacy { .. } => LEGACY_FIELDS,
        FeeParams::DynamicFee { .. } => DYNAMIC_FIELDS,
    } - usize::from(!with_signature);

    let mut s = RlpStream::new_list(fields);
    s.append(&tx.chain_tag);
    s.append(&tx.block_ref);
    s.append(&tx.expiration);
    append_clauses(&mut s, &tx.clauses);
    match tx.fee {
        FeeParams::Legacy { gas_price_coef } => {
            s.append(&gas_price_coef);
        }
        FeeParams::DynamicFee {
            max_priority_fee_per_gas,
            max_fee_per_gas,
        } => {
            append_uint(&mut s, &max_priority_fee_per_gas);
            append_uint(&mut s, &max_fee_per_gas);
        }
    }
    s.append(&tx.gas);
    match &tx.depends_on {
        Some(id) => {
            s.append(&id.to_vec());
        }
        None => {
            s.append_empty_data();
        }
    }
    s.append(&tx.nonce);
    append_reserved(&mut s, &tx.reserved);
    if with_signature {
        s.append(&tx.signature);
    }

    let body = s.out().to_vec();
    if tx.fee.is_dynamic() {
        let mut typed = Vec::with_capacity(body.len() + 1);
        typed.push(DYNAMIC_FEE_TX_TYPE);
        typed.extend_from_slice(&body);
        typed
    } else {
        body
    }
}

fn append_clauses(s: &mut RlpStream, clauses: &[Clause]) {
    s.begin_list(clauses.len());
    for clause in clauses {
        s.begin_list(3);
        match &clause.to {
            Some(to) => {
                s.append(&to.as_bytes().to_vec());
            }
            None => {
                s.append_empty_data();
            }
        }
        append_uint(s, &clause.value);
        s.append(&clause.data);
    }
}

/// Big-endian with leading zero bytes stripped; zero is the empty string.
fn append_uint(s: &mut RlpStream, value: &U256) {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let first = buf.iter().position(|b| *b != 0).unwrap_or(buf.len());
    s.append(&buf[first..].to_vec());
}

/// `[features, unused...]` with trailing empty entries trimmed.
fn append_reserved(s: &mut RlpStream, reserved: &Reserved) {
    let features = reserved.features.to_be_bytes();
    let first = features.iter().position(|b| *b != 0).unwrap_or(features.len());

    let mut entries: Vec<Vec<u8>> = Vec::with_capacity(1 + reserved.unused.len());
    entries.push(features[first..].to_vec());
    entries.extend(reserved.unused.iter().cloned());
    while entries.last().map_or(false, |e| e.is_empty()) {
        entries.pop();
    }

    s.begin_list(entries.len());
    for entry in &entries {
        s.append(entry);
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes a full wire encoding produced by [`encode`] (or by the chain).
pub fn decode(bytes: &[u8]) -> Result<Transaction> {
    let (dynamic, body) = match bytes.first() {
        None => return Err(MeshError::Decode("empty input".into())),
        Some(&DYNAMIC_FEE_TX_TYPE) => (true, &bytes[1..]),
        Some(b) if *b >= 0xc0 => (false, bytes),
        Some(b) => {
            return Err(MeshError::Decode(format!(
                "unknown transaction type 0x{:02x}",
                b
            )))
        }
    };

    let rlp = Rlp::new(body);
    expect_exact_list(&rlp, body.len())?;

    let expected = if dynamic { DYNAMIC_FIELDS } else { LEGACY_FIELDS };
    let count = rlp.item_count()?;
    if count != expected {
        return Err(MeshError::Decode(format!(
            "expected {} fields, got {}",
            expected, count
        )));
    }

    let chain_tag: u8 = rlp.val_at(0)?;
    let block_ref: u64 = rlp.val_at(1)?;
    let expiration: u32 = rlp.val_at(2)?;
    let clauses = decode_clauses(&rlp.at(3)?)?;

    let (fee, next) = if dynamic {
        let max_priority_fee_per_gas = decode_uint(&rlp.at(4)?)?;
        let max_fee_per_gas = decode_uint(&rlp.at(5)?)?;
        (
            FeeParams::DynamicFee {
                max_priority_fee_per_gas,
                max_fee_per_gas,
            },
            6,
        )
    } else {
        let gas_price_coef: u8 = rlp.val_at(4)?;
        (FeeParams::Legacy { gas_price_coef }, 5)
    };

    let gas: u64 = rlp.val_at(next)?;
    let depends_on = decode_depends_on(&rlp.at(next + 1)?)?;
    let nonce: u64 = rlp.val_at(next + 2)?;
    let reserved = decode_reserved(&rlp.at(next + 3)?)?;
    let signature: Vec<u8> = rlp.val_at(next + 4)?;

    Ok(Transaction {
        chain_tag,
        block_ref,
        expiration,
        clauses,
        fee,
        gas,
        depends_on,
        nonce,
        reserved,
        signature,
    })
}

/// The input must be one list spanning exactly `len` bytes.
pub(crate) fn expect_exact_list(rlp: &Rlp, len: usize) -> Result<()> {
    if !rlp.is_list() {
        return Err(MeshError::Decode("expected an RLP list".into()));
    }
    let info = rlp.payload_info()?;
    let total = info.header_len + info.value_len;
    if total != len {
        return Err(MeshError::Decode(format!(
            "list spans {} bytes but input has {}",
            total, len
        )));
    }
    Ok(())
}

fn decode_clauses(rlp: &Rlp) -> Result<Vec<Clause>> {
    if !rlp.is_list() {
        return Err(MeshError::Decode("clauses must be a list".into()));
    }
    let mut clauses = Vec::with_capacity(rlp.item_count()?);
    for item in rlp.iter() {
        if !item.is_list() || item.item_count()? != 3 {
            return Err(MeshError::Decode("clause must be a 3-item list".into()));
        }
        let to = decode_optional_address(&item.at(0)?)?;
        let value = decode_uint(&item.at(1)?)?;
        let data: Vec<u8> = item.val_at(2)?;
        clauses.push(Clause { to, value, data });
    }
    Ok(clauses)
}

pub(crate) fn decode_optional_address(rlp: &Rlp) -> Result<Option<Address>> {
    let data = rlp.data()?;
    match data.len() {
        0 => Ok(None),
        ADDRESS_LENGTH => Ok(Some(Address::from_slice(data)?)),
        n => Err(MeshError::Decode(format!("address must be 20 bytes, got {}", n))),
    }
}

fn decode_uint(rlp: &Rlp) -> Result<U256> {
    let data = rlp.data()?;
    if data.len() > 32 {
        return Err(MeshError::Decode("integer wider than 256 bits".into()));
    }
    if data.first() == Some(&0) {
        return Err(MeshError::Decode("integer has leading zero bytes".into()));
    }
    Ok(U256::from_big_endian(data))
}

fn decode_depends_on(rlp: &Rlp) -> Result<Option<[u8; 32]>> {
    let data = rlp.data()?;
    match data.len() {
        0 => Ok(None),
        32 => {
            let mut id = [0u8; 32];
            id.copy_from_slice(data);
            Ok(Some(id))
        }
        n => Err(MeshError::Decode(format!("dependsOn must be 32 bytes, got {}", n))),
    }
}

fn decode_reserved(rlp: &Rlp) -> Result<Reserved> {
    if !rlp.is_list() {
        return Err(MeshError::Decode("reserved must be a list".into()));
    }
    let count = rlp.item_count()?;
    if count == 0 {
        return Ok(Reserved::default());
    }
    let last: Vec<u8> = rlp.val_at(count - 1)?;
    if last.is_empty() {
        return Err(MeshError::Decode("reserved fields not trimmed".into()));
    }
    let features: u32 = rlp.val_at(0)?;
    let mut unused = Vec::with_capacity(count - 1);
    for i in 1..count {
        unused.push(rlp.val_at::<Vec<u8>>(i)?);
    }
    Ok(Reserved { features, unused })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
