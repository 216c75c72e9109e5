//! Read-only queries over an operation list, used by preprocess and
//! payloads to discover who signs and what moves.

use super::types::{Amount, Operation, OperationType, FEE_DELEGATOR_ACCOUNT};
use crate::address::Address;
use crate::error::{MeshError, Result};

/// Accounts that pay in `ops`, in first-seen order.
///
/// Fee operations, contract calls and negative transfers name a payer.
/// Duplicates are dropped; addresses compare case-insensitively because
/// they are parsed before comparison.
pub fn origins(ops: &[Operation]) -> Result<Vec<Address>> {
    let mut found: Vec<Address> = Vec::new();
    for op in ops {
        let pays = match op.op_type {
            OperationType::Fee | OperationType::FeeDelegation | OperationType::ContractCall => true,
            OperationType::Transfer => op.amount.signed_value()?.0,
        };
        if !pays {
            continue;
        }
        let address = op.account.parse()?;
        if !found.contains(&address) {
            found.push(address);
        }
    }
    Ok(found)
}

/// The single origin of `ops`.
pub fn origin(ops: &[Operation]) -> Result<Address> {
    let found = origins(ops)?;
    match found.as_slice() {
        [] => Err(MeshError::NoTransferOperation),
        [one] => Ok(*one),
        _ => Err(MeshError::TransactionMultipleOrigins),
    }
}

/// Delegator named by a `FeeDelegation` operation, if any.
pub fn delegator(ops: &[Operation]) -> Result<Option<Address>> {
    for op in ops {
        if op.op_type != OperationType::FeeDelegation {
            continue;
        }
        if let Some(raw) = op.metadata_str(FEE_DELEGATOR_ACCOUNT) {
            return raw.parse().map(Some);
        }
    }
    Ok(None)
}

/// Native-coin transfer operations (both sides).
pub fn vet_transfers(ops: &[Operation]) -> Vec<&Operation> {
    ops.iter()
        .filter(|op| op.op_type == OperationType::Transfer && is_native(&op.amount))
        .collect()
}

/// Token transfer operations (both sides).
pub fn token_transfers(ops: &[Operation]) -> Vec<&Operation> {
    ops.iter()
        .filter(|op| op.op_type == OperationType::Transfer && !is_native(&op.amount))
        .collect()
}

/// `true` when some operation moves value.
pub fn has_transfer(ops: &[Operation]) -> bool {
    ops.iter().any(|op| op.op_type == OperationType::Transfer)
}

/// The gas declared by the fee operation, if any.
pub fn declared_gas(ops: &[Operation]) -> Result<Option<u64>> {
    let Some(fee) = ops
        .iter()
        .find(|op| matches!(op.op_type, OperationType::Fee | OperationType::FeeDelegation))
    else {
        return Ok(None);
    };
    let (_, magnitude) = fee.amount.signed_value()?;
    if magnitude.bits() > 64 {
        return Err(MeshError::InvalidOperation(format!(
            "fee operation {} declares more than 64 bits of gas",
            fee.index()
        )));
    }
    Ok(Some(magnitude.low_u64()))
}

fn is_native(amount: &Amount) -> bool {
    amount.currency.metadata.is_none()
}
