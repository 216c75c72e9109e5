//! Declared intent → native clauses.
//!
//! Two entry points:
//!
//! - [`build_clauses`] turns raw JSON clause descriptors (as carried in
//!   preprocess options) into typed clauses, validating each field;
//! - [`clauses_from_operations`] turns the credit side of an operation
//!   list back into the clauses the mapper would read those operations from,
//!   after [`check_balanced`] has paired every credit with its debit.

use primitive_types::U256;
use serde_json::Value;

use super::abi::encode_transfer;
use super::clause::Clause;
use super::extractor;
use super::mapper::{CONTRACT_CALL_DATA, CONTRACT_CALL_TO};
use super::types::{decode_hex_bytes, parse_quantity, Operation, OperationType};
use crate::address::Address;
use crate::config::VET_SYMBOL;
use crate::error::{MeshError, Result};

/// Builds clauses from descriptors `{to?, value, data}`.
///
/// Per descriptor the checks run in this order: the descriptor is an
/// object, `to` (absent or `null` means contract creation) is an address,
/// `value` is a decimal or `0x` hex quantity (empty means zero), `data` is
/// `0x`-prefixed even-length hex. The first failure rejects the whole list.
pub fn build_clauses(raw: &[Value]) -> Result<Vec<Clause>> {
    raw.iter()
        .enumerate()
        .map(|(i, descriptor)| build_clause(i, descriptor))
        .collect()
}

fn build_clause(index: usize, descriptor: &Value) -> Result<Clause> {
    let map = descriptor
        .as_object()
        .ok_or_else(|| MeshError::InvalidClause(format!("clause {} is not an object", index)))?;

    let to = match map.get("to") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.parse::<Address>()?),
        Some(other) => {
            return Err(MeshError::InvalidClause(format!(
                "clause {}: `to` must be a string, got {}",
                index, other
            )))
        }
    };

    let value = match map.get("value") {
        Some(Value::String(s)) => parse_quantity(s)?,
        Some(other) => {
            return Err(MeshError::InvalidClause(format!(
                "clause {}: `value` must be a string, got {}",
                index, other
            )))
        }
        None => {
            return Err(MeshError::InvalidClause(format!(
                "clause {}: missing `value`",
                index
            )))
        }
    };

    let data = match map.get("data") {
        Some(Value::String(s)) => decode_hex_bytes(s)?,
        Some(other) => {
            return Err(MeshError::InvalidClause(format!(
                "clause {}: `data` must be a string, got {}",
                index, other
            )))
        }
        None => {
            return Err(MeshError::InvalidClause(format!(
                "clause {}: missing `data`",
                index
            )))
        }
    };

    Ok(Clause { to, value, data })
}

/// Rebuilds clauses from operations.
///
/// Positive `Transfer`s become VET transfers or token `transfer` calls;
/// `ContractCall`s become clauses from their `to`/`data` metadata. Debits
/// and fee operations carry no clause of their own, but every debit must
/// balance a credit (see [`check_balanced`]).
pub fn clauses_from_operations(ops: &[Operation]) -> Result<Vec<Clause>> {
    check_balanced(ops)?;
    let mut clauses = Vec::new();
    for op in ops {
        match op.op_type {
            OperationType::Transfer => {
                let (negative, amount) = op.amount.signed_value()?;
                if negative || amount.is_zero() {
                    continue;
                }
                let account = op.account.parse()?;
                clauses.push(transfer_clause(op, account, amount)?);
            }
            OperationType::ContractCall => {
                op.account.parse()?;
                clauses.push(contract_call_clause(op)?);
            }
            OperationType::Fee | OperationType::FeeDelegation => {}
        }
    }
    Ok(clauses)
}

/// Pairs every non-zero credit `Transfer` with a debit of the same currency
/// and magnitude, VET and token transfers separately. A credit without a
/// debit, or a debit left over, is an `InvalidOperation`.
pub fn check_balanced(ops: &[Operation]) -> Result<()> {
    check_pairs(&extractor::vet_transfers(ops))?;
    check_pairs(&extractor::token_transfers(ops))
}

fn check_pairs(transfers: &[&Operation]) -> Result<()> {
    let mut debits: Vec<(&Operation, U256)> = Vec::new();
    let mut credits: Vec<(&Operation, U256)> = Vec::new();
    for op in transfers {
        let (negative, amount) = op.amount.signed_value()?;
        if amount.is_zero() {
            continue;
        }
        if negative {
            debits.push((*op, amount));
        } else {
            credits.push((*op, amount));
        }
    }

    for (credit, amount) in credits {
        let partner = debits.iter().position(|(debit, value)| {
            *value == amount && debit.amount.currency.same_as(&credit.amount.currency)
        });
        match partner {
            Some(i) => {
                debits.remove(i);
            }
            None => {
                return Err(MeshError::InvalidOperation(format!(
                    "credit operation {} of {} {} has no matching debit",
                    credit.index(),
                    amount,
                    credit.amount.currency.symbol
                )))
            }
        }
    }

    match debits.first() {
        Some((debit, amount)) => Err(MeshError::InvalidOperation(format!(
            "debit operation {} of {} {} has no matching credit",
            debit.index(),
            amount,
            debit.amount.currency.symbol
        ))),
        None => Ok(()),
    }
}

fn transfer_clause(op: &Operation, to: Address, amount: U256) -> Result<Clause> {
    let currency = &op.amount.currency;
    match &currency.metadata {
        None if currency.symbol == VET_SYMBOL => Ok(Clause::transfer(to, amount)),
        None => Err(MeshError::UnsupportedCurrency(currency.symbol.clone())),
        Some(meta) => {
            let contract: Address = meta.contract_address.parse().map_err(|_| {
                MeshError::UnsupportedCurrency(format!(
                    "{} ({})",
                    currency.symbol, meta.contract_address
                ))
            })?;
            Ok(Clause::new(
                Some(contract),
                U256::zero(),
                encode_transfer(&to, &amount),
            ))
        }
    }
}

fn contract_call_clause(op: &Operation) -> Result<Clause> {
    let to = match op.metadata.get(CONTRACT_CALL_TO) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.parse::<Address>()?),
        Some(other) => {
            return Err(MeshError::InvalidOperation(format!(
                "operation {}: `to` metadata must be a string, got {}",
                op.index(),
                other
            )))
        }
    };
    let data = match op.metadata.get(CONTRACT_CALL_DATA) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => decode_hex_bytes(s)?,
        Some(other) => {
            return Err(MeshError::InvalidOperation(format!(
                "operation {}: `data` metadata must be a string, got {}",
                op.index(),
                other
            )))
        }
    };
    Ok(Clause::new(to, U256::zero(), data))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
