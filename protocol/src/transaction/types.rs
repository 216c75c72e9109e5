//! Core type definitions shared by the mapper, builder and pipeline.
//!
//! These mirror the Mesh data model: an [`Operation`] is one balance
//! change (or contract interaction) of one account, expressed as an
//! [`Amount`] in a [`Currency`]. Amount values are signed decimal strings
//! so that 256-bit quantities survive JSON untouched.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::address::Address;
use crate::error::{MeshError, Result};

// ---------------------------------------------------------------------------
// OperationType
// ---------------------------------------------------------------------------

/// What an operation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    /// One side of a value movement (native coin or token).
    Transfer,
    /// Gas paid by the origin.
    Fee,
    /// Gas of a fee-delegated transaction. Still debits the origin; the
    /// delegator is named in the metadata only.
    FeeDelegation,
    /// Contract interaction without a value movement of its own.
    ContractCall,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "Transfer"),
            Self::Fee => write!(f, "Fee"),
            Self::FeeDelegation => write!(f, "FeeDelegation"),
            Self::ContractCall => write!(f, "ContractCall"),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationStatus
// ---------------------------------------------------------------------------

/// Execution status attached to operations read from the chain.
/// Operations produced for construction carry no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    None,
    Pending,
    Succeeded,
    Reverted,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Pending => write!(f, "Pending"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Reverted => write!(f, "Reverted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Contract metadata of a token currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyMetadata {
    /// Lowercase `0x` hex contract address.
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
}

/// A currency: the native coin (no metadata) or a token contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub symbol: String,
    pub decimals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CurrencyMetadata>,
}

impl Currency {
    /// Token currency for a contract.
    pub fn token(symbol: impl Into<String>, decimals: u32, contract: &Address) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            metadata: Some(CurrencyMetadata {
                contract_address: contract.to_string(),
            }),
        }
    }

    /// Parsed contract address, `None` for the native coin or a malformed
    /// address.
    pub fn contract_address(&self) -> Option<Address> {
        self.metadata
            .as_ref()
            .and_then(|m| m.contract_address.parse().ok())
    }

    /// Two currencies are the same entity iff their contract addresses match
    /// case-insensitively; contract-less currencies match by symbol.
    pub fn same_as(&self, other: &Currency) -> bool {
        match (&self.metadata, &other.metadata) {
            (Some(a), Some(b)) => a.contract_address.eq_ignore_ascii_case(&b.contract_address),
            (None, None) => self.symbol == other.symbol,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A signed quantity of a currency, in its smallest unit.
///
/// `value` is a decimal string with an optional leading `-`. Zero is always
/// rendered `"0"`, never `"-0"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: Currency,
}

impl Amount {
    /// Positive side of a movement.
    pub fn credit(value: U256, currency: Currency) -> Self {
        Self {
            value: value.to_string(),
            currency,
        }
    }

    /// Negative side of a movement.
    pub fn debit(value: U256, currency: Currency) -> Self {
        let value = if value.is_zero() {
            "0".to_string()
        } else {
            format!("-{}", value)
        };
        Self { value, currency }
    }

    /// Splits the value into `(is_negative, magnitude)`.
    pub fn signed_value(&self) -> Result<(bool, U256)> {
        let (negative, digits) = match self.value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, self.value.as_str()),
        };
        let magnitude = U256::from_dec_str(digits)
            .map_err(|_| MeshError::InvalidValue(format!("not a decimal amount: {}", self.value)))?;
        Ok((negative && !magnitude.is_zero(), magnitude))
    }

    pub fn is_negative(&self) -> bool {
        matches!(self.signed_value(), Ok((true, _)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency.symbol)
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationIdentifier {
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentifier {
    pub address: String,
}

impl AccountIdentifier {
    pub fn new(address: &Address) -> Self {
        Self {
            address: address.to_string(),
        }
    }

    pub fn parse(&self) -> Result<Address> {
        self.address.parse()
    }
}

/// One entry of a transaction's operation list.
///
/// Indexes are positional: contiguous from 0 within one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_identifier: OperationIdentifier,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    pub account: AccountIdentifier,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Operation {
    pub fn new(
        index: usize,
        op_type: OperationType,
        status: Option<OperationStatus>,
        account: &Address,
        amount: Amount,
    ) -> Self {
        Self {
            operation_identifier: OperationIdentifier {
                index: index as i64,
            },
            op_type,
            status,
            account: AccountIdentifier::new(account),
            amount,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn index(&self) -> i64 {
        self.operation_identifier.index
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Operation metadata key naming the fee delegator.
pub const FEE_DELEGATOR_ACCOUNT: &str = "fee_delegator_account";

// ---------------------------------------------------------------------------
// Quantities
// ---------------------------------------------------------------------------

/// Parses a non-negative integer given as decimal or `0x` hex. The empty
/// string and a bare `0x` both mean zero.
pub fn parse_quantity(s: &str) -> Result<U256> {
    if s.is_empty() {
        return Ok(U256::zero());
    }
    if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex_digits.is_empty() {
            return Ok(U256::zero());
        }
        if hex_digits.len() > 64 || !hex_digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MeshError::InvalidValue(format!("not a hex quantity: {}", s)));
        }
        return U256::from_str_radix(hex_digits, 16)
            .map_err(|_| MeshError::InvalidValue(format!("not a hex quantity: {}", s)));
    }
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(MeshError::InvalidValue(format!("not a number: {}", s)));
    }
    U256::from_dec_str(s).map_err(|_| MeshError::InvalidValue(format!("out of range: {}", s)))
}

/// `0x`-prefixed minimal hex rendering of a quantity (`0x0` for zero).
pub fn quantity_to_hex(value: &U256) -> String {
    format!("{:#x}", value)
}

/// Decodes `0x`-prefixed, even-length hex bytes. `0x` alone is empty.
pub fn decode_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| MeshError::InvalidHex(format!("missing 0x prefix: {}", s)))?;
    if digits.len() % 2 != 0 {
        return Err(MeshError::InvalidHex(format!("odd length: {}", s)));
    }
    hex::decode(digits).map_err(|_| MeshError::InvalidHex(format!("not hex: {}", s)))
}

/// `0x`-prefixed lowercase hex.
pub fn encode_hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{vet_currency, vtho_currency};

    #[test]
    fn operation_type_display() {
        assert_eq!(OperationType::Transfer.to_string(), "Transfer");
        assert_eq!(OperationType::FeeDelegation.to_string(), "FeeDelegation");
    }

    #[test]
    fn operation_status_display() {
        assert_eq!(OperationStatus::Succeeded.to_string(), "Succeeded");
        assert_eq!(OperationStatus::None.to_string(), "None");
    }

    #[test]
    fn amount_signs() {
        let one = U256::from(1_000u64);
        assert_eq!(Amount::debit(one, vet_currency()).value, "-1000");
        assert_eq!(Amount::credit(one, vet_currency()).value, "1000");
        assert_eq!(Amount::debit(U256::zero(), vet_currency()).value, "0");

        let (neg, mag) = Amount::debit(one, vet_currency()).signed_value().unwrap();
        assert!(neg);
        assert_eq!(mag, one);
        assert!(!Amount::credit(one, vet_currency()).is_negative());
    }

    #[test]
    fn currency_identity_by_contract_case_insensitive() {
        let mut upper = vtho_currency();
        upper.metadata.as_mut().unwrap().contract_address =
            "0x0000000000000000000000000000456E65726779".to_string();
        upper.symbol = "ENERGY".to_string();
        assert!(upper.same_as(&vtho_currency()));
        assert!(!vet_currency().same_as(&vtho_currency()));
        assert!(vet_currency().same_as(&vet_currency()));
    }

    #[test]
    fn currency_json_shape() {
        let json = serde_json::to_value(vtho_currency()).unwrap();
        assert_eq!(json["symbol"], "VTHO");
        assert_eq!(json["decimals"], 18);
        assert_eq!(
            json["metadata"]["contractAddress"],
            "0x0000000000000000000000000000456e65726779"
        );
        let vet = serde_json::to_value(vet_currency()).unwrap();
        assert!(vet.get("metadata").is_none());
    }

    #[test]
    fn operation_json_shape() {
        let op = Operation::new(
            0,
            OperationType::Fee,
            None,
            &Address::from_bytes([1; 20]),
            Amount::debit(U256::from(21_000u64), vtho_currency()),
        )
        .with_metadata("gas", "21000");
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["operation_identifier"]["index"], 0);
        assert_eq!(json["type"], "Fee");
        assert!(json.get("status").is_none());
        assert_eq!(json["amount"]["value"], "-21000");
        assert_eq!(json["metadata"]["gas"], "21000");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("").unwrap(), U256::zero());
        assert_eq!(parse_quantity("0x").unwrap(), U256::zero());
        assert_eq!(parse_quantity("0x10").unwrap(), U256::from(16u64));
        assert_eq!(
            parse_quantity("1000000000000000000").unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert!(parse_quantity("not_a_number").is_err());
        assert!(parse_quantity("-1").is_err());
        assert!(parse_quantity("0xzz").is_err());
        assert!(parse_quantity(&format!("0x1{}", "0".repeat(64))).is_err());
        assert_eq!(quantity_to_hex(&U256::zero()), "0x0");
        assert_eq!(quantity_to_hex(&U256::from(255u64)), "0xff");
    }

    #[test]
    fn hex_bytes() {
        assert_eq!(decode_hex_bytes("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_hex_bytes("0xabcd").unwrap(), vec![0xab, 0xcd]);
        assert!(decode_hex_bytes("abcd").is_err());
        assert!(decode_hex_bytes("0xabc").is_err());
        assert!(decode_hex_bytes("0xzz").is_err());
        assert_eq!(encode_hex_bytes(&[0x01, 0xff]), "0x01ff");
    }
}
