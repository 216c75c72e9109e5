//! Error types for the Construction API core.
//!
//! Every fallible operation in this crate returns a [`MeshError`]. Each
//! variant belongs to exactly one [`ErrorClass`], carries a stable numeric
//! code, and knows whether a caller may retry it. Only chain-node failures
//! are retriable; everything else indicates a malformed request, a caller
//! logic bug, corrupt bytes, or a structural mode mismatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = MeshError> = std::result::Result<T, E>;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed fields, rejected before any chain I/O.
    RequestShape,
    /// Well-formed input describing an impossible transaction.
    TransactionSemantics,
    /// Corrupt or truncated transaction bytes.
    Codec,
    /// The chain node failed or did not answer in time.
    ChainNode,
    /// The operation needs a chain node but the service runs offline.
    Mode,
}

/// Which chain-node call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCall {
    BestBlock,
    Block,
    Account,
    ChainTag,
    Submit,
    DynamicGasPrice,
    SyncProgress,
    Peers,
    Mempool,
    ContractCall,
    InspectClauses,
}

impl NodeCall {
    fn code_offset(self) -> u32 {
        match self {
            Self::BestBlock => 0,
            Self::Block => 1,
            Self::Account => 2,
            Self::ChainTag => 3,
            Self::Submit => 4,
            Self::DynamicGasPrice => 5,
            Self::SyncProgress => 6,
            Self::Peers => 7,
            Self::Mempool => 8,
            Self::ContractCall => 9,
            Self::InspectClauses => 10,
        }
    }
}

impl fmt::Display for NodeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BestBlock => "best block",
            Self::Block => "block",
            Self::Account => "account",
            Self::ChainTag => "chain tag",
            Self::Submit => "submit transaction",
            Self::DynamicGasPrice => "dynamic gas price",
            Self::SyncProgress => "sync progress",
            Self::Peers => "peers",
            Self::Mempool => "mempool",
            Self::ContractCall => "contract call",
            Self::InspectClauses => "inspect clauses",
        };
        f.write_str(s)
    }
}

/// Errors produced by the mapper, builder, codec and pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    // -- request shape -------------------------------------------------------
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid clause: {0}")]
    InvalidClause(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    // -- transaction semantics -----------------------------------------------
    #[error("operations debit more than one origin")]
    TransactionMultipleOrigins,

    #[error("operations contain no transfer")]
    NoTransferOperation,

    #[error("origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch { expected: String, actual: String },

    #[error("delegator mismatch: expected {expected}, got {actual}")]
    DelegatorMismatch { expected: String, actual: String },

    #[error("invalid number of signatures: expected {expected}, got {got}")]
    InvalidNumberOfSignatures { expected: usize, got: usize },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("clause {index} reverted during dry run: {reason}")]
    ClauseReverted { index: usize, reason: String },

    // -- codec ---------------------------------------------------------------
    #[error("cannot decode transaction: {0}")]
    Decode(String),

    // -- chain node ----------------------------------------------------------
    #[error("chain node {call} failed: {message}")]
    Node { call: NodeCall, message: String },

    // -- mode ----------------------------------------------------------------
    #[error("{0} is not available in offline mode")]
    NotAvailableOffline(String),
}

impl MeshError {
    /// Shorthand for a chain-node failure.
    pub fn node(call: NodeCall, message: impl fmt::Display) -> Self {
        Self::Node {
            call,
            message: message.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidAddress(_)
            | Self::InvalidHex(_)
            | Self::InvalidValue(_)
            | Self::InvalidClause(_)
            | Self::InvalidPublicKey(_)
            | Self::InvalidNetwork(_)
            | Self::UnsupportedCurrency(_)
            | Self::InvalidOperation(_) => ErrorClass::RequestShape,
            Self::TransactionMultipleOrigins
            | Self::NoTransferOperation
            | Self::OriginMismatch { .. }
            | Self::DelegatorMismatch { .. }
            | Self::InvalidNumberOfSignatures { .. }
            | Self::InvalidSignature(_)
            | Self::ClauseReverted { .. } => ErrorClass::TransactionSemantics,
            Self::Decode(_) => ErrorClass::Codec,
            Self::Node { .. } => ErrorClass::ChainNode,
            Self::NotAvailableOffline(_) => ErrorClass::Mode,
        }
    }

    /// Stable numeric code. Codes are never reused across variants.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1,
            Self::InvalidAddress(_) => 2,
            Self::InvalidHex(_) => 3,
            Self::InvalidValue(_) => 4,
            Self::InvalidClause(_) => 5,
            Self::InvalidPublicKey(_) => 6,
            Self::InvalidNetwork(_) => 7,
            Self::UnsupportedCurrency(_) => 8,
            Self::InvalidOperation(_) => 9,
            Self::TransactionMultipleOrigins => 20,
            Self::NoTransferOperation => 21,
            Self::OriginMismatch { .. } => 22,
            Self::DelegatorMismatch { .. } => 23,
            Self::InvalidNumberOfSignatures { .. } => 24,
            Self::InvalidSignature(_) => 25,
            Self::ClauseReverted { .. } => 26,
            Self::Decode(_) => 40,
            Self::Node { call, .. } => 60 + call.code_offset(),
            Self::NotAvailableOffline(_) => 90,
        }
    }

    pub fn retriable(&self) -> bool {
        self.class() == ErrorClass::ChainNode
    }

    /// Short, stable title. The full text is in `Display`.
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "Invalid request",
            Self::InvalidAddress(_) => "Invalid address",
            Self::InvalidHex(_) => "Invalid hex string",
            Self::InvalidValue(_) => "Invalid value",
            Self::InvalidClause(_) => "Invalid clause",
            Self::InvalidPublicKey(_) => "Invalid public key",
            Self::InvalidNetwork(_) => "Invalid network identifier",
            Self::UnsupportedCurrency(_) => "Unsupported currency",
            Self::InvalidOperation(_) => "Invalid operation",
            Self::TransactionMultipleOrigins => "Transaction has multiple origins",
            Self::NoTransferOperation => "No transfer operation",
            Self::OriginMismatch { .. } => "Origin mismatch",
            Self::DelegatorMismatch { .. } => "Delegator mismatch",
            Self::InvalidNumberOfSignatures { .. } => "Invalid number of signatures",
            Self::InvalidSignature(_) => "Invalid signature",
            Self::ClauseReverted { .. } => "Clause reverted",
            Self::Decode(_) => "Unable to decode transaction",
            Self::Node { call, .. } => match call {
                NodeCall::BestBlock => "Unable to get best block",
                NodeCall::Block => "Unable to get block",
                NodeCall::Account => "Unable to get account",
                NodeCall::ChainTag => "Unable to get chain tag",
                NodeCall::Submit => "Unable to submit transaction",
                NodeCall::DynamicGasPrice => "Unable to get dynamic gas price",
                NodeCall::SyncProgress => "Unable to get sync progress",
                NodeCall::Peers => "Unable to get peers",
                NodeCall::Mempool => "Unable to get mempool",
                NodeCall::ContractCall => "Unable to call contract",
                NodeCall::InspectClauses => "Unable to inspect clauses",
            },
            Self::NotAvailableOffline(_) => "Not available in offline mode",
        }
    }

    /// Wire form returned to API callers.
    pub fn to_api_error(&self) -> ApiError {
        ApiError {
            code: self.code(),
            message: self.message().to_string(),
            retriable: self.retriable(),
            details: Some(serde_json::json!({ "error": self.to_string() })),
        }
    }
}

/// Serializable error object: stable code, title, retriable flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u32,
    pub message: String,
    pub retriable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<rlp::DecoderError> for MeshError {
    fn from(err: rlp::DecoderError) -> Self {
        MeshError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn samples() -> Vec<MeshError> {
        let mut all = vec![
            MeshError::InvalidRequest(String::new()),
            MeshError::InvalidAddress(String::new()),
            MeshError::InvalidHex(String::new()),
            MeshError::InvalidValue(String::new()),
            MeshError::InvalidClause(String::new()),
            MeshError::InvalidPublicKey(String::new()),
            MeshError::InvalidNetwork(String::new()),
            MeshError::UnsupportedCurrency(String::new()),
            MeshError::InvalidOperation(String::new()),
            MeshError::TransactionMultipleOrigins,
            MeshError::NoTransferOperation,
            MeshError::OriginMismatch {
                expected: String::new(),
                actual: String::new(),
            },
            MeshError::DelegatorMismatch {
                expected: String::new(),
                actual: String::new(),
            },
            MeshError::InvalidNumberOfSignatures {
                expected: 1,
                got: 2,
            },
            MeshError::InvalidSignature(String::new()),
            MeshError::ClauseReverted {
                index: 0,
                reason: String::new(),
            },
            MeshError::Decode(String::new()),
            MeshError::NotAvailableOffline(String::new()),
        ];
        for call in [
            NodeCall::BestBlock,
            NodeCall::Block,
            NodeCall::Account,
            NodeCall::ChainTag,
            NodeCall::Submit,
            NodeCall::DynamicGasPrice,
            NodeCall::SyncProgress,
            NodeCall::Peers,
            NodeCall::Mempool,
            NodeCall::ContractCall,
            NodeCall::InspectClauses,
        ] {
            all.push(MeshError::node(call, "down"));
        }
        all
    }

    #[test]
    fn codes_are_unique() {
        let mut seen = HashSet::new();
        for err in samples() {
            assert!(seen.insert(err.code()), "duplicate code for {:?}", err);
        }
    }

    #[test]
    fn only_chain_node_errors_are_retriable() {
        for err in samples() {
            assert_eq!(
                err.retriable(),
                matches!(err, MeshError::Node { .. }),
                "{:?}",
                err
            );
        }
    }

    #[test]
    fn api_error_carries_code_and_flag() {
        let err = MeshError::node(NodeCall::Submit, "connection refused");
        let api = err.to_api_error();
        assert_eq!(api.code, 64);
        assert!(api.retriable);
        assert_eq!(api.message, "Unable to submit transaction");
        assert_eq!(
            api.details.unwrap()["error"],
            "chain node submit transaction failed: connection refused"
        );
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            MeshError::InvalidNumberOfSignatures {
                expected: 2,
                got: 1
            }
            .to_string(),
            "invalid number of signatures: expected 2, got 1"
        );
        assert_eq!(
            MeshError::TransactionMultipleOrigins.class(),
            ErrorClass::TransactionSemantics
        );
    }
}
