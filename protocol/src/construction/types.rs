//! Request and response bodies of the Construction endpoints.
//!
//! Field names are the Mesh API's snake_case names; these structs are the
//! JSON wire format the node binary accepts and returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::types::CallResult;
use crate::transaction::types::{AccountIdentifier, Amount, Operation};

/// Curve accepted by derive.
pub const CURVE_SECP256K1: &str = "secp256k1";
/// Signature scheme of every signing payload.
pub const SIGNATURE_ECDSA_RECOVERY: &str = "ecdsa_recovery";
/// Method name served by the call endpoint.
pub const CALL_INSPECT_CLAUSES: &str = "inspect_clauses";

pub const TX_TYPE_LEGACY: &str = "legacy";
pub const TX_TYPE_DYNAMIC: &str = "dynamic";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdentifier {
    pub blockchain: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub hex_bytes: String,
    pub curve_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIdentifier {
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_identifier: Option<AccountIdentifier>,
    pub hex_bytes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signing_payload: SigningPayload,
    pub public_key: PublicKey,
    pub signature_type: String,
    pub hex_bytes: String,
}

// ---------------------------------------------------------------------------
// Options and metadata
// ---------------------------------------------------------------------------

/// What preprocess tells metadata to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    /// Clause descriptors, `{to, value, data}`.
    pub clauses: Vec<Value>,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegator: Option<String>,
    pub transaction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_coef: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<u32>,
    /// Gas declared by a fee operation; metadata never goes below it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
}

/// Sequencing and pricing data payloads needs to build the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionMetadata {
    pub transaction_type: String,
    pub chain_tag: u8,
    /// `0x` + 16 hex digits.
    pub block_ref: String,
    pub expiration: u32,
    pub gas: u64,
    /// `0x` hex.
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_coef: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_delegator_account: Option<String>,
}

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveRequest {
    pub network_identifier: NetworkIdentifier,
    pub public_key: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveResponse {
    pub account_identifier: AccountIdentifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessRequest {
    pub network_identifier: NetworkIdentifier,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessResponse {
    pub options: PreprocessOptions,
    pub required_public_keys: Vec<AccountIdentifier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRequest {
    pub network_identifier: NetworkIdentifier,
    pub options: PreprocessOptions,
    #[serde(default)]
    pub public_keys: Vec<PublicKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub metadata: ConstructionMetadata,
    pub suggested_fee: Vec<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadsRequest {
    pub network_identifier: NetworkIdentifier,
    pub operations: Vec<Operation>,
    pub metadata: ConstructionMetadata,
    #[serde(default)]
    pub public_keys: Vec<PublicKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadsResponse {
    pub unsigned_transaction: String,
    pub payloads: Vec<SigningPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseRequest {
    pub network_identifier: NetworkIdentifier,
    pub signed: bool,
    pub transaction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResponse {
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub account_identifier_signers: Vec<AccountIdentifier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineRequest {
    pub network_identifier: NetworkIdentifier,
    pub unsigned_transaction: String,
    pub signatures: Vec<Signature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineResponse {
    pub signed_transaction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashRequest {
    pub network_identifier: NetworkIdentifier,
    pub signed_transaction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub network_identifier: NetworkIdentifier,
    pub signed_transaction: String,
}

/// Returned by both hash and submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionIdentifierResponse {
    pub transaction_identifier: TransactionIdentifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    pub network_identifier: NetworkIdentifier,
    pub method: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Parameters of `inspect_clauses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectClausesParams {
    pub clauses: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResponse {
    pub result: InspectClausesResult,
    pub idempotent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectClausesResult {
    pub results: Vec<CallResult>,
}
