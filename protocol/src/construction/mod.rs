//! # Construction Pipeline
//!
//! The eight Construction steps over the transaction layer:
//!
//! ```text
//! derive      public key            → account
//! preprocess  operations            → options + required signers
//! metadata    options + node        → chain tag, block ref, gas, pricing, nonce
//! payloads    operations + metadata → unsigned envelope + signing payloads
//! parse       envelope              → operations + signers
//! combine     envelope + signatures → signed envelope
//! hash        signed envelope       → transaction id
//! submit      signed envelope       → node → transaction id
//! ```
//!
//! Every step is a pure function of its request plus, for metadata, submit
//! and call, the node's current state. No state is kept between requests
//! and nothing is retried here: node failures come back retriable and the
//! caller decides.

pub mod types;

use primitive_types::U256;
use std::sync::Arc;
use tracing::{debug, info};

use crate::address::Address;
use crate::client::{with_timeout, Revision, ThorClient};
use crate::config::{
    chain_tag_for_network, vtho_currency, Mode, ServiceConfig, BLOCKCHAIN, LEGACY_BASE_GAS_PRICE,
    SIGNATURE_LENGTH, VM_GAS_BUFFER_PERCENT,
};
use crate::crypto::address_from_public_key;
use crate::error::{MeshError, NodeCall, Result};
use crate::transaction::builder::{intrinsic_gas, FeeParams, TransactionBuilder};
use crate::transaction::clause::Clause;
use crate::transaction::codec;
use crate::transaction::currency::{CurrencyResolver, TokenRegistry};
use crate::transaction::extractor;
use crate::transaction::mesh::{derive_signers_and_operations, MeshTransaction};
use crate::transaction::options::{build_clauses, clauses_from_operations};
use crate::transaction::types::{
    parse_quantity, quantity_to_hex, AccountIdentifier, Amount, Operation, FEE_DELEGATOR_ACCOUNT,
};
use crate::transaction::verification::{verify_slot, SignerRole};

use self::types::*;

/// Runs the Construction steps for one configured network.
pub struct ConstructionService {
    config: ServiceConfig,
    chain_tag: u8,
    client: Option<Arc<dyn ThorClient>>,
    resolver: Arc<dyn CurrencyResolver>,
}

impl ConstructionService {
    /// `client` is required online and ignored offline. Token lookups use
    /// the configured token list plus, online, on-chain reads.
    pub fn new(config: ServiceConfig, client: Option<Arc<dyn ThorClient>>) -> Result<Self> {
        let chain_tag = chain_tag_for_network(&config.network)
            .ok_or_else(|| MeshError::InvalidNetwork(config.network.clone()))?;
        let client = match config.mode {
            Mode::Online => Some(client.ok_or_else(|| {
                MeshError::InvalidRequest("online mode needs a chain node client".into())
            })?),
            Mode::Offline => None,
        };
        let mut registry = TokenRegistry::new(config.tokens.clone());
        if let Some(client) = &client {
            registry = registry.with_client(client.clone(), config.request_timeout);
        }
        Ok(Self {
            config,
            chain_tag,
            client,
            resolver: Arc::new(registry),
        })
    }

    /// Replaces the currency resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn CurrencyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn network_identifier(&self) -> NetworkIdentifier {
        NetworkIdentifier {
            blockchain: BLOCKCHAIN.to_string(),
            network: self.config.network.clone(),
        }
    }

    fn check_network(&self, id: &NetworkIdentifier) -> Result<()> {
        if id.blockchain != BLOCKCHAIN || !id.network.eq_ignore_ascii_case(&self.config.network) {
            return Err(MeshError::InvalidNetwork(format!(
                "{}/{} (serving {}/{})",
                id.blockchain, id.network, BLOCKCHAIN, self.config.network
            )));
        }
        Ok(())
    }

    fn online(&self, step: &str) -> Result<&dyn ThorClient> {
        self.client
            .as_deref()
            .ok_or_else(|| MeshError::NotAvailableOffline(step.to_string()))
    }

    // -----------------------------------------------------------------------
    // derive
    // -----------------------------------------------------------------------

    pub fn derive(&self, req: &DeriveRequest) -> Result<DeriveResponse> {
        self.check_network(&req.network_identifier)?;
        let address = public_key_address(&req.public_key)?;
        debug!(%address, "derived account");
        Ok(DeriveResponse {
            account_identifier: AccountIdentifier::new(&address),
        })
    }

    // -----------------------------------------------------------------------
    // preprocess
    // -----------------------------------------------------------------------

    pub fn preprocess(&self, req: &PreprocessRequest) -> Result<PreprocessResponse> {
        self.check_network(&req.network_identifier)?;
        let ops = &req.operations;

        let origin = extractor::origin(ops)?;
        if !extractor::has_transfer(ops) {
            return Err(MeshError::NoTransferOperation);
        }
        let delegator = requested_delegator(&req.metadata, ops)?;

        let clauses = declared_clauses(ops)?;
        let declared_gas = extractor::declared_gas(ops)?;

        let transaction_type = match req.metadata.get("transaction_type") {
            None => TX_TYPE_DYNAMIC.to_string(),
            Some(v) => match v.as_str() {
                Some(t @ (TX_TYPE_LEGACY | TX_TYPE_DYNAMIC)) => t.to_string(),
                _ => {
                    return Err(MeshError::InvalidRequest(format!(
                        "transaction_type must be \"legacy\" or \"dynamic\", got {}",
                        v
                    )))
                }
            },
        };
        let gas_price_coef = match req.metadata.get("gas_price_coef") {
            None => None,
            Some(v) => Some(
                v.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| {
                        MeshError::InvalidRequest(format!("gas_price_coef must be 0-255, got {}", v))
                    })?,
            ),
        };
        let expiration = match req.metadata.get("expiration") {
            None => None,
            Some(v) => Some(
                v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        MeshError::InvalidRequest(format!("invalid expiration {}", v))
                    })?,
            ),
        };

        let clause_values = clauses
            .iter()
            .map(|c| serde_json::to_value(c).map_err(|e| MeshError::InvalidClause(e.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let mut required_public_keys = vec![AccountIdentifier::new(&origin)];
        if let Some(d) = &delegator {
            required_public_keys.push(AccountIdentifier::new(d));
        }

        debug!(%origin, delegated = delegator.is_some(), clauses = clauses.len(), "preprocessed");
        Ok(PreprocessResponse {
            options: PreprocessOptions {
                clauses: clause_values,
                origin: origin.to_string(),
                delegator: delegator.map(|d| d.to_string()),
                transaction_type,
                gas_price_coef,
                expiration,
                gas: declared_gas,
            },
            required_public_keys,
        })
    }

    // -----------------------------------------------------------------------
    // metadata
    // -----------------------------------------------------------------------

    pub async fn metadata(&self, req: &MetadataRequest) -> Result<MetadataResponse> {
        self.check_network(&req.network_identifier)?;
        let client = self.online("metadata")?;
        let options = &req.options;
        let timeout = self.config.request_timeout;

        let clauses = build_clauses(&options.clauses)?;
        let origin: Address = options.origin.parse()?;
        let delegator = options
            .delegator
            .as_deref()
            .map(str::parse::<Address>)
            .transpose()?;
        let dynamic = match options.transaction_type.as_str() {
            TX_TYPE_DYNAMIC => true,
            TX_TYPE_LEGACY => false,
            other => {
                return Err(MeshError::InvalidRequest(format!(
                    "unknown transaction_type {}",
                    other
                )))
            }
        };

        let best = with_timeout(NodeCall::BestBlock, timeout, client.get_best_block()).await?;
        let block_ref = best
            .block_ref()
            .map_err(|e| MeshError::node(NodeCall::BestBlock, e))?;
        let chain_tag = with_timeout(NodeCall::ChainTag, timeout, client.get_chain_tag()).await?;
        if chain_tag != self.chain_tag {
            return Err(MeshError::InvalidNetwork(format!(
                "node chain tag 0x{:02x} does not match {}",
                chain_tag, self.config.network
            )));
        }

        let estimated = self.estimate_gas(client, &clauses, &origin).await?;
        let gas = estimated.max(options.gas.unwrap_or(0));

        let (pricing, unit_price) = if dynamic {
            let price = with_timeout(
                NodeCall::DynamicGasPrice,
                timeout,
                client.get_dynamic_gas_price(),
            )
            .await?;
            let max_priority = price.max_priority_fee_per_gas;
            let max_fee = price
                .base_fee
                .saturating_mul(U256::from(2u64))
                .saturating_add(max_priority);
            (
                FeeParams::DynamicFee {
                    max_priority_fee_per_gas: max_priority,
                    max_fee_per_gas: max_fee,
                },
                price.base_fee.saturating_add(max_priority),
            )
        } else {
            let coef = options.gas_price_coef.unwrap_or(0);
            let base = U256::from(LEGACY_BASE_GAS_PRICE);
            let price = base + base * U256::from(coef) / U256::from(255u64);
            (
                FeeParams::Legacy {
                    gas_price_coef: coef,
                },
                price,
            )
        };
        let suggested_fee = unit_price.saturating_mul(U256::from(gas));

        let nonce: u64 = rand::random();
        let expiration = options.expiration.unwrap_or(self.config.default_expiration);

        info!(
            %origin,
            block = best.number,
            gas,
            transaction_type = %options.transaction_type,
            "constructed metadata"
        );

        let (gas_price_coef, max_fee_per_gas, max_priority_fee_per_gas) = match pricing {
            FeeParams::Legacy { gas_price_coef } => (Some(gas_price_coef), None, None),
            FeeParams::DynamicFee {
                max_priority_fee_per_gas,
                max_fee_per_gas,
            } => (
                None,
                Some(quantity_to_hex(&max_fee_per_gas)),
                Some(quantity_to_hex(&max_priority_fee_per_gas)),
            ),
        };

        Ok(MetadataResponse {
            metadata: ConstructionMetadata {
                transaction_type: options.transaction_type.clone(),
                chain_tag,
                block_ref: format!("0x{:016x}", block_ref),
                expiration,
                gas,
                nonce: format!("0x{:x}", nonce),
                gas_price_coef,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                fee_delegator_account: delegator.map(|d| d.to_string()),
            },
            suggested_fee: vec![Amount::credit(suggested_fee, vtho_currency())],
        })
    }

    /// Intrinsic gas plus a buffered dry run of any clause that executes
    /// code.
    async fn estimate_gas(
        &self,
        client: &dyn ThorClient,
        clauses: &[Clause],
        origin: &Address,
    ) -> Result<u64> {
        let intrinsic = intrinsic_gas(clauses);
        let needs_vm = clauses.iter().any(|c| !c.data.is_empty() || c.is_creation());
        if !needs_vm {
            return Ok(intrinsic);
        }

        let results = with_timeout(
            NodeCall::InspectClauses,
            self.config.request_timeout,
            client.inspect_clauses(clauses, Some(origin), Revision::Best),
        )
        .await?;

        let mut vm_gas: u64 = 0;
        for (index, result) in results.iter().enumerate() {
            if result.reverted {
                return Err(MeshError::ClauseReverted {
                    index,
                    reason: result.vm_error.clone(),
                });
            }
            vm_gas = vm_gas.saturating_add(result.gas_used);
        }
        let buffered = vm_gas.saturating_mul(VM_GAS_BUFFER_PERCENT) / 100;
        debug!(intrinsic, vm_gas, buffered, "estimated gas");
        Ok(intrinsic.saturating_add(buffered))
    }

    // -----------------------------------------------------------------------
    // payloads
    // -----------------------------------------------------------------------

    pub fn payloads(&self, req: &PayloadsRequest) -> Result<PayloadsResponse> {
        self.check_network(&req.network_identifier)?;
        let ops = &req.operations;
        let meta = &req.metadata;

        let origin = extractor::origin(ops)?;
        if !extractor::has_transfer(ops) {
            return Err(MeshError::NoTransferOperation);
        }

        if !req.public_keys.is_empty() {
            let derived = req
                .public_keys
                .iter()
                .map(public_key_address)
                .collect::<Result<Vec<_>>>()?;
            if !derived.contains(&origin) {
                return Err(MeshError::OriginMismatch {
                    expected: origin.to_string(),
                    actual: derived
                        .iter()
                        .map(|a| a.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                });
            }
        }

        let delegator = match &meta.fee_delegator_account {
            Some(raw) => Some(raw.parse::<Address>()?),
            None => extractor::delegator(ops)?,
        };
        if let (Some(from_ops), Some(declared)) = (extractor::delegator(ops)?, delegator) {
            if from_ops != declared {
                return Err(MeshError::DelegatorMismatch {
                    expected: declared.to_string(),
                    actual: from_ops.to_string(),
                });
            }
        }

        if meta.chain_tag != self.chain_tag {
            return Err(MeshError::InvalidNetwork(format!(
                "metadata chain tag 0x{:02x} does not match {}",
                meta.chain_tag, self.config.network
            )));
        }

        let clauses = declared_clauses(ops)?;
        let tx = TransactionBuilder::new(meta.chain_tag)
            .block_ref(parse_u64(&meta.block_ref, "block_ref")?)
            .expiration(meta.expiration)
            .clauses(clauses)
            .fee(fee_params(meta)?)
            .gas(meta.gas)
            .nonce(parse_u64(&meta.nonce, "nonce")?)
            .delegated(delegator.is_some())
            .build();
        let mesh = MeshTransaction::new(tx, origin, delegator)?;

        let payloads = mesh
            .signers()
            .iter()
            .zip(mesh.signing_payloads())
            .map(|(signer, hash)| SigningPayload {
                address: Some(signer.to_string()),
                account_identifier: Some(AccountIdentifier::new(signer)),
                hex_bytes: hex::encode(hash),
                signature_type: Some(SIGNATURE_ECDSA_RECOVERY.to_string()),
            })
            .collect();

        debug!(%origin, delegated = delegator.is_some(), "built unsigned transaction");
        Ok(PayloadsResponse {
            unsigned_transaction: mesh.encode_hex(),
            payloads,
        })
    }

    // -----------------------------------------------------------------------
    // parse
    // -----------------------------------------------------------------------

    pub async fn parse(&self, req: &ParseRequest) -> Result<ParseResponse> {
        self.check_network(&req.network_identifier)?;
        let mesh = if req.signed {
            let mesh = MeshTransaction::decode_signed_hex(&req.transaction)?;
            mesh.verify_signatures()?;
            mesh
        } else {
            MeshTransaction::decode_unsigned_hex(&req.transaction)?
        };

        let (operations, signers) =
            derive_signers_and_operations(self.resolver.as_ref(), &mesh, req.signed).await?;
        Ok(ParseResponse {
            operations,
            account_identifier_signers: signers.iter().map(AccountIdentifier::new).collect(),
        })
    }

    // -----------------------------------------------------------------------
    // combine
    // -----------------------------------------------------------------------

    pub fn combine(&self, req: &CombineRequest) -> Result<CombineResponse> {
        self.check_network(&req.network_identifier)?;
        let mesh = MeshTransaction::decode_unsigned_hex(&req.unsigned_transaction)?;

        let signers = mesh.signers();
        if req.signatures.len() != signers.len() {
            return Err(MeshError::InvalidNumberOfSignatures {
                expected: signers.len(),
                got: req.signatures.len(),
            });
        }

        let payloads = mesh.signing_payloads();
        let mut signature = Vec::with_capacity(signers.len() * SIGNATURE_LENGTH);
        for (slot, sig) in req.signatures.iter().enumerate() {
            let bytes = decode_loose_hex(&sig.hex_bytes)
                .map_err(|_| MeshError::InvalidSignature(format!("signature {} is not hex", slot)))?;
            let role = if slot == 0 {
                SignerRole::Origin
            } else {
                SignerRole::Delegator
            };
            verify_slot(&payloads[slot], &bytes, &signers[slot], role)?;
            signature.extend_from_slice(&bytes);
        }

        let signed = mesh.with_signature(signature);
        Ok(CombineResponse {
            signed_transaction: signed.encode_hex(),
        })
    }

    // -----------------------------------------------------------------------
    // hash
    // -----------------------------------------------------------------------

    pub fn hash(&self, req: &HashRequest) -> Result<TransactionIdentifierResponse> {
        self.check_network(&req.network_identifier)?;
        let mesh = MeshTransaction::decode_signed_hex(&req.signed_transaction)?;
        mesh.verify_signatures()?;
        Ok(TransactionIdentifierResponse {
            transaction_identifier: TransactionIdentifier {
                hash: format!("0x{}", hex::encode(mesh.id())),
            },
        })
    }

    // -----------------------------------------------------------------------
    // submit
    // -----------------------------------------------------------------------

    pub async fn submit(&self, req: &SubmitRequest) -> Result<TransactionIdentifierResponse> {
        self.check_network(&req.network_identifier)?;
        let client = self.online("submit")?;
        let mesh = MeshTransaction::decode_signed_hex(&req.signed_transaction)?;
        mesh.verify_signatures()?;

        let raw = codec::encode(&mesh.tx);
        let id = with_timeout(
            NodeCall::Submit,
            self.config.request_timeout,
            client.submit_transaction(&raw),
        )
        .await?;
        info!(%id, origin = %mesh.origin, "submitted transaction");
        Ok(TransactionIdentifierResponse {
            transaction_identifier: TransactionIdentifier { hash: id },
        })
    }

    // -----------------------------------------------------------------------
    // call
    // -----------------------------------------------------------------------

    pub async fn call(&self, req: &CallRequest) -> Result<CallResponse> {
        self.check_network(&req.network_identifier)?;
        let client = self.online("call")?;
        if req.method != CALL_INSPECT_CLAUSES {
            return Err(MeshError::InvalidRequest(format!(
                "unsupported call method {}",
                req.method
            )));
        }
        let params: InspectClausesParams =
            serde_json::from_value(serde_json::Value::Object(req.parameters.clone()))
                .map_err(|e| MeshError::InvalidRequest(format!("inspect_clauses: {}", e)))?;

        let clauses = build_clauses(&params.clauses)?;
        let caller = params
            .caller
            .as_deref()
            .map(str::parse::<Address>)
            .transpose()?;
        let revision: Revision = params.revision.as_deref().unwrap_or("best").parse()?;

        let results = with_timeout(
            NodeCall::InspectClauses,
            self.config.request_timeout,
            client.inspect_clauses(&clauses, caller.as_ref(), revision),
        )
        .await?;
        Ok(CallResponse {
            result: InspectClausesResult { results },
            idempotent: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clauses the operations describe; at least one is required.
fn declared_clauses(ops: &[Operation]) -> Result<Vec<Clause>> {
    let clauses = clauses_from_operations(ops)?;
    if clauses.is_empty() {
        return Err(MeshError::InvalidOperation(
            "operations describe no clause".into(),
        ));
    }
    Ok(clauses)
}

fn public_key_address(key: &types::PublicKey) -> Result<Address> {
    if key.curve_type != CURVE_SECP256K1 {
        return Err(MeshError::InvalidPublicKey(format!(
            "unsupported curve {}",
            key.curve_type
        )));
    }
    let bytes = decode_loose_hex(&key.hex_bytes)
        .map_err(|_| MeshError::InvalidPublicKey("public key is not hex".into()))?;
    address_from_public_key(&bytes)
}

/// Delegator from preprocess metadata, falling back to a `FeeDelegation`
/// operation.
fn requested_delegator(
    metadata: &serde_json::Map<String, serde_json::Value>,
    ops: &[Operation],
) -> Result<Option<Address>> {
    match metadata.get(FEE_DELEGATOR_ACCOUNT) {
        None | Some(serde_json::Value::Null) => extractor::delegator(ops),
        Some(serde_json::Value::String(s)) => s.parse().map(Some),
        Some(other) => Err(MeshError::InvalidAddress(other.to_string())),
    }
}

fn fee_params(meta: &ConstructionMetadata) -> Result<FeeParams> {
    match meta.transaction_type.as_str() {
        TX_TYPE_LEGACY => Ok(FeeParams::Legacy {
            gas_price_coef: meta.gas_price_coef.unwrap_or(0),
        }),
        TX_TYPE_DYNAMIC => {
            let max_fee = meta
                .max_fee_per_gas
                .as_deref()
                .ok_or_else(|| MeshError::InvalidRequest("missing max_fee_per_gas".into()))?;
            let max_priority = meta
                .max_priority_fee_per_gas
                .as_deref()
                .ok_or_else(|| {
                    MeshError::InvalidRequest("missing max_priority_fee_per_gas".into())
                })?;
            Ok(FeeParams::DynamicFee {
                max_priority_fee_per_gas: parse_quantity(max_priority)?,
                max_fee_per_gas: parse_quantity(max_fee)?,
            })
        }
        other => Err(MeshError::InvalidRequest(format!(
            "unknown transaction_type {}",
            other
        ))),
    }
}

fn parse_u64(s: &str, field: &str) -> Result<u64> {
    let value = parse_quantity(s)
        .map_err(|_| MeshError::InvalidRequest(format!("invalid {}: {}", field, s)))?;
    if value.bits() > 64 {
        return Err(MeshError::InvalidRequest(format!("{} exceeds 64 bits", field)));
    }
    Ok(value.low_u64())
}

/// Hex with or without `0x`.
fn decode_loose_hex(s: &str) -> std::result::Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
