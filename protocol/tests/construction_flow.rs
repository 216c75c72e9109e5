//! End-to-end tests of the Construction pipeline.
//!
//! Each test drives the eight steps the way a wallet would: operations in,
//! options and metadata from the service, payloads signed with real
//! secp256k1 keys, signatures combined, the result parsed back, hashed and
//! submitted to an in-memory chain node.
//!
//! Each test stands alone with its own mock node. No shared state.

use std::sync::Arc;
use std::time::Duration;

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use primitive_types::U256;
use serde_json::{json, Map, Value};

use thor_mesh::client::{MockThorClient, ThorClient};
use thor_mesh::config::{vet_currency, vtho_currency, Mode, ServiceConfig, BLOCKCHAIN};
use thor_mesh::construction::types::*;
use thor_mesh::crypto::keys::signing_key_address;
use thor_mesh::crypto::sign_hash;
use thor_mesh::error::{MeshError, NodeCall};
use thor_mesh::transaction::abi::encode_transfer;
use thor_mesh::transaction::types::{Amount, Currency, Operation, OperationType};
use thor_mesh::{Address, ConstructionService};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn network() -> NetworkIdentifier {
    NetworkIdentifier {
        blockchain: BLOCKCHAIN.to_string(),
        network: "test".to_string(),
    }
}

fn key(byte: u8) -> SigningKey {
    SigningKey::from_slice(&[byte; 32]).unwrap()
}

fn recipient() -> Address {
    "0x00000000000000000000000000000000000000b0".parse().unwrap()
}

fn token_contract() -> Address {
    "0x0ce6661b4ba86a0ea7ca2bd86a0de87b0b860f14".parse().unwrap()
}

fn token() -> Currency {
    Currency::token("OCE", 18, &token_contract())
}

fn online_service(config: ServiceConfig) -> (ConstructionService, Arc<MockThorClient>) {
    let node = Arc::new(MockThorClient::new());
    let service = ConstructionService::new(config, Some(node.clone() as Arc<dyn ThorClient>))
        .expect("online service");
    (service, node)
}

fn transfer_ops(origin: &Address, amount: U256, currency: Currency) -> Vec<Operation> {
    vec![
        Operation::new(
            0,
            OperationType::Transfer,
            None,
            origin,
            Amount::debit(amount, currency.clone()),
        ),
        Operation::new(
            1,
            OperationType::Transfer,
            None,
            &recipient(),
            Amount::credit(amount, currency),
        ),
    ]
}

fn sec1(signer: &SigningKey, compress: bool) -> String {
    let point = k256::PublicKey::from(signer.verifying_key()).to_encoded_point(compress);
    hex::encode(point.as_bytes())
}

fn signature(payload: &SigningPayload, signer: &SigningKey) -> Signature {
    let mut hash = [0u8; 32];
    hex::decode_to_slice(&payload.hex_bytes, &mut hash).unwrap();
    let sig = sign_hash(signer, &hash).unwrap();
    Signature {
        signing_payload: payload.clone(),
        public_key: PublicKey {
            hex_bytes: sec1(signer, true),
            curve_type: CURVE_SECP256K1.to_string(),
        },
        signature_type: SIGNATURE_ECDSA_RECOVERY.to_string(),
        hex_bytes: hex::encode(sig),
    }
}

/// Preprocess → metadata → payloads.
async fn build_unsigned(
    service: &ConstructionService,
    ops: &[Operation],
    preprocess_metadata: Map<String, Value>,
) -> (ConstructionMetadata, PayloadsResponse) {
    let pre = service
        .preprocess(&PreprocessRequest {
            network_identifier: network(),
            operations: ops.to_vec(),
            metadata: preprocess_metadata,
        })
        .expect("preprocess");
    let meta = service
        .metadata(&MetadataRequest {
            network_identifier: network(),
            options: pre.options,
            public_keys: vec![],
        })
        .await
        .expect("metadata");
    let payloads = service
        .payloads(&PayloadsRequest {
            network_identifier: network(),
            operations: ops.to_vec(),
            metadata: meta.metadata.clone(),
            public_keys: vec![],
        })
        .expect("payloads");
    (meta.metadata, payloads)
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vet_transfer_full_lifecycle() {
    let (service, node) = online_service(ServiceConfig::new("test", Mode::Online));
    let signer = key(0x11);
    let origin = signing_key_address(&signer);
    let ops = transfer_ops(&origin, U256::exp10(18), vet_currency());

    let derived = service
        .derive(&DeriveRequest {
            network_identifier: network(),
            public_key: PublicKey {
                hex_bytes: sec1(&signer, false),
                curve_type: CURVE_SECP256K1.to_string(),
            },
            metadata: None,
        })
        .unwrap();
    assert_eq!(derived.account_identifier.address, origin.to_string());

    let (meta, payloads) = build_unsigned(&service, &ops, Map::new()).await;
    assert_eq!(meta.transaction_type, TX_TYPE_DYNAMIC);
    assert_eq!(meta.gas, 21_000);
    assert_eq!(payloads.payloads.len(), 1);

    // Unsigned parse names no signers yet.
    let unsigned = service
        .parse(&ParseRequest {
            network_identifier: network(),
            signed: false,
            transaction: payloads.unsigned_transaction.clone(),
        })
        .await
        .unwrap();
    assert!(unsigned.account_identifier_signers.is_empty());

    let combined = service
        .combine(&CombineRequest {
            network_identifier: network(),
            unsigned_transaction: payloads.unsigned_transaction.clone(),
            signatures: vec![signature(&payloads.payloads[0], &signer)],
        })
        .unwrap();

    let parsed = service
        .parse(&ParseRequest {
            network_identifier: network(),
            signed: true,
            transaction: combined.signed_transaction.clone(),
        })
        .await
        .unwrap();
    assert_eq!(parsed.operations.len(), 3);
    assert_eq!(parsed.operations[..2], ops[..]);
    assert_eq!(parsed.operations[2].op_type, OperationType::Fee);
    assert_eq!(parsed.operations[2].amount.value, "-21000");
    assert_eq!(parsed.operations[2].amount.currency, vtho_currency());
    assert_eq!(
        parsed.account_identifier_signers[0].address,
        origin.to_string()
    );

    let hashed = service
        .hash(&HashRequest {
            network_identifier: network(),
            signed_transaction: combined.signed_transaction.clone(),
        })
        .unwrap();
    let submitted = service
        .submit(&SubmitRequest {
            network_identifier: network(),
            signed_transaction: combined.signed_transaction,
        })
        .await
        .unwrap();
    assert_eq!(
        submitted.transaction_identifier,
        hashed.transaction_identifier
    );
    assert_eq!(node.submitted().len(), 1);
}

#[tokio::test]
async fn delegated_legacy_transfer() {
    let (service, node) = online_service(ServiceConfig::new("test", Mode::Online));
    let origin_key = key(0x21);
    let delegator_key = key(0x22);
    let origin = signing_key_address(&origin_key);
    let delegator = signing_key_address(&delegator_key);
    let ops = transfer_ops(&origin, U256::from(5u64), vet_currency());

    let mut pre_meta = Map::new();
    pre_meta.insert("transaction_type".into(), json!("legacy"));
    pre_meta.insert("gas_price_coef".into(), json!(64));
    pre_meta.insert("fee_delegator_account".into(), json!(delegator.to_string()));

    let (meta, payloads) = build_unsigned(&service, &ops, pre_meta).await;
    assert_eq!(meta.gas_price_coef, Some(64));
    assert_eq!(
        meta.fee_delegator_account.as_deref(),
        Some(delegator.to_string().as_str())
    );
    assert_eq!(payloads.payloads.len(), 2);
    assert_eq!(
        payloads.payloads[1].address.as_deref(),
        Some(delegator.to_string().as_str())
    );

    // Signatures in the wrong slots are rejected.
    let swapped = service.combine(&CombineRequest {
        network_identifier: network(),
        unsigned_transaction: payloads.unsigned_transaction.clone(),
        signatures: vec![
            signature(&payloads.payloads[0], &delegator_key),
            signature(&payloads.payloads[1], &origin_key),
        ],
    });
    assert!(matches!(swapped, Err(MeshError::OriginMismatch { .. })));

    let combined = service
        .combine(&CombineRequest {
            network_identifier: network(),
            unsigned_transaction: payloads.unsigned_transaction,
            signatures: vec![
                signature(&payloads.payloads[0], &origin_key),
                signature(&payloads.payloads[1], &delegator_key),
            ],
        })
        .unwrap();

    let parsed = service
        .parse(&ParseRequest {
            network_identifier: network(),
            signed: true,
            transaction: combined.signed_transaction.clone(),
        })
        .await
        .unwrap();
    let signers: Vec<_> = parsed
        .account_identifier_signers
        .iter()
        .map(|a| a.address.clone())
        .collect();
    assert_eq!(signers, vec![origin.to_string(), delegator.to_string()]);
    let fee = parsed.operations.last().unwrap();
    assert_eq!(fee.op_type, OperationType::FeeDelegation);
    assert_eq!(fee.account.address, origin.to_string());

    service
        .submit(&SubmitRequest {
            network_identifier: network(),
            signed_transaction: combined.signed_transaction,
        })
        .await
        .unwrap();
    assert_eq!(node.submitted().len(), 1);
}

#[tokio::test]
async fn token_transfer_roundtrip() {
    let mut config = ServiceConfig::new("test", Mode::Online);
    config.tokens = vec![token()];
    let (service, node) = online_service(config);
    node.set_inspect_gas(30_000);

    let signer = key(0x31);
    let origin = signing_key_address(&signer);
    let amount = U256::from(1_234_567u64);
    let ops = transfer_ops(&origin, amount, token());

    let pre = service
        .preprocess(&PreprocessRequest {
            network_identifier: network(),
            operations: ops.clone(),
            metadata: Map::new(),
        })
        .unwrap();
    let calldata = format!("0x{}", hex::encode(encode_transfer(&recipient(), &amount)));
    assert_eq!(pre.options.clauses[0]["to"], token_contract().to_string());
    assert_eq!(pre.options.clauses[0]["data"], calldata);

    let (meta, payloads) = build_unsigned(&service, &ops, Map::new()).await;
    // 68 bytes of calldata, 30k VM gas buffered to 36k.
    assert!(meta.gas > 21_000 + 36_000);

    let parsed = service
        .parse(&ParseRequest {
            network_identifier: network(),
            signed: false,
            transaction: payloads.unsigned_transaction,
        })
        .await
        .unwrap();
    assert_eq!(parsed.operations[..2], ops[..]);
    assert_eq!(parsed.operations[2].op_type, OperationType::Fee);
}

#[tokio::test]
async fn contract_call_needs_dry_run() {
    let (service, node) = online_service(ServiceConfig::new("test", Mode::Online));
    node.set_inspect_revert(Some("execution reverted".into()));
    let origin = signing_key_address(&key(0x41));
    let ops = vec![
        Operation::new(
            0,
            OperationType::Transfer,
            None,
            &origin,
            Amount::debit(U256::one(), vet_currency()),
        ),
        Operation::new(
            1,
            OperationType::Transfer,
            None,
            &recipient(),
            Amount::credit(U256::one(), vet_currency()),
        ),
        Operation::new(
            2,
            OperationType::ContractCall,
            None,
            &origin,
            Amount::credit(U256::zero(), vet_currency()),
        )
        .with_metadata("to", recipient().to_string())
        .with_metadata("data", "0xdeadbeef"),
    ];

    let pre = service
        .preprocess(&PreprocessRequest {
            network_identifier: network(),
            operations: ops,
            metadata: Map::new(),
        })
        .unwrap();
    let err = service
        .metadata(&MetadataRequest {
            network_identifier: network(),
            options: pre.options,
            public_keys: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::ClauseReverted { .. }));
    assert!(!err.retriable());
}

// ---------------------------------------------------------------------------
// Modes and failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_mode_builds_and_combines() {
    let service =
        ConstructionService::new(ServiceConfig::new("test", Mode::Offline), None).unwrap();
    let signer = key(0x51);
    let origin = signing_key_address(&signer);
    let ops = transfer_ops(&origin, U256::from(7u64), vet_currency());

    let metadata = ConstructionMetadata {
        transaction_type: TX_TYPE_DYNAMIC.to_string(),
        chain_tag: 0x27,
        block_ref: "0x00000064aabbccdd".to_string(),
        expiration: 32,
        gas: 21_000,
        nonce: "0x2a".to_string(),
        gas_price_coef: None,
        max_fee_per_gas: Some("0x2540be400".to_string()),
        max_priority_fee_per_gas: Some("0x3b9aca00".to_string()),
        fee_delegator_account: None,
    };
    let payloads = service
        .payloads(&PayloadsRequest {
            network_identifier: network(),
            operations: ops,
            metadata,
            public_keys: vec![],
        })
        .unwrap();
    let combined = service
        .combine(&CombineRequest {
            network_identifier: network(),
            unsigned_transaction: payloads.unsigned_transaction,
            signatures: vec![signature(&payloads.payloads[0], &signer)],
        })
        .unwrap();
    let hashed = service
        .hash(&HashRequest {
            network_identifier: network(),
            signed_transaction: combined.signed_transaction.clone(),
        })
        .unwrap();
    assert!(hashed.transaction_identifier.hash.starts_with("0x"));
    assert_eq!(hashed.transaction_identifier.hash.len(), 66);

    let err = service
        .submit(&SubmitRequest {
            network_identifier: network(),
            signed_transaction: combined.signed_transaction,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::NotAvailableOffline(_)));

    let err = service
        .call(&CallRequest {
            network_identifier: network(),
            method: CALL_INSPECT_CLAUSES.to_string(),
            parameters: Map::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::NotAvailableOffline(_)));
}

#[tokio::test]
async fn payloads_checks_public_keys() {
    let service =
        ConstructionService::new(ServiceConfig::new("test", Mode::Offline), None).unwrap();
    let origin = signing_key_address(&key(0x61));
    let stranger = key(0x62);
    let metadata = ConstructionMetadata {
        transaction_type: TX_TYPE_LEGACY.to_string(),
        chain_tag: 0x27,
        block_ref: "0x0000000000000001".to_string(),
        expiration: 720,
        gas: 21_000,
        nonce: "0x1".to_string(),
        gas_price_coef: Some(0),
        max_fee_per_gas: None,
        max_priority_fee_per_gas: None,
        fee_delegator_account: None,
    };
    let err = service
        .payloads(&PayloadsRequest {
            network_identifier: network(),
            operations: transfer_ops(&origin, U256::one(), vet_currency()),
            metadata: metadata.clone(),
            public_keys: vec![PublicKey {
                hex_bytes: sec1(&stranger, true),
                curve_type: CURVE_SECP256K1.to_string(),
            }],
        })
        .unwrap_err();
    assert!(matches!(err, MeshError::OriginMismatch { .. }));

    let mut wrong_chain = metadata;
    wrong_chain.chain_tag = 0x4a;
    let err = service
        .payloads(&PayloadsRequest {
            network_identifier: network(),
            operations: transfer_ops(&origin, U256::one(), vet_currency()),
            metadata: wrong_chain,
            public_keys: vec![],
        })
        .unwrap_err();
    assert!(matches!(err, MeshError::InvalidNetwork(_)));
}

#[tokio::test(start_paused = true)]
async fn slow_node_times_out_as_retriable() {
    let mut config = ServiceConfig::new("test", Mode::Online);
    config.request_timeout = Duration::from_secs(1);
    let (service, node) = online_service(config);
    node.set_delay(Some(Duration::from_secs(30)));

    let origin = signing_key_address(&key(0x71));
    let pre = service
        .preprocess(&PreprocessRequest {
            network_identifier: network(),
            operations: transfer_ops(&origin, U256::one(), vet_currency()),
            metadata: Map::new(),
        })
        .unwrap();
    let err = service
        .metadata(&MetadataRequest {
            network_identifier: network(),
            options: pre.options,
            public_keys: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MeshError::Node {
            call: NodeCall::BestBlock,
            ..
        }
    ));
    assert!(err.retriable());
    assert!(err.to_api_error().retriable);
}

#[tokio::test]
async fn tampered_signature_is_rejected_by_hash() {
    let service =
        ConstructionService::new(ServiceConfig::new("test", Mode::Offline), None).unwrap();
    let signer = key(0x81);
    let origin = signing_key_address(&signer);
    let metadata = ConstructionMetadata {
        transaction_type: TX_TYPE_LEGACY.to_string(),
        chain_tag: 0x27,
        block_ref: "0x0000000000000001".to_string(),
        expiration: 720,
        gas: 21_000,
        nonce: "0x1".to_string(),
        gas_price_coef: Some(0),
        max_fee_per_gas: None,
        max_priority_fee_per_gas: None,
        fee_delegator_account: None,
    };
    let payloads = service
        .payloads(&PayloadsRequest {
            network_identifier: network(),
            operations: transfer_ops(&origin, U256::one(), vet_currency()),
            metadata,
            public_keys: vec![],
        })
        .unwrap();
    let combined = service
        .combine(&CombineRequest {
            network_identifier: network(),
            unsigned_transaction: payloads.unsigned_transaction,
            signatures: vec![signature(&payloads.payloads[0], &signer)],
        })
        .unwrap();

    // Flip one byte of r inside the hex-encoded signature.
    let mut raw = hex::decode(combined.signed_transaction.trim_start_matches("0x")).unwrap();
    let idx = raw.len() - 40;
    raw[idx] ^= 0x01;
    let tampered = format!("0x{}", hex::encode(raw));

    let res = service.hash(&HashRequest {
        network_identifier: network(),
        signed_transaction: tampered,
    });
    assert!(res.is_err());
}
