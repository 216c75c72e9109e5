//! Terminal walkthrough of the Construction pipeline.
//!
//! Builds a fee-delegated VET transfer against an in-memory chain node:
//! preprocess, metadata, payloads, signing with two secp256k1 keys,
//! combine, parse, hash and submit.
//!
//! Run with:
//!   cargo run --example demo

use std::sync::Arc;
use std::time::Instant;

use k256::ecdsa::SigningKey;
use primitive_types::U256;
use serde_json::{json, Map};

use thor_mesh::client::{MockThorClient, ThorClient};
use thor_mesh::config::{vet_currency, Mode, ServiceConfig, BLOCKCHAIN};
use thor_mesh::construction::types::*;
use thor_mesh::crypto::keys::signing_key_address;
use thor_mesh::crypto::sign_hash;
use thor_mesh::transaction::types::{Amount, Operation, OperationType};
use thor_mesh::{Address, ConstructionService};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    THOR MESH  --  Construction Pipeline Walkthrough                {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}");
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================={RESET}");
    println!("{BOLD}{WHITE}  {title}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn short(hex: &str) -> String {
    if hex.len() <= 24 {
        return hex.to_string();
    }
    format!("{}...{}", &hex[..14], &hex[hex.len() - 8..])
}

fn sign(payload: &SigningPayload, key: &SigningKey) -> Result<Signature, Box<dyn std::error::Error>> {
    let mut hash = [0u8; 32];
    hex::decode_to_slice(&payload.hex_bytes, &mut hash)?;
    let sig = sign_hash(key, &hash)?;
    Ok(Signature {
        signing_payload: payload.clone(),
        public_key: PublicKey {
            hex_bytes: String::new(),
            curve_type: CURVE_SECP256K1.to_string(),
        },
        signature_type: SIGNATURE_ECDSA_RECOVERY.to_string(),
        hex_bytes: hex::encode(sig),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    banner();

    let network = NetworkIdentifier {
        blockchain: BLOCKCHAIN.to_string(),
        network: "test".to_string(),
    };
    let node = Arc::new(MockThorClient::new());
    let service = ConstructionService::new(
        ServiceConfig::new("test", Mode::Online),
        Some(node.clone() as Arc<dyn ThorClient>),
    )?;

    let origin_key = SigningKey::random(&mut rand::thread_rng());
    let sponsor_key = SigningKey::random(&mut rand::thread_rng());
    let origin = signing_key_address(&origin_key);
    let sponsor = signing_key_address(&sponsor_key);
    let recipient: Address = "0x7567d83b7b8d80addcb281a71d54fc7b3364ffed".parse()?;

    info("Origin", &origin.to_string());
    info("Sponsor", &sponsor.to_string());
    info("Recipient", &recipient.to_string());

    let amount = U256::exp10(18) * U256::from(3u64);
    let ops = vec![
        Operation::new(0, OperationType::Transfer, None, &origin, Amount::debit(amount, vet_currency())),
        Operation::new(1, OperationType::Transfer, None, &recipient, Amount::credit(amount, vet_currency())),
    ];

    // -- preprocess ----------------------------------------------------------
    section(1, "Preprocess: operations -> options");
    let start = Instant::now();
    let mut metadata = Map::new();
    metadata.insert("fee_delegator_account".into(), json!(sponsor.to_string()));
    let pre = service.preprocess(&PreprocessRequest {
        network_identifier: network.clone(),
        operations: ops.clone(),
        metadata,
    })?;
    timing("preprocess", start.elapsed());
    info("Clauses", &pre.options.clauses.len().to_string());
    info("Required signers", &pre.required_public_keys.len().to_string());

    // -- metadata ------------------------------------------------------------
    section(2, "Metadata: chain tag, block ref, gas, fees");
    let start = Instant::now();
    let meta = service
        .metadata(&MetadataRequest {
            network_identifier: network.clone(),
            options: pre.options,
            public_keys: vec![],
        })
        .await?;
    timing("metadata", start.elapsed());
    info("Chain tag", &format!("0x{:02x}", meta.metadata.chain_tag));
    info("Block ref", &meta.metadata.block_ref);
    info("Gas", &meta.metadata.gas.to_string());
    info("Suggested fee (VTHO wei)", &meta.suggested_fee[0].value);

    // -- payloads ------------------------------------------------------------
    section(3, "Payloads: unsigned transaction + signing hashes");
    let payloads = service.payloads(&PayloadsRequest {
        network_identifier: network.clone(),
        operations: ops,
        metadata: meta.metadata,
        public_keys: vec![],
    })?;
    info("Unsigned", &short(&payloads.unsigned_transaction));
    for p in &payloads.payloads {
        info(p.address.as_deref().unwrap_or("?"), &short(&p.hex_bytes));
    }

    // -- combine -------------------------------------------------------------
    section(4, "Combine: origin and sponsor signatures");
    let signatures = vec![
        sign(&payloads.payloads[0], &origin_key)?,
        sign(&payloads.payloads[1], &sponsor_key)?,
    ];
    let combined = service.combine(&CombineRequest {
        network_identifier: network.clone(),
        unsigned_transaction: payloads.unsigned_transaction,
        signatures,
    })?;
    success("both signatures recover to their signers");

    // -- parse ---------------------------------------------------------------
    section(5, "Parse: signed transaction -> operations");
    let parsed = service
        .parse(&ParseRequest {
            network_identifier: network.clone(),
            signed: true,
            transaction: combined.signed_transaction.clone(),
        })
        .await?;
    for op in &parsed.operations {
        println!(
            "  {CYAN}#{}{RESET} {BOLD}{:<14}{RESET} {} {YELLOW}{} {}{RESET}",
            op.index(),
            op.op_type.to_string(),
            short(&op.account.address),
            op.amount.value,
            op.amount.currency.symbol
        );
    }

    // -- hash + submit -------------------------------------------------------
    section(6, "Hash and submit");
    let hashed = service.hash(&HashRequest {
        network_identifier: network.clone(),
        signed_transaction: combined.signed_transaction.clone(),
    })?;
    let submitted = service
        .submit(&SubmitRequest {
            network_identifier: network,
            signed_transaction: combined.signed_transaction,
        })
        .await?;
    info("Transaction id", &hashed.transaction_identifier.hash);
    if submitted.transaction_identifier == hashed.transaction_identifier {
        success("node accepted the transaction under the same id");
    }
    info("Raw transactions at node", &node.submitted().len().to_string());

    println!();
    Ok(())
}
