//! # Protocol Configuration & Constants
//!
//! Every fixed value the Construction API depends on lives here: chain tags,
//! the two native currencies, ABI selectors, intrinsic gas parameters and
//! the runtime [`ServiceConfig`] handed to the pipeline by the binary.
//!
//! None of these are configurable per request. The tables are plain
//! `const`/`static` data, initialized at compile time and never mutated.

use std::time::Duration;

use crate::address::Address;
use crate::transaction::types::{Currency, CurrencyMetadata};

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Blockchain name reported in every `network_identifier`.
pub const BLOCKCHAIN: &str = "vechainthor";

/// Mainnet chain tag (last byte of the mainnet genesis id).
pub const CHAIN_TAG_MAIN: u8 = 0x4a;

/// Testnet chain tag.
pub const CHAIN_TAG_TEST: u8 = 0x27;

/// Chain tag of a local `thor solo` instance.
pub const CHAIN_TAG_SOLO: u8 = 0xf6;

/// Network name → chain tag. Order matters only for display.
pub const NETWORKS: &[(&str, u8)] = &[
    ("main", CHAIN_TAG_MAIN),
    ("test", CHAIN_TAG_TEST),
    ("solo", CHAIN_TAG_SOLO),
];

/// Version of the Mesh (Rosetta) API implemented by this crate.
pub const MESH_API_VERSION: &str = "1.4.15";

// ---------------------------------------------------------------------------
// Currencies
// ---------------------------------------------------------------------------

/// Native value-transfer coin.
pub const VET_SYMBOL: &str = "VET";

/// Native gas token.
pub const VTHO_SYMBOL: &str = "VTHO";

/// Both native balances use 18 decimals.
pub const NATIVE_DECIMALS: u32 = 18;

/// Built-in energy contract backing VTHO.
pub const VTHO_CONTRACT: &str = "0x0000000000000000000000000000456e65726779";

/// The native coin. Matched by symbol since it has no contract.
pub fn vet_currency() -> Currency {
    Currency {
        symbol: VET_SYMBOL.to_string(),
        decimals: NATIVE_DECIMALS,
        metadata: None,
    }
}

/// The native gas token, denominated by its built-in contract.
pub fn vtho_currency() -> Currency {
    Currency {
        symbol: VTHO_SYMBOL.to_string(),
        decimals: NATIVE_DECIMALS,
        metadata: Some(CurrencyMetadata {
            contract_address: VTHO_CONTRACT.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// ABI
// ---------------------------------------------------------------------------

/// `keccak256("transfer(address,uint256)")[..4]`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// `keccak256("symbol()")[..4]`
pub const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];

/// `keccak256("decimals()")[..4]`
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// ABI word width.
pub const ABI_WORD: usize = 32;

// ---------------------------------------------------------------------------
// Transaction Parameters
// ---------------------------------------------------------------------------

/// Type byte prefixed to dynamic-fee transactions.
pub const DYNAMIC_FEE_TX_TYPE: u8 = 0x51;

/// Bit in `reserved.features` marking a fee-delegated transaction.
pub const DELEGATION_FEATURE: u32 = 1;

/// Recoverable secp256k1 signature length (`r ‖ s ‖ v`).
pub const SIGNATURE_LENGTH: usize = 65;

/// Base cost of any transaction.
pub const TX_GAS: u64 = 5_000;

/// Cost of one message-call clause.
pub const CLAUSE_GAS: u64 = 16_000;

/// Cost of one contract-creation clause.
pub const CLAUSE_GAS_CONTRACT_CREATION: u64 = 48_000;

/// Per zero byte of clause data.
pub const TX_DATA_ZERO_GAS: u64 = 4;

/// Per non-zero byte of clause data.
pub const TX_DATA_NON_ZERO_GAS: u64 = 68;

/// Legacy base gas price, in wei of VTHO per gas unit.
pub const LEGACY_BASE_GAS_PRICE: u64 = 1_000_000_000_000_000;

/// Expiration window applied when the caller does not choose one, in blocks.
pub const DEFAULT_EXPIRATION: u32 = 720;

/// Dry-run VM gas is scaled by this percentage before being added to the
/// intrinsic gas.
pub const VM_GAS_BUFFER_PERCENT: u64 = 120;

/// Outbound chain-node calls give up after this long.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Whether the service may reach a chain node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Online,
    Offline,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "online" => Ok(Mode::Online),
            "offline" => Ok(Mode::Offline),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Settings the binary resolves from CLI/env and hands to the pipeline.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Network name, one of [`NETWORKS`].
    pub network: String,
    pub mode: Mode,
    /// Upper bound on every chain-node call.
    pub request_timeout: Duration,
    /// Expiration used when preprocess options leave it unset.
    pub default_expiration: u32,
    /// Extra tokens known without querying the chain.
    pub tokens: Vec<Currency>,
}

impl ServiceConfig {
    pub fn new(network: impl Into<String>, mode: Mode) -> Self {
        Self {
            network: network.into(),
            mode,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_expiration: DEFAULT_EXPIRATION,
            tokens: Vec::new(),
        }
    }

    /// Chain tag of the configured network, if it is a known one.
    pub fn chain_tag(&self) -> Option<u8> {
        chain_tag_for_network(&self.network)
    }
}

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Returns the chain tag for a network name. `None` for unknown networks.
pub fn chain_tag_for_network(name: &str) -> Option<u8> {
    NETWORKS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, tag)| *tag)
}

/// Returns the network name for a chain tag, mainly for logging.
pub fn network_name(chain_tag: u8) -> String {
    NETWORKS
        .iter()
        .find(|(_, tag)| *tag == chain_tag)
        .map(|(n, _)| n.to_string())
        .unwrap_or_else(|| format!("unknown(0x{:02x})", chain_tag))
}

/// Parsed form of [`VTHO_CONTRACT`].
pub fn vtho_contract() -> Address {
    Address::from_bytes(*b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0Energy")
}
