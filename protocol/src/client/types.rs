//! Wire types of the chain node's REST API.
//!
//! Field names follow the node's camelCase JSON. Quantities stay as the
//! hex strings the node sends; callers parse what they need.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MeshError, Result};
use crate::transaction::types::{decode_hex_bytes, parse_quantity};

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// Which chain state a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Revision {
    #[default]
    Best,
    Finalized,
    Number(u64),
    Id([u8; 32]),
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Best => write!(f, "best"),
            Revision::Finalized => write!(f, "finalized"),
            Revision::Number(n) => write!(f, "{}", n),
            Revision::Id(id) => write!(f, "0x{}", hex::encode(id)),
        }
    }
}

impl FromStr for Revision {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "best" => Ok(Revision::Best),
            "finalized" => Ok(Revision::Finalized),
            _ if s.starts_with("0x") && s.len() == 66 => {
                let bytes = decode_hex_bytes(s)?;
                let mut id = [0u8; 32];
                id.copy_from_slice(&bytes);
                Ok(Revision::Id(id))
            }
            _ => s
                .parse::<u64>()
                .map(Revision::Number)
                .map_err(|_| MeshError::InvalidRequest(format!("invalid revision: {}", s))),
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts and blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// VET balance, hex.
    pub balance: String,
    /// VTHO balance, hex.
    pub energy: String,
    pub has_code: bool,
}

impl Account {
    pub fn new(balance: U256, energy: U256) -> Self {
        Self {
            balance: format!("{:#x}", balance),
            energy: format!("{:#x}", energy),
            has_code: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: u64,
    /// `0x`-prefixed 32-byte block id.
    pub id: String,
    #[serde(rename = "parentID")]
    pub parent_id: String,
    pub timestamp: u64,
    pub gas_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<String>,
    #[serde(default)]
    pub transactions: Vec<String>,
}

impl Block {
    /// Block reference: the first 8 bytes of the id, big-endian.
    pub fn block_ref(&self) -> Result<u64> {
        let id = self.id_bytes()?;
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&id[..8]);
        Ok(u64::from_be_bytes(prefix))
    }

    /// Chain tag carried by a genesis block: the last id byte.
    pub fn chain_tag(&self) -> Result<u8> {
        Ok(self.id_bytes()?[31])
    }

    pub fn base_fee(&self) -> Result<Option<U256>> {
        self.base_fee_per_gas.as_deref().map(parse_quantity).transpose()
    }

    fn id_bytes(&self) -> Result<[u8; 32]> {
        let bytes = decode_hex_bytes(&self.id)?;
        bytes
            .try_into()
            .map_err(|_| MeshError::InvalidHex(format!("block id must be 32 bytes: {}", self.id)))
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Clause as the node renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiClause {
    #[serde(default)]
    pub to: Option<String>,
    pub value: String,
    pub data: String,
}

/// Transaction as returned by `/transactions/{id}` and the txpool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTransaction {
    pub id: String,
    #[serde(default)]
    pub chain_tag: u8,
    #[serde(default)]
    pub block_ref: String,
    #[serde(default)]
    pub expiration: u32,
    pub clauses: Vec<ApiClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_coef: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    pub gas: u64,
    pub origin: String,
    #[serde(default)]
    pub delegator: Option<String>,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub depends_on: Option<String>,
}

/// Result of one simulated clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    pub data: String,
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
    #[serde(default)]
    pub transfers: Vec<serde_json::Value>,
    pub gas_used: u64,
    pub reverted: bool,
    #[serde(default)]
    pub vm_error: String,
}

impl CallResult {
    pub fn success(data: &[u8], gas_used: u64) -> Self {
        Self {
            data: format!("0x{}", hex::encode(data)),
            events: Vec::new(),
            transfers: Vec::new(),
            gas_used,
            reverted: false,
            vm_error: String::new(),
        }
    }

    pub fn reverted(vm_error: impl Into<String>) -> Self {
        Self {
            data: "0x".to_string(),
            events: Vec::new(),
            transfers: Vec::new(),
            gas_used: 0,
            reverted: true,
            vm_error: vm_error.into(),
        }
    }

    pub fn output(&self) -> Result<Vec<u8>> {
        decode_hex_bytes(&self.data)
    }
}

// ---------------------------------------------------------------------------
// Node status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub name: String,
    #[serde(rename = "bestBlockID")]
    pub best_block_id: String,
    pub total_score: u64,
    #[serde(rename = "peerID")]
    pub peer_id: String,
    pub net_addr: String,
    pub inbound: bool,
    pub duration: u64,
}

/// Fee-market quote: the best block's base fee and the node's suggested
/// priority fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicGasPrice {
    pub base_fee: U256,
    pub max_priority_fee_per_gas: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolStatus {
    pub total: u64,
}
