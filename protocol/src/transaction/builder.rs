//! Native transaction model and its builder.
//!
//! A [`Transaction`] is exactly what the chain accepts: sequencing fields,
//! the clause list, gas, fee parameters and the raw signature bytes. It
//! knows nothing about origin or delegator addresses; those travel beside it
//! in [`super::mesh::MeshTransaction`].
//!
//! The builder does not sign. Signing hashes and signature attachment live
//! in [`super::signing`].

use primitive_types::U256;

use super::clause::Clause;
use crate::config::{
    CLAUSE_GAS, CLAUSE_GAS_CONTRACT_CREATION, DELEGATION_FEATURE, TX_DATA_NON_ZERO_GAS,
    TX_DATA_ZERO_GAS, TX_GAS,
};

// ---------------------------------------------------------------------------
// Fee parameters
// ---------------------------------------------------------------------------

/// Pricing of a transaction. The variant decides the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    /// Fixed base price scaled by `1 + coef/255`.
    Legacy { gas_price_coef: u8 },
    /// Fee-market pricing, encoded with a leading type byte.
    DynamicFee {
        max_priority_fee_per_gas: U256,
        max_fee_per_gas: U256,
    },
}

impl FeeParams {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, FeeParams::DynamicFee { .. })
    }

    /// Name used in preprocess options.
    pub fn type_name(&self) -> &'static str {
        match self {
            FeeParams::Legacy { .. } => "legacy",
            FeeParams::DynamicFee { .. } => "dynamic",
        }
    }
}

impl Default for FeeParams {
    fn default() -> Self {
        FeeParams::Legacy { gas_price_coef: 0 }
    }
}

// ---------------------------------------------------------------------------
// Reserved
// ---------------------------------------------------------------------------

/// The `reserved` list: a feature bitset followed by opaque entries the
/// current protocol does not interpret but must carry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reserved {
    pub features: u32,
    pub unused: Vec<Vec<u8>>,
}

impl Reserved {
    pub fn is_delegated(&self) -> bool {
        self.features & DELEGATION_FEATURE == DELEGATION_FEATURE
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A native transaction.
///
/// `signature` is empty while unsigned, 65 bytes once the origin signed,
/// and 130 bytes for a fee-delegated transaction signed by both parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Last byte of the genesis block id; guards against cross-chain replay.
    pub chain_tag: u8,
    /// First 8 bytes of the reference block id.
    pub block_ref: u64,
    /// Blocks after `block_ref` during which the transaction is valid.
    pub expiration: u32,
    pub clauses: Vec<Clause>,
    pub fee: FeeParams,
    pub gas: u64,
    pub depends_on: Option<[u8; 32]>,
    pub nonce: u64,
    pub reserved: Reserved,
    pub signature: Vec<u8>,
}

impl Transaction {
    pub fn is_delegated(&self) -> bool {
        self.reserved.is_delegated()
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Number of signatures the transaction needs.
    pub fn signer_count(&self) -> usize {
        if self.is_delegated() {
            2
        } else {
            1
        }
    }

    /// Returns a copy carrying `signature`. The receiver is left untouched.
    pub fn with_signature(&self, signature: Vec<u8>) -> Self {
        Self {
            signature,
            ..self.clone()
        }
    }

    /// Returns an unsigned copy.
    pub fn unsigned(&self) -> Self {
        self.with_signature(Vec::new())
    }

    /// Gas charged before any VM execution.
    pub fn intrinsic_gas(&self) -> u64 {
        intrinsic_gas(&self.clauses)
    }
}

/// Intrinsic gas of a clause list: base cost, per-clause cost and data
/// cost. An empty list is charged like one message call.
pub fn intrinsic_gas(clauses: &[Clause]) -> u64 {
    if clauses.is_empty() {
        return TX_GAS + CLAUSE_GAS;
    }
    clauses.iter().fold(TX_GAS, |total, clause| {
        let clause_gas = if clause.is_creation() {
            CLAUSE_GAS_CONTRACT_CREATION
        } else {
            CLAUSE_GAS
        };
        total
            .saturating_add(clause_gas)
            .saturating_add(data_gas(&clause.data))
    })
}

fn data_gas(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, b| {
        acc.saturating_add(if *b == 0 {
            TX_DATA_ZERO_GAS
        } else {
            TX_DATA_NON_ZERO_GAS
        })
    })
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`Transaction`] values.
///
/// ```rust,no_run
/// use thor_mesh::transaction::{Clause, TransactionBuilder};
/// use thor_mesh::address::Address;
/// use primitive_types::U256;
///
/// let to: Address = "0x7567d83b7b8d80addcb281a71d54fc7b3364ffed".parse().unwrap();
/// let tx = TransactionBuilder::new(0x27)
///     .block_ref(0x00a1_b2c3_0000_0000)
///     .expiration(720)
///     .clause(Clause::transfer(to, U256::exp10(18)))
///     .gas(21_000)
///     .nonce(42)
///     .build();
/// ```
///
/// Defaults: legacy pricing with coefficient 0, no dependency, no
/// delegation, expiration 0.
pub struct TransactionBuilder {
    chain_tag: u8,
    block_ref: u64,
    expiration: u32,
    clauses: Vec<Clause>,
    fee: FeeParams,
    gas: u64,
    depends_on: Option<[u8; 32]>,
    nonce: u64,
    reserved: Reserved,
}

impl TransactionBuilder {
    pub fn new(chain_tag: u8) -> Self {
        Self {
            chain_tag,
            block_ref: 0,
            expiration: 0,
            clauses: Vec::new(),
            fee: FeeParams::default(),
            gas: 0,
            depends_on: None,
            nonce: 0,
            reserved: Reserved::default(),
        }
    }

    pub fn block_ref(mut self, block_ref: u64) -> Self {
        self.block_ref = block_ref;
        self
    }

    pub fn expiration(mut self, expiration: u32) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(mut self, clauses: Vec<Clause>) -> Self {
        self.clauses = clauses;
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub fn gas_price_coef(mut self, coef: u8) -> Self {
        self.fee = FeeParams::Legacy {
            gas_price_coef: coef,
        };
        self
    }

    pub fn dynamic_fee(mut self, max_priority_fee_per_gas: U256, max_fee_per_gas: U256) -> Self {
        self.fee = FeeParams::DynamicFee {
            max_priority_fee_per_gas,
            max_fee_per_gas,
        };
        self
    }

    pub fn fee(mut self, fee: FeeParams) -> Self {
        self.fee = fee;
        self
    }

    pub fn depends_on(mut self, id: [u8; 32]) -> Self {
        self.depends_on = Some(id);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Marks the transaction as fee-delegated.
    pub fn delegated(mut self, delegated: bool) -> Self {
        if delegated {
            self.reserved.features |= DELEGATION_FEATURE;
        } else {
            self.reserved.features &= !DELEGATION_FEATURE;
        }
        self
    }

    pub fn build(self) -> Transaction {
        Transaction {
            chain_tag: self.chain_tag,
            block_ref: self.block_ref,
            expiration: self.expiration,
            clauses: self.clauses,
            fee: self.fee,
            gas: self.gas,
            depends_on: self.depends_on,
            nonce: self.nonce,
            reserved: self.reserved,
            signature: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
