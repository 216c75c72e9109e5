//! In-memory [`ThorClient`] for tests and demos.
//!
//! State sits behind a `parking_lot::RwLock` so tests can reconfigure the
//! node between calls through a shared `Arc<MockThorClient>`.

use async_trait::async_trait;
use parking_lot::RwLock;
use primitive_types::U256;
use std::collections::HashMap;
use std::time::Duration;

use super::types::{
    Account, ApiTransaction, Block, CallResult, DynamicGasPrice, MempoolStatus, Peer, Revision,
};
use super::ThorClient;
use crate::address::Address;
use crate::config::CHAIN_TAG_TEST;
use crate::crypto::blake2b256;
use crate::error::{MeshError, NodeCall, Result};
use crate::transaction::clause::Clause;
use crate::transaction::codec;

struct MockState {
    chain_tag: u8,
    best_block: Block,
    accounts: HashMap<Address, Account>,
    contract_results: HashMap<(Address, Vec<u8>), CallResult>,
    inspect_gas: u64,
    inspect_revert: Option<String>,
    dynamic_gas_price: Option<DynamicGasPrice>,
    sync_progress: f64,
    peers: Vec<Peer>,
    mempool: Vec<ApiTransaction>,
    submitted: Vec<Vec<u8>>,
    unavailable: bool,
    delay: Option<Duration>,
    contract_calls: usize,
}

/// A chain node that lives in memory.
///
/// Defaults: testnet chain tag, best block #100 with a base fee, no
/// accounts, every dry-run clause using 0 VM gas.
pub struct MockThorClient {
    state: RwLock<MockState>,
}

impl Default for MockThorClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockThorClient {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState {
                chain_tag: CHAIN_TAG_TEST,
                best_block: mock_block(100),
                accounts: HashMap::new(),
                contract_results: HashMap::new(),
                inspect_gas: 0,
                inspect_revert: None,
                dynamic_gas_price: Some(DynamicGasPrice {
                    base_fee: U256::from(10_000_000_000_000u64),
                    max_priority_fee_per_gas: U256::from(1_000_000_000u64),
                }),
                sync_progress: 1.0,
                peers: Vec::new(),
                mempool: Vec::new(),
                submitted: Vec::new(),
                unavailable: false,
                delay: None,
                contract_calls: 0,
            }),
        }
    }

    pub fn set_chain_tag(&self, tag: u8) {
        self.state.write().chain_tag = tag;
    }

    pub fn set_best_block(&self, block: Block) {
        self.state.write().best_block = block;
    }

    pub fn set_account(&self, address: Address, account: Account) {
        self.state.write().accounts.insert(address, account);
    }

    /// Answer `data` sent to `contract` with `result`.
    pub fn set_contract_result(&self, contract: Address, data: Vec<u8>, result: CallResult) {
        self.state
            .write()
            .contract_results
            .insert((contract, data), result);
    }

    /// VM gas every inspected clause reports.
    pub fn set_inspect_gas(&self, gas: u64) {
        self.state.write().inspect_gas = gas;
    }

    /// Makes every inspected clause revert with `vm_error`.
    pub fn set_inspect_revert(&self, vm_error: Option<String>) {
        self.state.write().inspect_revert = vm_error;
    }

    /// `None` simulates a node without fee-market support.
    pub fn set_dynamic_gas_price(&self, price: Option<DynamicGasPrice>) {
        self.state.write().dynamic_gas_price = price;
    }

    pub fn set_sync_progress(&self, progress: f64) {
        self.state.write().sync_progress = progress;
    }

    pub fn set_peers(&self, peers: Vec<Peer>) {
        self.state.write().peers = peers;
    }

    pub fn add_mempool_transaction(&self, tx: ApiTransaction) {
        self.state.write().mempool.push(tx);
    }

    /// While set, every call fails with a retriable node error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().delay = delay;
    }

    /// Raw transactions accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.state.read().submitted.clone()
    }

    /// Number of `call_contract` invocations served.
    pub fn contract_calls(&self) -> usize {
        self.state.read().contract_calls
    }

    async fn enter(&self, call: NodeCall) -> Result<()> {
        let (delay, unavailable) = {
            let state = self.state.read();
            (state.delay, state.unavailable)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unavailable {
            return Err(MeshError::node(call, "node unavailable"));
        }
        Ok(())
    }
}

/// A block whose id starts with its big-endian number, like the real chain.
pub fn mock_block(number: u64) -> Block {
    let mut id = [0u8; 32];
    id[..4].copy_from_slice(&(number as u32).to_be_bytes());
    id[4..].copy_from_slice(&blake2b256(&number.to_be_bytes())[4..]);
    Block {
        number,
        id: format!("0x{}", hex::encode(id)),
        parent_id: format!("0x{}", hex::encode([0u8; 32])),
        timestamp: 1_700_000_000 + number * 10,
        gas_limit: 40_000_000,
        base_fee_per_gas: Some("0x9184e72a000".to_string()),
        transactions: Vec::new(),
    }
}

#[async_trait]
impl ThorClient for MockThorClient {
    async fn get_account(&self, address: &Address, _revision: Revision) -> Result<Account> {
        self.enter(NodeCall::Account).await?;
        Ok(self
            .state
            .read()
            .accounts
            .get(address)
            .cloned()
            .unwrap_or_else(|| Account::new(U256::zero(), U256::zero())))
    }

    async fn get_block(&self, revision: Revision) -> Result<Block> {
        self.enter(NodeCall::Block).await?;
        let best = self.state.read().best_block.clone();
        match revision {
            Revision::Best | Revision::Finalized => Ok(best),
            Revision::Number(n) if n <= best.number => Ok(mock_block(n)),
            other => Err(MeshError::node(
                NodeCall::Block,
                format!("block {} not found", other),
            )),
        }
    }

    async fn get_best_block(&self) -> Result<Block> {
        self.enter(NodeCall::BestBlock).await?;
        Ok(self.state.read().best_block.clone())
    }

    async fn get_chain_tag(&self) -> Result<u8> {
        self.enter(NodeCall::ChainTag).await?;
        Ok(self.state.read().chain_tag)
    }

    async fn submit_transaction(&self, raw: &[u8]) -> Result<String> {
        self.enter(NodeCall::Submit).await?;
        let tx = codec::decode(raw).map_err(|e| MeshError::node(NodeCall::Submit, e))?;
        let origin = tx
            .recover_origin()
            .map_err(|e| MeshError::node(NodeCall::Submit, e))?;
        self.state.write().submitted.push(raw.to_vec());
        Ok(format!("0x{}", hex::encode(tx.id(&origin))))
    }

    async fn get_dynamic_gas_price(&self) -> Result<DynamicGasPrice> {
        self.enter(NodeCall::DynamicGasPrice).await?;
        self.state
            .read()
            .dynamic_gas_price
            .ok_or_else(|| MeshError::node(NodeCall::DynamicGasPrice, "fee market not active"))
    }

    async fn get_sync_progress(&self) -> Result<f64> {
        self.enter(NodeCall::SyncProgress).await?;
        Ok(self.state.read().sync_progress)
    }

    async fn get_peers(&self) -> Result<Vec<Peer>> {
        self.enter(NodeCall::Peers).await?;
        Ok(self.state.read().peers.clone())
    }

    async fn get_mempool_transactions(&self, origin: Option<&Address>) -> Result<Vec<String>> {
        self.enter(NodeCall::Mempool).await?;
        let origin = origin.map(|o| o.to_string());
        Ok(self
            .state
            .read()
            .mempool
            .iter()
            .filter(|tx| origin.as_ref().map_or(true, |o| tx.origin.eq_ignore_ascii_case(o)))
            .map(|tx| tx.id.clone())
            .collect())
    }

    async fn get_mempool_transaction(&self, id: &str) -> Result<Option<ApiTransaction>> {
        self.enter(NodeCall::Mempool).await?;
        Ok(self
            .state
            .read()
            .mempool
            .iter()
            .find(|tx| tx.id.eq_ignore_ascii_case(id))
            .cloned())
    }

    async fn get_mempool_status(&self) -> Result<MempoolStatus> {
        self.enter(NodeCall::Mempool).await?;
        Ok(MempoolStatus {
            total: self.state.read().mempool.len() as u64,
        })
    }

    async fn call_contract(
        &self,
        contract: &Address,
        data: &[u8],
        _revision: Revision,
    ) -> Result<CallResult> {
        self.enter(NodeCall::ContractCall).await?;
        let mut state = self.state.write();
        state.contract_calls += 1;
        Ok(state
            .contract_results
            .get(&(*contract, data.to_vec()))
            .cloned()
            .unwrap_or_else(|| CallResult::reverted("execution reverted")))
    }

    async fn inspect_clauses(
        &self,
        clauses: &[Clause],
        _caller: Option<&Address>,
        _revision: Revision,
    ) -> Result<Vec<CallResult>> {
        self.enter(NodeCall::InspectClauses).await?;
        let state = self.state.read();
        Ok(clauses
            .iter()
            .map(|_| match &state.inspect_revert {
                Some(vm_error) => CallResult::reverted(vm_error.clone()),
                None => CallResult::success(&[], state.inspect_gas),
            })
            .collect())
    }
}
