//! # Chain-Node Client
//!
//! Everything the Construction API needs from a running chain node, behind
//! one async trait. The pipeline, the currency resolver and the HTTP layer
//! only ever see `dyn ThorClient` or a generic `C: ThorClient`.
//!
//! ```text
//! types.rs — REST wire types (Block, Account, ApiTransaction, CallResult, ...)
//! http.rs  — HttpThorClient, the reqwest implementation
//! mock.rs  — MockThorClient, an in-memory node for tests and demos
//! ```
//!
//! Every method fails with [`MeshError::Node`](crate::error::MeshError::Node)
//! tagged with the [`NodeCall`](crate::error::NodeCall) that failed, so
//! callers can tell a transient node problem from a bad request.

pub mod http;
pub mod mock;
pub mod types;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::address::Address;
use crate::error::{MeshError, NodeCall, Result};
use crate::transaction::clause::Clause;

pub use http::HttpThorClient;
pub use mock::MockThorClient;
pub use types::{
    Account, ApiClause, ApiTransaction, Block, CallResult, DynamicGasPrice, MempoolStatus, Peer,
    Revision,
};

/// Read and submit access to a chain node.
#[async_trait]
pub trait ThorClient: Send + Sync {
    async fn get_account(&self, address: &Address, revision: Revision) -> Result<Account>;

    async fn get_block(&self, revision: Revision) -> Result<Block>;

    async fn get_best_block(&self) -> Result<Block> {
        self.get_block(Revision::Best).await
    }

    async fn get_block_by_number(&self, number: u64) -> Result<Block> {
        self.get_block(Revision::Number(number)).await
    }

    /// Chain tag of the connected network.
    async fn get_chain_tag(&self) -> Result<u8>;

    /// Submits raw transaction bytes. Returns the `0x`-hex id the node
    /// accepted.
    async fn submit_transaction(&self, raw: &[u8]) -> Result<String>;

    async fn get_dynamic_gas_price(&self) -> Result<DynamicGasPrice>;

    /// Fraction of the chain the node has synced, in `[0, 1]`.
    async fn get_sync_progress(&self) -> Result<f64>;

    async fn get_peers(&self) -> Result<Vec<Peer>>;

    /// Ids of pending transactions, optionally filtered by origin.
    async fn get_mempool_transactions(&self, origin: Option<&Address>) -> Result<Vec<String>>;

    async fn get_mempool_transaction(&self, id: &str) -> Result<Option<ApiTransaction>>;

    async fn get_mempool_status(&self) -> Result<MempoolStatus>;

    /// Read-only call of one contract method.
    async fn call_contract(
        &self,
        contract: &Address,
        data: &[u8],
        revision: Revision,
    ) -> Result<CallResult>;

    /// Dry-runs a clause list. One result per clause.
    async fn inspect_clauses(
        &self,
        clauses: &[Clause],
        caller: Option<&Address>,
        revision: Revision,
    ) -> Result<Vec<CallResult>>;
}

/// Runs one node call under a deadline. Expiry is reported as a failure of
/// `call`, which makes it retriable like any other node error.
pub async fn with_timeout<T, F>(call: NodeCall, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(%call, timeout_ms = timeout.as_millis() as u64, "chain node call timed out");
            Err(MeshError::node(
                call,
                format!("timed out after {}ms", timeout.as_millis()),
            ))
        }
    }
}
