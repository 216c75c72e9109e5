//! [`ThorClient`] over the node's REST API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{
    Account, ApiTransaction, Block, CallResult, DynamicGasPrice, MempoolStatus, Peer, Revision,
};
use super::ThorClient;
use crate::address::Address;
use crate::error::{MeshError, NodeCall, Result};
use crate::transaction::clause::Clause;
use crate::transaction::types::{encode_hex_bytes, parse_quantity};

#[derive(Clone)]
pub struct HttpThorClient {
    base: String,
    client: Client,
}

#[derive(Serialize)]
struct InspectRequest<'a> {
    clauses: &'a [Clause],
    #[serde(skip_serializing_if = "Option::is_none")]
    caller: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriorityFee {
    max_priority_fee_per_gas: String,
}

#[derive(serde::Deserialize)]
struct SubmitResponse {
    id: String,
}

impl HttpThorClient {
    /// `base` is the node URL, e.g. `http://localhost:8669`. Every request
    /// is bounded by `timeout`.
    pub fn new(base: impl Into<String>, timeout: Duration) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let base = base.into().trim_end_matches('/').to_string();
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    async fn get_json<T: DeserializeOwned>(&self, call: NodeCall, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        debug!(%url, %call, "node GET");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| node_error(call, e))?;
        read_json(call, resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        call: NodeCall,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        debug!(%url, %call, "node POST");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| node_error(call, e))?;
        read_json(call, resp).await
    }
}

fn node_error(call: NodeCall, err: impl std::fmt::Display) -> MeshError {
    warn!(%call, error = %err, "chain node call failed");
    MeshError::node(call, err)
}

async fn read_json<T: DeserializeOwned>(call: NodeCall, resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(node_error(call, format!("{} {}", status, text.trim())));
    }
    resp.json::<T>().await.map_err(|e| node_error(call, e))
}

#[async_trait]
impl ThorClient for HttpThorClient {
    async fn get_account(&self, address: &Address, revision: Revision) -> Result<Account> {
        self.get_json(
            NodeCall::Account,
            &format!("/accounts/{}?revision={}", address, revision),
        )
        .await
    }

    async fn get_block(&self, revision: Revision) -> Result<Block> {
        let block: Option<Block> = self
            .get_json(NodeCall::Block, &format!("/blocks/{}", revision))
            .await?;
        block.ok_or_else(|| node_error(NodeCall::Block, format!("block {} not found", revision)))
    }

    async fn get_best_block(&self) -> Result<Block> {
        self.get_block(Revision::Best).await.map_err(|e| match e {
            MeshError::Node { message, .. } => MeshError::node(NodeCall::BestBlock, message),
            other => other,
        })
    }

    async fn get_chain_tag(&self) -> Result<u8> {
        let genesis = self.get_block(Revision::Number(0)).await.map_err(|e| match e {
            MeshError::Node { message, .. } => MeshError::node(NodeCall::ChainTag, message),
            other => other,
        })?;
        genesis.chain_tag()
    }

    async fn submit_transaction(&self, raw: &[u8]) -> Result<String> {
        let body = serde_json::json!({ "raw": encode_hex_bytes(raw) });
        let resp: SubmitResponse = self
            .post_json(NodeCall::Submit, "/transactions", &body)
            .await?;
        Ok(resp.id)
    }

    async fn get_dynamic_gas_price(&self) -> Result<DynamicGasPrice> {
        let best = self.get_best_block().await?;
        let base_fee = best
            .base_fee()?
            .ok_or_else(|| node_error(NodeCall::DynamicGasPrice, "best block has no base fee"))?;
        let priority: PriorityFee = self
            .get_json(NodeCall::DynamicGasPrice, "/fees/priority")
            .await?;
        Ok(DynamicGasPrice {
            base_fee,
            max_priority_fee_per_gas: parse_quantity(&priority.max_priority_fee_per_gas)?,
        })
    }

    async fn get_sync_progress(&self) -> Result<f64> {
        let to_sync_error = |e: MeshError| match e {
            MeshError::Node { message, .. } => MeshError::node(NodeCall::SyncProgress, message),
            other => other,
        };
        let genesis = self
            .get_block(Revision::Number(0))
            .await
            .map_err(to_sync_error)?;
        let best = self.get_block(Revision::Best).await.map_err(to_sync_error)?;
        Ok(sync_progress(
            genesis.timestamp,
            best.timestamp,
            Utc::now().timestamp() as u64,
        ))
    }

    async fn get_peers(&self) -> Result<Vec<Peer>> {
        self.get_json(NodeCall::Peers, "/node/network/peers").await
    }

    async fn get_mempool_transactions(&self, origin: Option<&Address>) -> Result<Vec<String>> {
        let path = match origin {
            Some(origin) => format!("/node/txpool?origin={}", origin),
            None => "/node/txpool".to_string(),
        };
        self.get_json(NodeCall::Mempool, &path).await
    }

    async fn get_mempool_transaction(&self, id: &str) -> Result<Option<ApiTransaction>> {
        self.get_json(NodeCall::Mempool, &format!("/transactions/{}?pending=true", id))
            .await
    }

    async fn get_mempool_status(&self) -> Result<MempoolStatus> {
        self.get_json(NodeCall::Mempool, "/node/txpool/status").await
    }

    async fn call_contract(
        &self,
        contract: &Address,
        data: &[u8],
        revision: Revision,
    ) -> Result<CallResult> {
        let clauses = [Clause::new(Some(*contract), Default::default(), data.to_vec())];
        let body = InspectRequest {
            clauses: &clauses,
            caller: None,
        };
        let mut results: Vec<CallResult> = self
            .post_json(
                NodeCall::ContractCall,
                &format!("/accounts/*?revision={}", revision),
                &body,
            )
            .await?;
        results
            .pop()
            .ok_or_else(|| node_error(NodeCall::ContractCall, "empty call result"))
    }

    async fn inspect_clauses(
        &self,
        clauses: &[Clause],
        caller: Option<&Address>,
        revision: Revision,
    ) -> Result<Vec<CallResult>> {
        let body = InspectRequest {
            clauses,
            caller: caller.map(|c| c.to_string()),
        };
        self.post_json(
            NodeCall::InspectClauses,
            &format!("/accounts/*?revision={}", revision),
            &body,
        )
        .await
    }
}

/// Share of wall-clock time since genesis that the best block covers.
fn sync_progress(genesis_ts: u64, best_ts: u64, now: u64) -> f64 {
    if now <= genesis_ts {
        return 1.0;
    }
    let progress = best_ts.saturating_sub(genesis_ts) as f64 / (now - genesis_ts) as f64;
    progress.clamp(0.0, 1.0)
}
