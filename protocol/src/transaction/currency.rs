//! Token contract → [`Currency`] resolution.
//!
//! [`TokenRegistry`] answers from its static table first (VTHO plus any
//! operator-supplied tokens). Unknown contracts are read on chain through
//! `symbol()` and `decimals()` when a node client is attached. Results are
//! not cached; every lookup of an unknown contract costs two calls.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::abi::{decode_decimals, decode_symbol, encode_decimals_call, encode_symbol_call};
use super::types::Currency;
use crate::address::Address;
use crate::client::{with_timeout, Revision, ThorClient};
use crate::config::{vtho_currency, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{MeshError, NodeCall, Result};

/// Maps a contract address to its token currency.
///
/// `Ok(None)` means "not a token". An `Err` is a failure to find out and is
/// retriable when the node was at fault.
#[async_trait]
pub trait CurrencyResolver: Send + Sync {
    async fn resolve(&self, contract: &Address) -> Result<Option<Currency>>;
}

pub struct TokenRegistry {
    tokens: Vec<Currency>,
    client: Option<Arc<dyn ThorClient>>,
    timeout: Duration,
}

impl TokenRegistry {
    /// Static-only registry holding VTHO followed by `extra`.
    pub fn new(extra: Vec<Currency>) -> Self {
        let vtho = vtho_currency();
        let mut tokens = vec![vtho.clone()];
        tokens.extend(extra.into_iter().filter(|c| !c.same_as(&vtho)));
        Self {
            tokens,
            client: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Enables on-chain lookup for contracts missing from the table.
    pub fn with_client(mut self, client: Arc<dyn ThorClient>, timeout: Duration) -> Self {
        self.client = Some(client);
        self.timeout = timeout;
        self
    }

    pub fn tokens(&self) -> &[Currency] {
        &self.tokens
    }

    pub fn lookup_static(&self, contract: &Address) -> Option<Currency> {
        self.tokens
            .iter()
            .find(|c| c.contract_address().as_ref() == Some(contract))
            .cloned()
    }

    async fn read_contract(
        &self,
        client: &dyn ThorClient,
        contract: &Address,
        data: Vec<u8>,
    ) -> Result<Option<Vec<u8>>> {
        let result = with_timeout(
            NodeCall::ContractCall,
            self.timeout,
            client.call_contract(contract, &data, Revision::Best),
        )
        .await?;
        if result.reverted {
            return Ok(None);
        }
        Ok(result.output().ok())
    }
}

#[async_trait]
impl CurrencyResolver for TokenRegistry {
    async fn resolve(&self, contract: &Address) -> Result<Option<Currency>> {
        if let Some(currency) = self.lookup_static(contract) {
            return Ok(Some(currency));
        }
        let Some(client) = self.client.as_deref() else {
            return Ok(None);
        };

        let symbol = match self.read_contract(client, contract, encode_symbol_call()).await? {
            Some(out) => decode_symbol(&out),
            None => None,
        };
        let Some(symbol) = symbol else {
            debug!(%contract, "contract has no readable symbol");
            return Ok(None);
        };
        let decimals = match self.read_contract(client, contract, encode_decimals_call()).await? {
            Some(out) => decode_decimals(&out),
            None => None,
        };
        let Some(decimals) = decimals else {
            debug!(%contract, %symbol, "contract has no readable decimals");
            return Ok(None);
        };

        debug!(%contract, %symbol, decimals, "resolved token on chain");
        Ok(Some(Currency::token(symbol, decimals, contract)))
    }
}

/// Parses an operator token list: a JSON array of currencies, each with a
/// `metadata.contractAddress`.
pub fn parse_token_list(json: &str) -> Result<Vec<Currency>> {
    let tokens: Vec<Currency> = serde_json::from_str(json)
        .map_err(|e| MeshError::InvalidRequest(format!("token list: {}", e)))?;
    tokens
        .into_iter()
        .map(|mut token| {
            let raw = token
                .metadata
                .as_ref()
                .map(|m| m.contract_address.clone())
                .ok_or_else(|| {
                    MeshError::InvalidRequest(format!("token {} has no contract", token.symbol))
                })?;
            let contract: Address = raw.parse()?;
            if let Some(meta) = token.metadata.as_mut() {
                meta.contract_address = contract.to_string();
            }
            Ok(token)
        })
        .collect()
}
