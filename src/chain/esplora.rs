use std::collections::HashMap;
use std::str::FromStr as _;

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use reqwest::Client;
use serde::Deserialize;

use super::SwapNetwork;
use super::rpc::{BlockHeaderInfo, ChainRpc};
use crate::error::{Result, SwapError};

#[derive(Debug, Clone)]
pub struct EsploraChain {
    client: Client,
    base_urls: HashMap<SwapNetwork, String>,
}

#[derive(Debug, Deserialize)]
struct EsploraBlock {
    height: u32,
    timestamp: u64,
    previousblockhash: Option<String>,
}

impl EsploraChain {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_urls: HashMap::new(),
        }
    }

    pub fn with_network(mut self, network: SwapNetwork, base_url: &str) -> Self {
        self.base_urls
            .insert(network, base_url.trim_end_matches('/').to_string());
        self
    }

    fn url(&self, network: SwapNetwork, path: &str) -> Result<String> {
        let base = self
            .base_urls
            .get(&network)
            .ok_or_else(|| SwapError::chain(format!("no esplora endpoint for {network}")))?;
        Ok(format!("{base}{path}"))
    }

    async fn get_text(&self, network: SwapNetwork, path: &str) -> Result<String> {
        let url = self.url(network, path)?;
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SwapError::chain(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(SwapError::chain(format!("GET {url}: {}", resp.status())));
        }
        resp.text()
            .await
            .map(|s| s.trim().to_string())
            .map_err(|e| SwapError::chain(format!("read {url}: {e}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        network: SwapNetwork,
        path: &str,
    ) -> Result<T> {
        let url = self.url(network, path)?;
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SwapError::chain(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(SwapError::chain(format!("GET {url}: {}", resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| SwapError::chain(format!("decode {url}: {e}")))
    }
}

impl Default for EsploraChain {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_txids(ids: Vec<String>) -> Result<Vec<Txid>> {
    ids.iter()
        .map(|id| Txid::from_str(id).map_err(|e| SwapError::chain(format!("txid {id}: {e}"))))
        .collect()
}

#[async_trait]
impl ChainRpc for EsploraChain {
    async fn current_hash(&self, network: SwapNetwork) -> Result<BlockHash> {
        let hash = self.get_text(network, "/blocks/tip/hash").await?;
        BlockHash::from_str(&hash).map_err(|e| SwapError::chain(format!("tip hash {hash}: {e}")))
    }

    async fn block_header(
        &self,
        network: SwapNetwork,
        block: &BlockHash,
    ) -> Result<BlockHeaderInfo> {
        let info: EsploraBlock = self.get_json(network, &format!("/block/{block}")).await?;
        let tip_height: u32 = self
            .get_text(network, "/blocks/tip/height")
            .await?
            .parse()
            .map_err(|e| SwapError::chain(format!("tip height: {e}")))?;

        let previous_block_hash = info
            .previousblockhash
            .as_deref()
            .map(BlockHash::from_str)
            .transpose()
            .map_err(|e| SwapError::chain(format!("previous block hash: {e}")))?;

        Ok(BlockHeaderInfo {
            previous_block_hash,
            created_at: info.timestamp,
            current_confirmation_count: tip_height.saturating_sub(info.height) + 1,
            height: info.height,
        })
    }

    async fn block_transaction_ids(
        &self,
        network: SwapNetwork,
        block: &BlockHash,
    ) -> Result<Vec<Txid>> {
        let ids: Vec<String> = self
            .get_json(network, &format!("/block/{block}/txids"))
            .await?;
        parse_txids(ids)
    }

    async fn mempool(&self, network: SwapNetwork) -> Result<Vec<Txid>> {
        let ids: Vec<String> = self.get_json(network, "/mempool/txids").await?;
        parse_txids(ids)
    }

    async fn transaction(&self, network: SwapNetwork, id: &Txid) -> Result<String> {
        self.get_text(network, &format!("/tx/{id}/hex")).await
    }

    async fn broadcast_transaction(&self, network: SwapNetwork, tx_hex: &str) -> Result<Txid> {
        let url = self.url(network, "/tx")?;
        let resp = self
            .client
            .post(&url)
            .body(tx_hex.to_string())
            .send()
            .await
            .map_err(|e| SwapError::chain(format!("POST {url}: {e}")))?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(SwapError::chain(format!("broadcast rejected: {error_text}")));
        }

        let txid = resp
            .text()
            .await
            .map_err(|e| SwapError::chain(format!("read broadcast response: {e}")))?;
        Txid::from_str(txid.trim()).map_err(|e| SwapError::chain(format!("broadcast txid: {e}")))
    }
}
