use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use serde::Serialize;

use super::SwapNetwork;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockHeaderInfo {
    pub previous_block_hash: Option<BlockHash>,
    pub created_at: u64,
    pub current_confirmation_count: u32,
    pub height: u32,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn current_hash(&self, network: SwapNetwork) -> Result<BlockHash>;

    async fn block_header(&self, network: SwapNetwork, block: &BlockHash)
    -> Result<BlockHeaderInfo>;

    async fn block_transaction_ids(
        &self,
        network: SwapNetwork,
        block: &BlockHash,
    ) -> Result<Vec<Txid>>;

    async fn mempool(&self, network: SwapNetwork) -> Result<Vec<Txid>>;

    async fn transaction(&self, network: SwapNetwork, id: &Txid) -> Result<String>;

    async fn broadcast_transaction(&self, network: SwapNetwork, tx_hex: &str) -> Result<Txid>;
}
