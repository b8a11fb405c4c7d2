use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bitcoin::{BlockHash, Txid};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chain::SwapNetwork;
use crate::chain::rpc::ChainRpc;
use crate::error::{Result, SwapError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    Transaction { id: Txid, block: Option<BlockHash> },
    Error { code: &'static str, message: String },
}

impl ListenerEvent {
    fn from_error(err: &SwapError) -> Self {
        ListenerEvent::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

async fn forward(events: Vec<ListenerEvent>, tx: &mpsc::Sender<ListenerEvent>) -> bool {
    for event in events {
        if tx.send(event).await.is_err() {
            return false;
        }
    }
    !tx.is_closed()
}

pub struct MempoolListener {
    chain: Arc<dyn ChainRpc>,
    network: SwapNetwork,
    interval: Duration,
    seen: HashSet<Txid>,
}

impl MempoolListener {
    pub fn new(chain: Arc<dyn ChainRpc>, network: SwapNetwork, interval: Duration) -> Self {
        Self {
            chain,
            network,
            interval,
            seen: HashSet::new(),
        }
    }

    pub async fn poll_once(&mut self) -> Result<Vec<Txid>> {
        let mempool = self.chain.mempool(self.network).await?;

        let fresh = mempool
            .iter()
            .filter(|id| !self.seen.contains(*id))
            .copied()
            .collect();
        self.seen = mempool.into_iter().collect();
        Ok(fresh)
    }

    pub fn spawn(mut self, tx: mpsc::Sender<ListenerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let events = match self.poll_once().await {
                    Ok(ids) => ids
                        .into_iter()
                        .map(|id| ListenerEvent::Transaction { id, block: None })
                        .collect(),
                    Err(err) => {
                        tracing::warn!(
                            network = %self.network,
                            error = %err,
                            "mempool poll failed"
                        );
                        vec![ListenerEvent::from_error(&err)]
                    }
                };

                if !forward(events, &tx).await {
                    tracing::debug!(network = %self.network, "mempool listener stopped");
                    return;
                }

                tokio::time::sleep(self.interval).await;
            }
        })
    }
}

pub struct BlockListener {
    chain: Arc<dyn ChainRpc>,
    network: SwapNetwork,
    interval: Duration,
    depth: u32,
    tip: Option<BlockHash>,
    seen: HashSet<Txid>,
}

impl BlockListener {
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        network: SwapNetwork,
        interval: Duration,
        depth: u32,
    ) -> Self {
        Self {
            chain,
            network,
            interval,
            depth: depth.max(1),
            tip: None,
            seen: HashSet::new(),
        }
    }

    /// On a new tip, walks back `depth` blocks and returns the ids not seen
    /// in the previous window, each with the block that contains it.
    pub async fn poll_once(&mut self) -> Result<Vec<(Txid, BlockHash)>> {
        let tip = self.chain.current_hash(self.network).await?;
        if self.tip == Some(tip) {
            return Ok(Vec::new());
        }

        let mut window = HashSet::new();
        let mut fresh = Vec::new();
        let mut cursor = Some(tip);

        for _ in 0..self.depth {
            let Some(block) = cursor else { break };

            for id in self.chain.block_transaction_ids(self.network, &block).await? {
                if window.insert(id) && !self.seen.contains(&id) {
                    fresh.push((id, block));
                }
            }

            cursor = self
                .chain
                .block_header(self.network, &block)
                .await?
                .previous_block_hash;
        }

        tracing::debug!(
            network = %self.network,
            tip = %tip,
            fresh = fresh.len(),
            "scanned new tip"
        );

        self.tip = Some(tip);
        self.seen = window;
        Ok(fresh)
    }

    pub fn spawn(mut self, tx: mpsc::Sender<ListenerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let events = match self.poll_once().await {
                    Ok(ids) => ids
                        .into_iter()
                        .map(|(id, block)| ListenerEvent::Transaction {
                            id,
                            block: Some(block),
                        })
                        .collect(),
                    Err(err) => {
                        tracing::warn!(network = %self.network, error = %err, "block poll failed");
                        vec![ListenerEvent::from_error(&err)]
                    }
                };

                if !forward(events, &tx).await {
                    tracing::debug!(network = %self.network, "block listener stopped");
                    return;
                }

                tokio::time::sleep(self.interval).await;
            }
        })
    }
}
