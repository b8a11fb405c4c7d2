use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bitcoin::consensus::encode::{deserialize_hex, serialize_hex};
use bitcoin::hashes::Hash as _;
use bitcoin::{BlockHash, Transaction, Txid};
use chain_swaps::chain::SwapNetwork;
use chain_swaps::chain::rpc::{BlockHeaderInfo, ChainRpc};
use chain_swaps::error::{Result, SwapError};

#[derive(Default)]
struct State {
    mempool: Vec<Txid>,
    blocks: Vec<(BlockHash, Vec<Txid>)>,
    transactions: HashMap<Txid, String>,
    fetches: HashMap<Txid, usize>,
    failing: bool,
}

/// In-process chain: transactions enter the mempool and `mine` moves the
/// whole mempool into a new block.
pub struct FakeChain {
    state: Mutex<State>,
}

impl FakeChain {
    pub fn new() -> Self {
        let genesis = BlockHash::from_byte_array([1u8; 32]);
        Self {
            state: Mutex::new(State {
                blocks: vec![(genesis, Vec::new())],
                ..State::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake chain mutex poisoned")
    }

    pub fn add_to_mempool(&self, tx: &Transaction) -> Txid {
        let id = tx.compute_txid();
        let mut state = self.state();
        state.transactions.insert(id, serialize_hex(tx));
        state.mempool.push(id);
        id
    }

    /// Announces an id the chain cannot serve.
    pub fn add_unknown_to_mempool(&self, id: Txid) {
        self.state().mempool.push(id);
    }

    pub fn mine(&self) -> BlockHash {
        let mut state = self.state();
        let hash = BlockHash::from_byte_array([state.blocks.len() as u8 + 1; 32]);
        let txids = std::mem::take(&mut state.mempool);
        state.blocks.push((hash, txids));
        hash
    }

    pub fn fetch_count(&self, id: &Txid) -> usize {
        self.state().fetches.get(id).copied().unwrap_or_default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    fn check(&self) -> Result<()> {
        if self.state().failing {
            return Err(SwapError::chain("fake chain unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn current_hash(&self, _network: SwapNetwork) -> Result<BlockHash> {
        self.check()?;
        let state = self.state();
        state
            .blocks
            .last()
            .map(|(hash, _)| *hash)
            .ok_or_else(|| SwapError::chain("no blocks"))
    }

    async fn block_header(
        &self,
        _network: SwapNetwork,
        block: &BlockHash,
    ) -> Result<BlockHeaderInfo> {
        self.check()?;
        let state = self.state();
        let height = state
            .blocks
            .iter()
            .position(|(hash, _)| hash == block)
            .ok_or_else(|| SwapError::chain(format!("unknown block {block}")))?;
        Ok(BlockHeaderInfo {
            previous_block_hash: height.checked_sub(1).map(|prev| state.blocks[prev].0),
            created_at: 1_700_000_000 + height as u64 * 600,
            current_confirmation_count: (state.blocks.len() - height) as u32,
            height: height as u32,
        })
    }

    async fn block_transaction_ids(
        &self,
        _network: SwapNetwork,
        block: &BlockHash,
    ) -> Result<Vec<Txid>> {
        self.check()?;
        let state = self.state();
        state
            .blocks
            .iter()
            .find(|(hash, _)| hash == block)
            .map(|(_, txids)| txids.clone())
            .ok_or_else(|| SwapError::chain(format!("unknown block {block}")))
    }

    async fn mempool(&self, _network: SwapNetwork) -> Result<Vec<Txid>> {
        self.check()?;
        Ok(self.state().mempool.clone())
    }

    async fn transaction(&self, _network: SwapNetwork, id: &Txid) -> Result<String> {
        self.check()?;
        let mut state = self.state();
        *state.fetches.entry(*id).or_default() += 1;
        state
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| SwapError::chain(format!("transaction {id} not found")))
    }

    async fn broadcast_transaction(&self, _network: SwapNetwork, tx_hex: &str) -> Result<Txid> {
        self.check()?;
        let tx: Transaction = deserialize_hex(tx_hex)
            .map_err(|e| SwapError::InvalidTransaction(e.to_string()))?;
        Ok(self.add_to_mempool(&tx))
    }
}
