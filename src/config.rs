use std::time::Duration;

use crate::chain::SwapNetwork;

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub network: SwapNetwork,
    pub mempool_poll_interval: Duration,
    pub block_poll_interval: Duration,
    pub funding_confirmations: u32,
    /// Extra blocks scanned past `funding_confirmations` on every new tip.
    pub block_buffer: u32,
    pub workers: usize,
    /// Mempool jobs queued longer than this are dropped at the next enqueue.
    pub stale_job_after: Duration,
    pub queue_capacity: usize,
    pub channel_capacity: usize,
    pub transaction_memo_capacity: usize,
}

impl ScannerConfig {
    pub fn new(network: SwapNetwork) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    pub fn blocks_to_scan(&self) -> u32 {
        (self.funding_confirmations + self.block_buffer).max(1)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            network: SwapNetwork::Btc,
            mempool_poll_interval: Duration::from_secs(5),
            block_poll_interval: Duration::from_secs(10),
            funding_confirmations: 6,
            block_buffer: 3,
            workers: 4,
            stale_job_after: Duration::from_secs(5 * 60),
            queue_capacity: 10_000,
            channel_capacity: 1024,
            transaction_memo_capacity: 1000,
        }
    }
}
