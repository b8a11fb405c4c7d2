use std::sync::Arc;

use bitcoin::consensus::encode::deserialize_hex;
use bitcoin::{BlockHash, Transaction, Txid};
use hashlink::LruCache;
use serde::Serialize;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;

use super::detect::{Detection, detect};
use super::listener::{BlockListener, ListenerEvent, MempoolListener};
use super::queue::{JobQueue, ScanJob};
use crate::chain::SwapNetwork;
use crate::chain::rpc::ChainRpc;
use crate::config::ScannerConfig;
use crate::error::{Result, SwapError};
use crate::pool::cache::SwapCache;
use crate::pool::{SwapElement, add_detected_swap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ScanEvent {
    Funding {
        id: String,
        element: SwapElement,
        block: Option<BlockHash>,
    },
    Claim {
        id: String,
        element: SwapElement,
        block: Option<BlockHash>,
    },
    Refund {
        id: String,
        element: SwapElement,
        block: Option<BlockHash>,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ScanEvent {
    fn detected(detection: Detection, block: Option<BlockHash>) -> Option<Self> {
        let Detection { id, element } = detection;
        match element {
            SwapElement::Funding(_) => Some(ScanEvent::Funding { id, element, block }),
            SwapElement::Claim(_) => Some(ScanEvent::Claim { id, element, block }),
            SwapElement::Refund(_) => Some(ScanEvent::Refund { id, element, block }),
            SwapElement::Attempt(_) => None,
        }
    }

    fn error(err: &SwapError) -> Self {
        ScanEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

struct Shared {
    chain: Arc<dyn ChainRpc>,
    cache: Arc<dyn SwapCache>,
    network: SwapNetwork,
    queue: Mutex<JobQueue>,
    ready: Notify,
    transactions: std::sync::Mutex<LruCache<Txid, Arc<Transaction>>>,
    events: mpsc::Sender<ScanEvent>,
}

impl Shared {
    async fn emit(&self, event: ScanEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("scan event receiver dropped");
        }
    }

    async fn transaction(&self, id: &Txid) -> Result<Arc<Transaction>> {
        if let Ok(mut memo) = self.transactions.lock()
            && let Some(tx) = memo.get(id)
        {
            return Ok(tx.clone());
        }

        let hex = self.chain.transaction(self.network, id).await?;
        let tx: Transaction = deserialize_hex(&hex)
            .map_err(|e| SwapError::InvalidTransaction(format!("{id}: {e}")))?;
        let tx = Arc::new(tx);

        if let Ok(mut memo) = self.transactions.lock() {
            memo.insert(*id, tx.clone());
        }
        Ok(tx)
    }

    async fn next_job(&self) -> ScanJob {
        loop {
            if let Some(job) = self.queue.lock().await.pop() {
                return job;
            }
            self.ready.notified().await;
        }
    }

    async fn process(&self, job: ScanJob) {
        let tx = match self.transaction(&job.id).await {
            Ok(tx) => tx,
            Err(err) => {
                tracing::warn!(txid = %job.id, error = %err, "fetch transaction failed");
                self.emit(ScanEvent::error(&err)).await;
                return;
            }
        };

        let detections = match detect(self.cache.as_ref(), self.network, &tx).await {
            Ok(detections) => detections,
            Err(err) => {
                tracing::warn!(txid = %job.id, error = %err, "detection failed");
                self.emit(ScanEvent::error(&err)).await;
                return;
            }
        };

        for detection in detections {
            if let Err(err) =
                add_detected_swap(self.cache.as_ref(), &detection.id, &detection.element).await
            {
                tracing::warn!(
                    txid = %job.id,
                    id = %detection.id,
                    error = %err,
                    "record swap element failed"
                );
                self.emit(ScanEvent::error(&err)).await;
                continue;
            }

            tracing::info!(
                txid = %job.id,
                id = %detection.id,
                element = detection.element.type_name(),
                confirmed = job.block.is_some(),
                "detected swap element"
            );
            if let Some(event) = ScanEvent::detected(detection, job.block) {
                self.emit(event).await;
            }
        }
    }
}

/// Running scanner tasks. Dropping the handle leaves them running.
pub struct ScannerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl ScannerHandle {
    pub fn stop(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }
}

pub struct SwapScanner {
    chain: Arc<dyn ChainRpc>,
    cache: Arc<dyn SwapCache>,
    config: ScannerConfig,
}

impl SwapScanner {
    pub fn new(chain: Arc<dyn ChainRpc>, cache: Arc<dyn SwapCache>, config: ScannerConfig) -> Self {
        Self {
            chain,
            cache,
            config,
        }
    }

    pub fn start(self) -> (ScannerHandle, mpsc::Receiver<ScanEvent>) {
        let (listener_tx, listener_rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let mempool = MempoolListener::new(
            self.chain.clone(),
            self.config.network,
            self.config.mempool_poll_interval,
        )
        .spawn(listener_tx.clone());
        let blocks = BlockListener::new(
            self.chain.clone(),
            self.config.network,
            self.config.block_poll_interval,
            self.config.blocks_to_scan(),
        )
        .spawn(listener_tx);

        let (mut handle, events) = self.start_with_source(listener_rx);
        handle.tasks.extend([mempool, blocks]);
        (handle, events)
    }

    /// Runs the dispatcher and workers over an existing listener stream.
    pub fn start_with_source(
        self,
        mut source: mpsc::Receiver<ListenerEvent>,
    ) -> (ScannerHandle, mpsc::Receiver<ScanEvent>) {
        let config = self.config;
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity.max(1));

        let shared = Arc::new(Shared {
            chain: self.chain,
            cache: self.cache,
            network: config.network,
            queue: Mutex::new(JobQueue::new(config.queue_capacity, config.stale_job_after)),
            ready: Notify::new(),
            transactions: std::sync::Mutex::new(LruCache::new(
                config.transaction_memo_capacity.max(1),
            )),
            events: events_tx,
        });

        let mut tasks = Vec::with_capacity(config.workers + 1);

        let dispatcher = shared.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = source.recv().await {
                match event {
                    ListenerEvent::Transaction { id, block } => {
                        let job = ScanJob::new(id, dispatcher.network, block);
                        let outcome = dispatcher.queue.lock().await.push(job);
                        if outcome.stale > 0 || outcome.dropped.is_some() {
                            tracing::debug!(
                                txid = %id,
                                superseded = outcome.superseded,
                                stale = outcome.stale,
                                dropped = ?outcome.dropped,
                                "queue trimmed"
                            );
                        }
                        dispatcher.ready.notify_one();
                    }
                    ListenerEvent::Error { code, message } => {
                        dispatcher
                            .emit(ScanEvent::Error {
                                code: code.to_string(),
                                message,
                            })
                            .await;
                    }
                }
            }
            tracing::debug!("listener streams closed");
        }));

        for worker in 0..config.workers.max(1) {
            let shared = shared.clone();
            tasks.push(tokio::spawn(async move {
                tracing::debug!(worker, "scan worker started");
                loop {
                    let job = shared.next_job().await;
                    shared.process(job).await;
                }
            }));
        }

        tracing::info!(
            network = %config.network,
            workers = config.workers.max(1),
            "swap scanner started"
        );

        (ScannerHandle { tasks }, events_rx)
    }
}
