use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use bitcoin::{BlockHash, Txid};
use tokio::time::Instant;

use crate::chain::SwapNetwork;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    pub id: Txid,
    pub network: SwapNetwork,
    pub block: Option<BlockHash>,
    pub enqueued_at: Instant,
}

impl ScanJob {
    pub fn new(id: Txid, network: SwapNetwork, block: Option<BlockHash>) -> Self {
        Self {
            id,
            network,
            block,
            enqueued_at: Instant::now(),
        }
    }

    pub fn source(&self) -> JobSource {
        if self.block.is_some() {
            JobSource::Block
        } else {
            JobSource::Mempool
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobSource {
    Mempool,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Priority {
    source: JobSource,
    backlog: usize,
    sequence: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub superseded: bool,
    pub stale: usize,
    pub dropped: Option<Txid>,
}

#[derive(Debug)]
pub struct JobQueue {
    jobs: BTreeMap<Priority, ScanJob>,
    index: HashMap<Txid, Priority>,
    mempool_by_age: BTreeMap<(Instant, u64), Txid>,
    next_sequence: u64,
    capacity: usize,
    stale_after: Duration,
}

impl JobQueue {
    pub fn new(capacity: usize, stale_after: Duration) -> Self {
        Self {
            jobs: BTreeMap::new(),
            index: HashMap::new(),
            mempool_by_age: BTreeMap::new(),
            next_sequence: 0,
            capacity: capacity.max(1),
            stale_after,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, id: &Txid) -> bool {
        self.index.contains_key(id)
    }

    pub fn push(&mut self, job: ScanJob) -> PushOutcome {
        let mut outcome = PushOutcome::default();

        if let Some(previous) = self.index.get(&job.id).copied() {
            self.remove(&previous);
            outcome.superseded = true;
        }

        outcome.stale = self.sweep_stale(job.enqueued_at);

        let backlog = match job.source() {
            JobSource::Block => 0,
            JobSource::Mempool => self.jobs.len(),
        };
        let priority = Priority {
            source: job.source(),
            backlog,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        self.index.insert(job.id, priority);
        if priority.source == JobSource::Mempool {
            self.mempool_by_age.insert((job.enqueued_at, priority.sequence), job.id);
        }
        self.jobs.insert(priority, job);

        if self.jobs.len() > self.capacity
            && let Some(lowest) = self.jobs.first_key_value().map(|(priority, _)| *priority)
            && let Some(dropped) = self.remove(&lowest)
        {
            outcome.dropped = Some(dropped.id);
        }

        outcome
    }

    pub fn pop(&mut self) -> Option<ScanJob> {
        let highest = *self.jobs.last_key_value()?.0;
        self.remove(&highest)
    }

    fn remove(&mut self, priority: &Priority) -> Option<ScanJob> {
        let job = self.jobs.remove(priority)?;
        self.index.remove(&job.id);
        if priority.source == JobSource::Mempool {
            self.mempool_by_age.remove(&(job.enqueued_at, priority.sequence));
        }
        Some(job)
    }

    // Oldest mempool jobs sit at the front of the age index.
    fn sweep_stale(&mut self, now: Instant) -> usize {
        let mut swept = 0;
        while let Some((&(enqueued_at, _), _)) = self.mempool_by_age.first_key_value() {
            if now.saturating_duration_since(enqueued_at) <= self.stale_after {
                break;
            }
            let Some((_, id)) = self.mempool_by_age.pop_first() else {
                break;
            };
            if let Some(priority) = self.index.remove(&id) {
                self.jobs.remove(&priority);
            }
            swept += 1;
        }
        swept
    }
}
