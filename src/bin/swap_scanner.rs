use std::path::PathBuf;
use std::str::FromStr as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use bitcoin::script::ScriptBuf;
use chain_swaps::chain::SwapNetwork;
use chain_swaps::chain::esplora::EsploraChain;
use chain_swaps::config::ScannerConfig;
use chain_swaps::pool::{MemoryCache, SqliteCache, SwapCache, watch_swap};
use chain_swaps::scan::{ScanEvent, SwapScanner};
use clap::Parser as _;

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long, default_value = "btctestnet")]
    network: String,

    #[arg(long)]
    esplora_url: String,

    /// SQLite cache path; an in-memory cache is used when absent.
    #[arg(long)]
    store_path: Option<PathBuf>,

    /// `invoice_id:script_hex[:claim_key_index]`, repeatable.
    #[arg(long = "watch")]
    watches: Vec<String>,

    #[arg(long, default_value_t = 5)]
    mempool_poll_interval_secs: u64,

    #[arg(long, default_value_t = 10)]
    block_poll_interval_secs: u64,

    #[arg(long, default_value_t = 6)]
    funding_confirmations: u32,

    #[arg(long, default_value_t = 3)]
    block_buffer: u32,

    #[arg(long, default_value_t = 4)]
    workers: usize,

    #[arg(long, default_value_t = 300)]
    stale_job_after_secs: u64,
}

struct Watch {
    id: String,
    script: ScriptBuf,
    claim_key_index: Option<u32>,
}

fn parse_watch(raw: &str) -> Result<Watch> {
    let mut parts = raw.split(':');
    let (Some(id), Some(script)) = (parts.next(), parts.next()) else {
        anyhow::bail!("expected invoice_id:script_hex[:claim_key_index], got {raw}");
    };
    let claim_key_index = parts
        .next()
        .map(str::parse::<u32>)
        .transpose()
        .context("parse claim_key_index")?;

    Ok(Watch {
        id: id.to_string(),
        script: ScriptBuf::from_hex(script).context("parse watch script hex")?,
        claim_key_index,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    chain_swaps::logging::init().ok();

    let args = Args::parse();
    let network = SwapNetwork::from_str(&args.network).context("parse network")?;

    let chain = EsploraChain::new().with_network(network, &args.esplora_url);

    let cache: Arc<dyn SwapCache> = match &args.store_path {
        Some(path) => Arc::new(SqliteCache::open(path.clone()).context("open sqlite cache")?),
        None => Arc::new(MemoryCache::new()),
    };

    for raw in &args.watches {
        let watch = parse_watch(raw)?;
        let details = watch_swap(
            cache.as_ref(),
            network,
            &watch.id,
            &watch.script,
            watch.claim_key_index,
        )
        .await
        .with_context(|| format!("watch swap {}", watch.id))?;
        tracing::info!(
            id = %watch.id,
            p2sh_address = %details.p2sh_address,
            p2wsh_address = ?details.p2wsh_address,
            "watch registered"
        );
    }

    let config = ScannerConfig {
        network,
        mempool_poll_interval: Duration::from_secs(args.mempool_poll_interval_secs),
        block_poll_interval: Duration::from_secs(args.block_poll_interval_secs),
        funding_confirmations: args.funding_confirmations,
        block_buffer: args.block_buffer,
        workers: args.workers,
        stale_job_after: Duration::from_secs(args.stale_job_after_secs),
        ..ScannerConfig::default()
    };

    let (handle, mut events) = SwapScanner::new(Arc::new(chain), cache, config).start();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let ScanEvent::Error { code, message } = &event {
                    tracing::warn!(%code, %message, "scan error");
                }
                println!("{}", serde_json::to_string(&event)?);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    handle.stop();
    Ok(())
}
