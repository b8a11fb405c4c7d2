mod support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use bitcoin::hashes::Hash as _;
use bitcoin::{BlockHash, Txid};
use chain_swaps::chain::SwapNetwork;
use chain_swaps::config::ScannerConfig;
use chain_swaps::pool::{MemoryCache, SwapCache, SwapElement, get_detected_swaps, watch_swap};
use chain_swaps::scan::{ListenerEvent, ScanEvent, SwapScanner};
use chain_swaps::script::SwapScriptType;
use chain_swaps::tx::{ClaimArgs, RefundArgs, claim_transaction, refund_transaction};
use serde_json::json;
use tokio::sync::mpsc;

use support::chain::FakeChain;
use support::keys::{SwapFixture, TIMEOUT_BLOCK_HEIGHT, secret_key, wallet_address};
use support::wait::{next_matching, wait_for};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

fn fast_config(network: SwapNetwork) -> ScannerConfig {
    ScannerConfig {
        mempool_poll_interval: Duration::from_millis(20),
        block_poll_interval: Duration::from_millis(20),
        funding_confirmations: 1,
        block_buffer: 1,
        workers: 2,
        ..ScannerConfig::new(network)
    }
}

#[tokio::test]
async fn scanner_tracks_funding_and_claim() -> Result<()> {
    let _ = chain_swaps::logging::init();

    let network = SwapNetwork::BtcRegtest;
    let fixture = SwapFixture::new(network, SwapScriptType::Pk)?;
    let chain = Arc::new(FakeChain::new());
    let cache: Arc<dyn SwapCache> = Arc::new(MemoryCache::new());
    let id = fixture.id();

    watch_swap(cache.as_ref(), network, &id, &fixture.script, Some(0)).await?;

    let scanner = SwapScanner::new(chain.clone(), cache.clone(), fast_config(network));
    let (handle, mut events) = scanner.start();

    let funding = fixture.funding_tx(&[(fixture.p2wsh(), 75_000)]);
    let funding_id = chain.add_to_mempool(&funding);

    let (event_id, element) = next_matching("mempool funding", EVENT_TIMEOUT, &mut events, |e| {
        match e {
            ScanEvent::Funding {
                id,
                element,
                block: None,
            } => Some((id, element)),
            _ => None,
        }
    })
    .await?;
    assert_eq!(event_id, id);
    let SwapElement::Funding(funding_element) = element else {
        anyhow::bail!("expected funding element");
    };
    assert_eq!(funding_element.transaction_id, funding_id);
    assert_eq!(funding_element.tokens, 75_000);
    assert_eq!(funding_element.claim_key_index, Some(0));

    let block = chain.mine();
    let confirmed_in = next_matching("confirmed funding", EVENT_TIMEOUT, &mut events, |e| {
        match e {
            ScanEvent::Funding {
                block: Some(block), ..
            } => Some(block),
            _ => None,
        }
    })
    .await?;
    assert_eq!(confirmed_in, block);

    let claim = claim_transaction(&ClaimArgs {
        network,
        destination: wallet_address(network, &secret_key(6))?,
        fee_tokens_per_vbyte: 5,
        preimage: fixture.preimage,
        private_key: fixture.claim_key,
        utxos: vec![fixture.utxo(&funding, 0)],
    })?;
    let claim_id = chain.add_to_mempool(&claim.transaction);

    let element = next_matching("claim", EVENT_TIMEOUT, &mut events, |e| match e {
        ScanEvent::Claim { element, .. } => Some(element),
        _ => None,
    })
    .await?;
    let SwapElement::Claim(claim_element) = element else {
        anyhow::bail!("expected claim element");
    };
    assert_eq!(claim_element.transaction_id, claim_id);
    assert_eq!(claim_element.preimage, fixture.preimage);
    assert_eq!(claim_element.outpoint, fixture.utxo(&funding, 0).outpoint());

    let swaps = wait_for("claim recorded", EVENT_TIMEOUT, || {
        let cache = cache.clone();
        let id = id.clone();
        async move {
            let swaps = get_detected_swaps(cache.as_ref(), &id).await?;
            Ok((!swaps.claim.is_empty()).then_some(swaps))
        }
    })
    .await?;
    assert_eq!(swaps.funding.len(), 1);
    assert_eq!(swaps.claim.len(), 1);
    assert!(swaps.refund.is_empty());

    handle.stop();
    Ok(())
}

#[tokio::test]
async fn scanner_reports_unfetchable_transactions() -> Result<()> {
    let network = SwapNetwork::Btc;
    let chain = Arc::new(FakeChain::new());
    let cache: Arc<dyn SwapCache> = Arc::new(MemoryCache::new());

    let (handle, mut events) = SwapScanner::new(chain.clone(), cache, fast_config(network)).start();

    chain.add_unknown_to_mempool(Txid::from_byte_array([0xee; 32]));

    let (code, message) = next_matching("fetch error", EVENT_TIMEOUT, &mut events, |e| match e {
        ScanEvent::Error { code, message } => Some((code, message)),
        _ => None,
    })
    .await?;
    assert_eq!(code, "UnexpectedChainError");
    assert!(message.contains("not found"), "{message}");

    handle.stop();
    Ok(())
}

#[tokio::test]
async fn scanner_detects_refunds_from_an_external_source() -> Result<()> {
    let network = SwapNetwork::Btc;
    let fixture = SwapFixture::new(network, SwapScriptType::Pkhash)?;
    let chain = Arc::new(FakeChain::new());
    let cache: Arc<dyn SwapCache> = Arc::new(MemoryCache::new());
    let id = fixture.id();

    watch_swap(cache.as_ref(), network, &id, &fixture.script, None).await?;

    let config = ScannerConfig {
        workers: 1,
        ..fast_config(network)
    };
    let (source, source_rx) = mpsc::channel(8);
    let (handle, mut events) =
        SwapScanner::new(chain.clone(), cache.clone(), config).start_with_source(source_rx);

    source
        .send(ListenerEvent::Error {
            code: "UnexpectedChainError",
            message: "tip unavailable".to_string(),
        })
        .await?;
    let code = next_matching("forwarded error", EVENT_TIMEOUT, &mut events, |e| match e {
        ScanEvent::Error { code, .. } => Some(code),
        _ => None,
    })
    .await?;
    assert_eq!(code, "UnexpectedChainError");

    let funding = fixture.funding_tx(&[(fixture.details.p2sh_output_script.clone(), 90_000)]);
    let funding_id = chain.add_to_mempool(&funding);
    let block = BlockHash::from_byte_array([0x42; 32]);
    source
        .send(ListenerEvent::Transaction {
            id: funding_id,
            block: Some(block),
        })
        .await?;

    let event = next_matching("funding", EVENT_TIMEOUT, &mut events, |e| {
        matches!(e, ScanEvent::Funding { .. }).then_some(e)
    })
    .await?;
    let value = serde_json::to_value(&event)?;
    assert_eq!(value["event"], json!("funding"));
    assert_eq!(value["id"], json!(id));
    assert_eq!(value["block"], json!(block.to_string()));
    assert_eq!(value["element"]["type"], json!("funding"));
    assert_eq!(value["element"]["tokens"], json!(90_000));

    let refund = refund_transaction(&RefundArgs {
        network,
        destination: wallet_address(network, &secret_key(7))?,
        fee_tokens_per_vbyte: 5,
        private_key: Some(fixture.refund_key),
        timelock_block_height: TIMEOUT_BLOCK_HEIGHT,
        utxos: vec![fixture.utxo(&funding, 0)],
    })?;
    let refund_id = chain.add_to_mempool(&refund.transaction);
    source
        .send(ListenerEvent::Transaction {
            id: refund_id,
            block: None,
        })
        .await?;

    let element = next_matching("refund", EVENT_TIMEOUT, &mut events, |e| match e {
        ScanEvent::Refund { element, .. } => Some(element),
        _ => None,
    })
    .await?;
    let SwapElement::Refund(refund_element) = element else {
        anyhow::bail!("expected refund element");
    };
    assert_eq!(refund_element.transaction_id, refund_id);
    assert_eq!(refund_element.outpoint, fixture.utxo(&funding, 0).outpoint());

    let swaps = get_detected_swaps(cache.as_ref(), &id)
        .await
        .context("read detected swaps")?;
    assert_eq!(swaps.funding.len(), 1);
    assert_eq!(swaps.refund.len(), 1);
    assert!(swaps.claim.is_empty());

    handle.stop();
    Ok(())
}

#[tokio::test]
async fn repeated_sightings_are_scanned_once() -> Result<()> {
    let network = SwapNetwork::Btc;
    let fixture = SwapFixture::new(network, SwapScriptType::Pk)?;
    let chain = Arc::new(FakeChain::new());
    let cache: Arc<dyn SwapCache> = Arc::new(MemoryCache::new());
    let id = fixture.id();
    watch_swap(cache.as_ref(), network, &id, &fixture.script, None).await?;

    let funding = fixture.funding_tx(&[(fixture.p2wsh(), 75_000)]);
    let funding_id = chain.add_to_mempool(&funding);

    let config = ScannerConfig {
        workers: 1,
        ..fast_config(network)
    };
    let (source, source_rx) = mpsc::channel(8);
    let (handle, mut events) =
        SwapScanner::new(chain.clone(), cache.clone(), config).start_with_source(source_rx);

    // both sightings are queued before the dispatcher first runs
    for _ in 0..2 {
        source
            .send(ListenerEvent::Transaction {
                id: funding_id,
                block: None,
            })
            .await?;
    }

    let funded = next_matching("funding", EVENT_TIMEOUT, &mut events, |e| match e {
        ScanEvent::Funding { id, .. } => Some(id),
        _ => None,
    })
    .await?;
    assert_eq!(funded, id);

    let again = next_matching("second funding", Duration::from_millis(300), &mut events, |e| {
        matches!(e, ScanEvent::Funding { .. }).then_some(())
    })
    .await;
    assert!(again.is_err(), "transaction was scanned twice");
    assert_eq!(chain.fetch_count(&funding_id), 1);

    handle.stop();
    Ok(())
}
