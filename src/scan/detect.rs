use std::collections::BTreeMap;

use bitcoin::Transaction;

use crate::chain::SwapNetwork;
use crate::chain::address::address_from_output_script;
use crate::error::Result;
use crate::pool::cache::SwapCache;
use crate::pool::watch::{WatchedOutput, watched_output};
use crate::pool::{ClaimElement, FundingElement, RefundElement, SwapElement};
use crate::script::swap_script_details;
use crate::tx::output::swap_script_in_transaction;
use crate::tx::spend::{SpendKind, is_pk_hash_spend, swap_resolutions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub id: String,
    pub element: SwapElement,
}

pub async fn detect_funding(
    cache: &dyn SwapCache,
    network: SwapNetwork,
    transaction: &Transaction,
) -> Result<Vec<Detection>> {
    let mut watched: BTreeMap<String, WatchedOutput> = BTreeMap::new();
    for output in &transaction.output {
        let Some(address) = address_from_output_script(network, &output.script_pubkey) else {
            continue;
        };
        if let Some(found) = watched_output(cache, network, &address).await? {
            watched.entry(found.id.clone()).or_insert(found);
        }
    }

    let transaction_id = transaction.compute_txid();
    let mut detections = Vec::new();
    for (id, watch) in watched {
        let details = swap_script_details(network, &watch.script)?;
        for output in swap_script_in_transaction(&details.output_scripts(), transaction) {
            if output.tokens == 0 {
                continue;
            }
            detections.push(Detection {
                id: id.clone(),
                element: SwapElement::Funding(FundingElement {
                    network,
                    transaction_id,
                    script: watch.script.clone(),
                    output_index: output.output_index,
                    tokens: output.tokens,
                    output_script: output.output_script,
                    claim_key_index: watch.claim_key_index,
                }),
            });
        }
    }
    Ok(detections)
}

pub async fn detect_spends(
    cache: &dyn SwapCache,
    network: SwapNetwork,
    transaction: &Transaction,
) -> Result<Vec<Detection>> {
    if transaction.input.iter().all(is_pk_hash_spend) {
        return Ok(Vec::new());
    }

    let transaction_id = transaction.compute_txid();
    let mut detections = Vec::new();
    for resolution in swap_resolutions(transaction) {
        // Three-element stacks that are not swap scripts are ordinary spends.
        let Ok(details) = swap_script_details(network, &resolution.redeem_script) else {
            continue;
        };
        let Some(watch) = watched_output(cache, network, &details.p2sh_address).await? else {
            continue;
        };

        let element = match (resolution.kind, resolution.preimage()) {
            (SpendKind::Claim, Some(preimage)) => SwapElement::Claim(ClaimElement {
                network,
                transaction_id,
                script: watch.script.clone(),
                outpoint: resolution.outpoint,
                preimage,
            }),
            _ => SwapElement::Refund(RefundElement {
                network,
                transaction_id,
                script: watch.script.clone(),
                outpoint: resolution.outpoint,
            }),
        };
        detections.push(Detection {
            id: watch.id,
            element,
        });
    }
    Ok(detections)
}

pub async fn detect(
    cache: &dyn SwapCache,
    network: SwapNetwork,
    transaction: &Transaction,
) -> Result<Vec<Detection>> {
    let mut detections = detect_funding(cache, network, transaction).await?;
    detections.extend(detect_spends(cache, network, transaction).await?);
    Ok(detections)
}
