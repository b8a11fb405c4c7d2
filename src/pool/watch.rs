use bitcoin::script::{Script, ScriptBuf};
use serde::{Deserialize, Serialize};

use super::cache::SwapCache;
use super::{SWAP_RETENTION, parse_invoice_id};
use crate::chain::SwapNetwork;
use crate::error::{Result, SwapError};
use crate::script::{SwapScriptDetails, swap_script_details};

pub const WATCHED_OUTPUT_TYPE: &str = "swap_watched_output";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedOutput {
    pub id: String,
    pub script: ScriptBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_key_index: Option<u32>,
}

fn watch_key(network: SwapNetwork, address: &str) -> String {
    format!("{network}/{address}")
}

/// Indexes every funding address of `script` so detection can map outputs
/// and spends back to the invoice.
pub async fn watch_swap(
    cache: &dyn SwapCache,
    network: SwapNetwork,
    id: &str,
    script: &Script,
    claim_key_index: Option<u32>,
) -> Result<SwapScriptDetails> {
    let payment_hash = parse_invoice_id(id)?;
    let details = swap_script_details(network, script)?;

    let watched = WatchedOutput {
        id: payment_hash.to_string(),
        script: script.to_owned(),
        claim_key_index,
    };
    let value = serde_json::to_value(&watched)
        .map_err(|e| SwapError::cache(format!("encode watched output: {e}")))?;

    for address in details.addresses() {
        cache
            .set(
                WATCHED_OUTPUT_TYPE,
                &watch_key(network, address),
                value.clone(),
                SWAP_RETENTION,
            )
            .await?;
    }

    tracing::info!(
        id = %watched.id,
        network = %network,
        addresses = details.addresses().len(),
        "watching swap"
    );
    Ok(details)
}

pub async fn watched_output(
    cache: &dyn SwapCache,
    network: SwapNetwork,
    address: &str,
) -> Result<Option<WatchedOutput>> {
    let Some(value) = cache
        .get(WATCHED_OUTPUT_TYPE, &watch_key(network, address))
        .await?
    else {
        return Ok(None);
    };

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| SwapError::cache(format!("decode watched output: {e}")))
}

pub async fn forget_swap(
    cache: &dyn SwapCache,
    network: SwapNetwork,
    script: &Script,
) -> Result<()> {
    let details = swap_script_details(network, script)?;
    for address in details.addresses() {
        cache
            .remove(WATCHED_OUTPUT_TYPE, &watch_key(network, address))
            .await?;
    }
    tracing::info!(network = %network, address = %details.p2sh_address, "forgot swap");
    Ok(())
}
