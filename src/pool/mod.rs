pub mod cache;
pub mod memory;
pub mod sqlite;
pub mod watch;

use std::str::FromStr as _;
use std::time::Duration;

use bitcoin::hashes::{Hash as _, ripemd160, sha256};
use bitcoin::script::ScriptBuf;
use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::chain::SwapNetwork;
use crate::error::{Result, SwapError};
use crate::script::swap_script_details;

pub use cache::SwapCache;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use watch::{WatchedOutput, forget_swap, watch_swap, watched_output};

pub const DETECTED_SWAPS_TYPE: &str = "detected_swaps";

pub const SWAP_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingElement {
    pub network: SwapNetwork,
    pub transaction_id: Txid,
    pub script: ScriptBuf,
    pub output_index: u32,
    pub tokens: u64,
    pub output_script: ScriptBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_key_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimElement {
    pub network: SwapNetwork,
    pub transaction_id: Txid,
    pub script: ScriptBuf,
    pub outpoint: OutPoint,
    #[serde(with = "hex::serde")]
    pub preimage: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundElement {
    pub network: SwapNetwork,
    pub transaction_id: Txid,
    pub script: ScriptBuf,
    pub outpoint: OutPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptElement {
    pub network: SwapNetwork,
    pub script: ScriptBuf,
    pub attempt_id: String,
    pub tokens: u64,
    pub attempted_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SwapElement {
    Funding(FundingElement),
    Claim(ClaimElement),
    Refund(RefundElement),
    Attempt(AttemptElement),
}

impl SwapElement {
    pub fn type_name(&self) -> &'static str {
        match self {
            SwapElement::Funding(_) => "funding",
            SwapElement::Claim(_) => "claim",
            SwapElement::Refund(_) => "refund",
            SwapElement::Attempt(_) => "attempt",
        }
    }

    pub fn network(&self) -> SwapNetwork {
        match self {
            SwapElement::Funding(e) => e.network,
            SwapElement::Claim(e) => e.network,
            SwapElement::Refund(e) => e.network,
            SwapElement::Attempt(e) => e.network,
        }
    }

    pub fn script(&self) -> &ScriptBuf {
        match self {
            SwapElement::Funding(e) => &e.script,
            SwapElement::Claim(e) => &e.script,
            SwapElement::Refund(e) => &e.script,
            SwapElement::Attempt(e) => &e.script,
        }
    }

    /// Transaction id, or the attempt id for payment attempts.
    fn record_id(&self) -> String {
        match self {
            SwapElement::Funding(e) => e.transaction_id.to_string(),
            SwapElement::Claim(e) => e.transaction_id.to_string(),
            SwapElement::Refund(e) => e.transaction_id.to_string(),
            SwapElement::Attempt(e) => e.attempt_id.clone(),
        }
    }

    fn sort_component(&self) -> String {
        match self {
            SwapElement::Funding(e) => e.output_index.to_string(),
            SwapElement::Claim(e) => e.outpoint.to_string(),
            SwapElement::Refund(e) => e.outpoint.to_string(),
            SwapElement::Attempt(e) => e.attempted_at.to_string(),
        }
    }

    fn validate(&self, payment_hash: &sha256::Hash) -> Result<u32> {
        let details = swap_script_details(self.network(), self.script())?;

        let digest = ripemd160::Hash::hash(payment_hash.as_byte_array());
        if details.payment_hash != digest {
            return Err(SwapError::InvalidSwapElement("ExpectedSwapScriptForInvoiceId"));
        }

        match self {
            SwapElement::Funding(e) => {
                if e.tokens == 0 {
                    return Err(SwapError::InvalidSwapElement("ExpectedFundingTokens"));
                }
                if e.output_script.is_empty() {
                    return Err(SwapError::InvalidSwapElement("ExpectedFundingOutputScript"));
                }
            }
            SwapElement::Claim(e) => {
                if sha256::Hash::hash(&e.preimage) != *payment_hash {
                    return Err(SwapError::InvalidSwapElement("ExpectedPreimageForInvoiceId"));
                }
            }
            SwapElement::Refund(_) => {}
            SwapElement::Attempt(e) => {
                if e.attempt_id.is_empty() {
                    return Err(SwapError::InvalidSwapElement("ExpectedAttemptId"));
                }
                if e.tokens == 0 {
                    return Err(SwapError::InvalidSwapElement("ExpectedAttemptTokens"));
                }
            }
        }

        Ok(details.timelock_block_height)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectedSwaps {
    pub funding: Vec<FundingElement>,
    pub claim: Vec<ClaimElement>,
    pub refund: Vec<RefundElement>,
    pub attempt: Vec<AttemptElement>,
}

/// Invoice ids are the hex sha256 payment hash.
pub fn parse_invoice_id(id: &str) -> Result<sha256::Hash> {
    if id.len() != 64 {
        return Err(SwapError::ExpectedInvoiceId(id.to_string()));
    }
    sha256::Hash::from_str(id).map_err(|_| SwapError::ExpectedInvoiceId(id.to_string()))
}

pub fn sort_key(timelock_block_height: u32, element: &SwapElement) -> String {
    let identity = format!(
        "{}/{}/{}/{}/{}",
        element.record_id(),
        element.network(),
        element.script().to_hex_string(),
        element.type_name(),
        element.sort_component(),
    );
    format!(
        "{timelock_block_height}-{}",
        sha256::Hash::hash(identity.as_bytes())
    )
}

pub async fn add_detected_swap(
    cache: &dyn SwapCache,
    id: &str,
    element: &SwapElement,
) -> Result<()> {
    let payment_hash = parse_invoice_id(id)?;
    let timelock = element.validate(&payment_hash)?;
    let sort_key = sort_key(timelock, element);

    let value = serde_json::to_value(element)
        .map_err(|e| SwapError::cache(format!("encode swap element: {e}")))?;

    cache
        .add_to_ordered_set(
            DETECTED_SWAPS_TYPE,
            &payment_hash.to_string(),
            &sort_key,
            value,
            SWAP_RETENTION,
        )
        .await?;

    tracing::debug!(
        id = %payment_hash,
        element = element.type_name(),
        sort_key = %sort_key,
        "recorded swap element"
    );
    Ok(())
}

pub async fn get_detected_swaps(cache: &dyn SwapCache, id: &str) -> Result<DetectedSwaps> {
    let payment_hash = parse_invoice_id(id)?;
    let values = cache
        .get_ordered_set(DETECTED_SWAPS_TYPE, &payment_hash.to_string())
        .await?;

    let mut swaps = DetectedSwaps::default();
    for value in values {
        let element: SwapElement = serde_json::from_value(value)
            .map_err(|_| SwapError::InvalidSwapElement("ExpectedDetectedSwapElement"))?;
        match element {
            SwapElement::Funding(e) => swaps.funding.push(e),
            SwapElement::Claim(e) => swaps.claim.push(e),
            SwapElement::Refund(e) => swaps.refund.push(e),
            SwapElement::Attempt(e) => swaps.attempt.push(e),
        }
    }
    Ok(swaps)
}
