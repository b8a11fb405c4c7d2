use bitcoin::Transaction;
use bitcoin::script::{Script, ScriptBuf};
use serde::Serialize;

use crate::error::{Result, SwapError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapOutput {
    pub output_index: u32,
    pub output_script: ScriptBuf,
    pub tokens: u64,
}

/// First output paying to any of `candidates`.
pub fn swap_output(candidates: &[&Script], transaction: &Transaction) -> Result<SwapOutput> {
    let output = swap_script_in_transaction(candidates, transaction)
        .into_iter()
        .next()
        .ok_or(SwapError::ExpectedUtxoInTransaction)?;

    if output.tokens == 0 {
        return Err(SwapError::ExpectedOutputValue);
    }

    Ok(output)
}

/// Every output paying to any of `candidates`, in output order.
pub fn swap_script_in_transaction(
    candidates: &[&Script],
    transaction: &Transaction,
) -> Vec<SwapOutput> {
    transaction
        .output
        .iter()
        .enumerate()
        .filter(|(_, out)| candidates.contains(&out.script_pubkey.as_script()))
        .map(|(index, out)| SwapOutput {
            output_index: index as u32,
            output_script: out.script_pubkey.clone(),
            tokens: out.value.to_sat(),
        })
        .collect()
}
