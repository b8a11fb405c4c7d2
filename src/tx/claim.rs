use bitcoin::absolute::LockTime;
use bitcoin::secp256k1::SecretKey;
use bitcoin::{Amount, Sequence, Transaction};
use serde::Serialize;

use super::SwapUtxo;
use super::sweep::{anticipated_weight, fee_for_weight, sign_inputs, skeleton, sweep_inputs};
use crate::chain::SwapNetwork;
use crate::chain::address::address_details;
use crate::error::{Result, SwapError};

const PREIMAGE_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct ClaimArgs {
    pub network: SwapNetwork,
    pub destination: String,
    pub fee_tokens_per_vbyte: u64,
    pub preimage: [u8; 32],
    pub private_key: SecretKey,
    pub utxos: Vec<SwapUtxo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimTransaction {
    pub transaction: Transaction,
    pub fee: u64,
}

/// Sweeps every swap UTXO to `destination` by revealing the preimage.
pub fn claim_transaction(args: &ClaimArgs) -> Result<ClaimTransaction> {
    let profile = args.network.profile();
    let inputs = sweep_inputs(profile, &args.utxos)?;
    let destination = address_details(args.network, &args.destination)?.output_script;

    let mut transaction = skeleton(
        &inputs,
        Sequence::ENABLE_LOCKTIME_NO_RBF,
        LockTime::ZERO,
        destination,
    );

    let tokens = transaction.output[0].value.to_sat();
    let weight = anticipated_weight(&transaction, &inputs, PREIMAGE_LEN);
    let fee = fee_for_weight(args.fee_tokens_per_vbyte, weight);
    if fee >= tokens {
        return Err(SwapError::ClaimOutputTooSmall { fee, tokens });
    }
    transaction.output[0].value = Amount::from_sat(tokens - fee);

    sign_inputs(
        &mut transaction,
        &inputs,
        profile,
        &args.private_key,
        &args.preimage,
    )?;

    tracing::debug!(
        network = %args.network,
        txid = %transaction.compute_txid(),
        inputs = inputs.len(),
        fee,
        weight,
        "built claim transaction"
    );

    Ok(ClaimTransaction { transaction, fee })
}
