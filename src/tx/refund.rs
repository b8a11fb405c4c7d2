use bitcoin::absolute::LockTime;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Amount, PublicKey, Sequence, Transaction};
use serde::Serialize;

use super::SwapUtxo;
use super::sweep::{
    SweepInput, anticipated_weight, fee_for_weight, sign_inputs, skeleton, sweep_inputs,
};
use crate::chain::SwapNetwork;
use crate::chain::address::address_details;
use crate::error::{Result, SwapError};
use crate::script::{SwapScriptType, swap_script_details};

const PUBLIC_KEY_LEN: usize = 33;

#[derive(Debug, Clone)]
pub struct RefundArgs {
    pub network: SwapNetwork,
    pub destination: String,
    pub fee_tokens_per_vbyte: u64,
    /// Without a key the unsigned transaction is returned.
    pub private_key: Option<SecretKey>,
    pub timelock_block_height: u32,
    pub utxos: Vec<SwapUtxo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundTransaction {
    pub transaction: Transaction,
    pub fee: u64,
    pub is_signed: bool,
}

/// The element between signature and redeem script: an empty dummy for the
/// raw key variant, the refund public key for the key hash variant.
fn refund_unlock_len(
    network: SwapNetwork,
    inputs: &[SweepInput<'_>],
    timelock_block_height: u32,
) -> Result<usize> {
    let mut unlock_len = None;
    for input in inputs {
        let details = swap_script_details(network, &input.utxo.redeem_script)?;
        if details.timelock_block_height > timelock_block_height {
            return Err(SwapError::InvalidTimelock(timelock_block_height));
        }
        let len = match details.script_type {
            SwapScriptType::Pk => 0,
            SwapScriptType::Pkhash => PUBLIC_KEY_LEN,
        };
        if unlock_len.is_some_and(|existing| existing != len) {
            return Err(SwapError::InvalidSwapElement("ExpectedUniformRefundScriptType"));
        }
        unlock_len = Some(len);
    }
    Ok(unlock_len.unwrap_or_default())
}

pub fn refund_transaction(args: &RefundArgs) -> Result<RefundTransaction> {
    let profile = args.network.profile();
    let inputs = sweep_inputs(profile, &args.utxos)?;
    let destination = address_details(args.network, &args.destination)?.output_script;
    let lock_time = LockTime::from_height(args.timelock_block_height)
        .map_err(|_| SwapError::InvalidTimelock(args.timelock_block_height))?;
    let unlock_len = refund_unlock_len(args.network, &inputs, args.timelock_block_height)?;

    let mut transaction = skeleton(&inputs, Sequence::ZERO, lock_time, destination);

    let tokens = transaction.output[0].value.to_sat();
    let weight = anticipated_weight(&transaction, &inputs, unlock_len);
    let fee = fee_for_weight(args.fee_tokens_per_vbyte, weight);
    if fee >= tokens || tokens - fee < fee / 3 {
        return Err(SwapError::RefundOutputTooSmall { fee, tokens });
    }
    transaction.output[0].value = Amount::from_sat(tokens - fee);

    let is_signed = match &args.private_key {
        Some(private_key) => {
            let unlock = if unlock_len == 0 {
                Vec::new()
            } else {
                let secp = Secp256k1::signing_only();
                PublicKey::new(private_key.public_key(&secp)).to_bytes()
            };
            sign_inputs(&mut transaction, &inputs, profile, private_key, &unlock)?;
            true
        }
        None => false,
    };

    tracing::debug!(
        network = %args.network,
        txid = %transaction.compute_txid(),
        inputs = inputs.len(),
        lock_time = args.timelock_block_height,
        fee,
        is_signed,
        "built refund transaction"
    );

    Ok(RefundTransaction {
        transaction,
        fee,
        is_signed,
    })
}
