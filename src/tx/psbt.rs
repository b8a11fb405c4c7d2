use bitcoin::psbt::{Psbt, PsbtSighashType};
use bitcoin::{Amount, TxOut};

use super::refund::{RefundArgs, refund_transaction};
use super::sign::sighash_type;
use super::{SwapOutputKind, SwapUtxo};
use crate::error::{Result, SwapError};

/// Unsigned refund wrapped for an external signer. Legacy inputs need the
/// funding transaction of their utxo.
pub fn refund_psbt(args: &RefundArgs) -> Result<Psbt> {
    let unsigned = refund_transaction(&RefundArgs {
        private_key: None,
        ..args.clone()
    })?;

    let mut psbt = Psbt::from_unsigned_tx(unsigned.transaction)
        .map_err(|e| SwapError::InvalidTransaction(e.to_string()))?;

    let sighash = PsbtSighashType::from_u32(sighash_type(args.network.profile()));
    for (input, utxo) in psbt.inputs.iter_mut().zip(&args.utxos) {
        let kind = utxo.kind()?;
        input.sighash_type = Some(sighash);

        match kind {
            SwapOutputKind::P2sh => {
                input.redeem_script = Some(utxo.redeem_script.clone());
            }
            SwapOutputKind::P2shP2wsh => {
                input.redeem_script = Some(utxo.redeem_script.to_p2wsh());
                input.witness_script = Some(utxo.redeem_script.clone());
            }
            SwapOutputKind::P2wsh => {
                input.witness_script = Some(utxo.redeem_script.clone());
            }
        }

        input.non_witness_utxo = funding_transaction(utxo)?;
        if kind.is_witness() {
            input.witness_utxo = Some(TxOut {
                value: Amount::from_sat(utxo.tokens),
                script_pubkey: utxo.output_script.clone(),
            });
        } else if input.non_witness_utxo.is_none() {
            return Err(SwapError::ExpectedUtxoInTransaction);
        }
    }

    Ok(psbt)
}

fn funding_transaction(utxo: &SwapUtxo) -> Result<Option<bitcoin::Transaction>> {
    let Some(tx) = &utxo.funding_transaction else {
        return Ok(None);
    };
    let spent = tx
        .output
        .get(utxo.vout as usize)
        .filter(|out| out.script_pubkey == utxo.output_script);
    if tx.compute_txid() != utxo.transaction_id || spent.is_none() {
        return Err(SwapError::ExpectedUtxoInTransaction);
    }
    Ok(Some(tx.clone()))
}
