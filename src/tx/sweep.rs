use bitcoin::absolute::LockTime;
use bitcoin::script::{Builder, PushBytesBuf, ScriptBuf};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::sighash::SighashCache;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Sequence, Transaction, TxIn, TxOut, Witness};

use super::sign::{input_sighash, sign_digest};
use super::spend::MAX_SIGNATURE_LEN;
use super::{SwapOutputKind, SwapUtxo};
use crate::chain::ChainProfile;
use crate::error::{Result, SwapError};

/// Push of a 34-byte P2WSH program.
const NESTED_SCRIPT_SIG_LEN: usize = 35;

pub(crate) struct SweepInput<'a> {
    pub utxo: &'a SwapUtxo,
    pub kind: SwapOutputKind,
}

pub(crate) fn sweep_inputs<'a>(
    profile: &ChainProfile,
    utxos: &'a [SwapUtxo],
) -> Result<Vec<SweepInput<'a>>> {
    if utxos.is_empty() {
        return Err(SwapError::ExpectedFundingUtxos);
    }

    utxos
        .iter()
        .map(|utxo| {
            let kind = utxo.kind()?;
            if kind.is_witness() && profile.is_segwit_absent() {
                return Err(SwapError::SegwitUnavailable(format!("{kind:?} input")));
            }
            Ok(SweepInput { utxo, kind })
        })
        .collect()
}

pub(crate) fn total_tokens(inputs: &[SweepInput<'_>]) -> u64 {
    inputs.iter().map(|input| input.utxo.tokens).sum()
}

pub(crate) fn skeleton(
    inputs: &[SweepInput<'_>],
    sequence: Sequence,
    lock_time: LockTime,
    destination: ScriptBuf,
) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time,
        input: inputs
            .iter()
            .map(|input| TxIn {
                previous_output: input.utxo.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence,
                witness: Witness::default(),
            })
            .collect(),
        output: vec![TxOut {
            value: Amount::from_sat(total_tokens(inputs)),
            script_pubkey: destination,
        }],
    }
}

fn var_int_len(n: usize) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

fn push_len(n: usize) -> usize {
    match n {
        0..=75 => 1 + n,
        76..=0xff => 2 + n,
        0x100..=0xffff => 3 + n,
        _ => 5 + n,
    }
}

fn witness_len(elements: &[usize]) -> usize {
    var_int_len(elements.len())
        + elements
            .iter()
            .map(|n| var_int_len(*n) + n)
            .sum::<usize>()
}

// Every input unlocks with [signature, unlock, redeem_script] at max signature size.
pub(crate) fn anticipated_weight(
    skeleton: &Transaction,
    inputs: &[SweepInput<'_>],
    unlock_len: usize,
) -> u64 {
    let mut weight = skeleton.weight().to_wu();

    let has_witness = inputs.iter().any(|input| input.kind.is_witness());
    if has_witness {
        // segwit marker and flag
        weight += 2;
    }

    for input in inputs {
        let elements = [
            MAX_SIGNATURE_LEN,
            unlock_len,
            input.utxo.redeem_script.len(),
        ];

        let added = match input.kind {
            SwapOutputKind::P2sh => {
                let script_sig: usize = elements.iter().map(|n| push_len(*n)).sum();
                let base = 4 * (script_sig + var_int_len(script_sig) - 1);
                base + usize::from(has_witness)
            }
            SwapOutputKind::P2shP2wsh => 4 * NESTED_SCRIPT_SIG_LEN + witness_len(&elements),
            SwapOutputKind::P2wsh => witness_len(&elements),
        };
        weight += added as u64;
    }

    weight
}

pub(crate) fn fee_for_weight(fee_tokens_per_vbyte: u64, weight: u64) -> u64 {
    fee_tokens_per_vbyte.saturating_mul(weight.div_ceil(4))
}

pub(crate) fn sign_inputs(
    transaction: &mut Transaction,
    inputs: &[SweepInput<'_>],
    profile: &ChainProfile,
    secret_key: &SecretKey,
    unlock: &[u8],
) -> Result<()> {
    let secp = Secp256k1::signing_only();

    let signatures = {
        let mut cache = SighashCache::new(&*transaction);
        inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let digest = input_sighash(
                    &mut cache,
                    profile,
                    index,
                    input.kind,
                    &input.utxo.redeem_script,
                    input.utxo.tokens,
                )?;
                Ok(sign_digest(&secp, digest, secret_key, profile))
            })
            .collect::<Result<Vec<_>>>()?
    };

    for ((tx_in, input), signature) in transaction.input.iter_mut().zip(inputs).zip(signatures) {
        let redeem_script = input.utxo.redeem_script.as_bytes();
        let stack: [&[u8]; 3] = [signature.as_slice(), unlock, redeem_script];
        match input.kind {
            SwapOutputKind::P2sh => {
                tx_in.script_sig = push_elements(&stack)?;
            }
            SwapOutputKind::P2shP2wsh => {
                let program = input.utxo.redeem_script.to_p2wsh();
                tx_in.script_sig = push_elements(&[program.as_bytes()])?;
                tx_in.witness = Witness::from_slice(&stack);
            }
            SwapOutputKind::P2wsh => {
                tx_in.witness = Witness::from_slice(&stack);
            }
        }
    }

    Ok(())
}

fn push_elements(elements: &[&[u8]]) -> Result<ScriptBuf> {
    let mut builder = Builder::new();
    for element in elements {
        let push = PushBytesBuf::try_from(element.to_vec())
            .map_err(|e| SwapError::InvalidScript(format!("push element: {e:?}")))?;
        builder = builder.push_slice(push);
    }
    Ok(builder.into_script())
}
