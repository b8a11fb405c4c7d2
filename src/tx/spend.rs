use bitcoin::script::{Instruction, ScriptBuf};
use bitcoin::{OutPoint, Transaction, TxIn};
use serde::{Deserialize, Serialize};

/// DER signature plus the sighash flag byte.
pub const MAX_SIGNATURE_LEN: usize = 73;

const PREIMAGE_LEN: usize = 32;
const COMPRESSED_PUBLIC_KEY_LEN: usize = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendKind {
    Claim,
    Refund,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResolution {
    pub kind: SpendKind,
    pub input_index: usize,
    pub outpoint: OutPoint,
    pub signature: Vec<u8>,
    pub unlock: Vec<u8>,
    pub redeem_script: ScriptBuf,
}

impl SwapResolution {
    pub fn preimage(&self) -> Option<[u8; 32]> {
        match self.kind {
            SpendKind::Claim => self.unlock.as_slice().try_into().ok(),
            SpendKind::Refund => None,
        }
    }
}

/// Witness when present, script sig pushes otherwise.
pub fn input_elements(input: &TxIn) -> Vec<&[u8]> {
    if !input.witness.is_empty() {
        return input.witness.iter().collect();
    }

    let mut elements = Vec::new();
    for instruction in input.script_sig.instructions() {
        match instruction {
            Ok(Instruction::PushBytes(bytes)) => elements.push(bytes.as_bytes()),
            _ => return Vec::new(),
        }
    }
    elements
}

pub fn is_pk_hash_spend(input: &TxIn) -> bool {
    match input_elements(input).as_slice() {
        [signature, public_key] => {
            !signature.is_empty()
                && signature.len() <= MAX_SIGNATURE_LEN
                && public_key.len() == COMPRESSED_PUBLIC_KEY_LEN
        }
        _ => false,
    }
}

pub fn is_swap_spend(input: &TxIn) -> bool {
    swap_resolution(0, input).is_some()
}

pub fn swap_resolution(input_index: usize, input: &TxIn) -> Option<SwapResolution> {
    let elements = input_elements(input);
    let mut stack = elements.iter().rev();
    let (Some(redeem_script), Some(unlock), Some(signature), None) =
        (stack.next(), stack.next(), stack.next(), stack.next())
    else {
        return None;
    };

    if redeem_script.is_empty() || signature.is_empty() || signature.len() > MAX_SIGNATURE_LEN {
        return None;
    }

    let kind = if unlock.len() == PREIMAGE_LEN {
        SpendKind::Claim
    } else {
        SpendKind::Refund
    };

    Some(SwapResolution {
        kind,
        input_index,
        outpoint: input.previous_output,
        signature: signature.to_vec(),
        unlock: unlock.to_vec(),
        redeem_script: ScriptBuf::from_bytes(redeem_script.to_vec()),
    })
}

pub fn swap_resolutions(transaction: &Transaction) -> Vec<SwapResolution> {
    transaction
        .input
        .iter()
        .enumerate()
        .filter_map(|(index, input)| swap_resolution(index, input))
        .collect()
}
