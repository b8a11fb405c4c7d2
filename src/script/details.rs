use bitcoin::hashes::{Hash as _, ripemd160};
use bitcoin::opcodes::Opcode;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CLTV, OP_DROP, OP_DUP, OP_ELSE, OP_ENDIF, OP_EQUAL, OP_EQUALVERIFY,
    OP_HASH160, OP_IF, OP_PUSHNUM_1, OP_PUSHNUM_16,
};
use bitcoin::script::{Instruction, Script, ScriptBuf};
use bitcoin::{PubkeyHash, PublicKey};
use serde::Serialize;

use super::template::SwapScriptType;
use crate::chain::SwapNetwork;
use crate::chain::address::{base58_address, p2pkh_address, p2wpkh_address, segwit_address};
use crate::error::{Result, SwapError};
use crate::tx::SwapOutputKind;

/// Heights at or above this are interpreted as timestamps by CLTV.
const LOCKTIME_THRESHOLD: i64 = 500_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapScriptDetails {
    pub network: SwapNetwork,
    #[serde(rename = "type")]
    pub script_type: SwapScriptType,
    pub destination_public_key: PublicKey,
    pub payment_hash: ripemd160::Hash,
    pub refund_public_key: Option<PublicKey>,
    pub refund_public_key_hash: PubkeyHash,
    pub timelock_block_height: u32,
    pub redeem_script: ScriptBuf,
    pub p2sh_output_script: ScriptBuf,
    pub p2sh_address: String,
    pub p2sh_p2wsh_output_script: Option<ScriptBuf>,
    pub p2sh_p2wsh_address: Option<String>,
    pub witness_output_script: Option<ScriptBuf>,
    pub p2wsh_address: Option<String>,
    pub refund_p2pkh_address: String,
    pub refund_p2wpkh_address: Option<String>,
}

impl SwapScriptDetails {
    /// Every output script that pays to this swap, legacy first.
    pub fn output_scripts(&self) -> Vec<&Script> {
        let mut scripts = vec![self.p2sh_output_script.as_script()];
        scripts.extend(self.p2sh_p2wsh_output_script.as_deref());
        scripts.extend(self.witness_output_script.as_deref());
        scripts
    }

    pub fn addresses(&self) -> Vec<&str> {
        let mut addresses = vec![self.p2sh_address.as_str()];
        addresses.extend(self.p2sh_p2wsh_address.as_deref());
        addresses.extend(self.p2wsh_address.as_deref());
        addresses
    }

    pub fn output_kind(&self, output_script: &Script) -> Option<SwapOutputKind> {
        if output_script == self.p2sh_output_script.as_script() {
            Some(SwapOutputKind::P2sh)
        } else if self.p2sh_p2wsh_output_script.as_deref() == Some(output_script) {
            Some(SwapOutputKind::P2shP2wsh)
        } else if self.witness_output_script.as_deref() == Some(output_script) {
            Some(SwapOutputKind::P2wsh)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Op(Opcode, &'static str),
    PaymentHash,
    DestinationPublicKey,
    CltvHeight,
    RefundPublicKey,
    RefundPublicKeyHash,
}

impl Slot {
    fn error_code(self) -> &'static str {
        match self {
            Slot::Op(_, code) => code,
            Slot::PaymentHash => "ExpectedPaymentHash",
            Slot::DestinationPublicKey => "ExpectedDestinationPublicKey",
            Slot::CltvHeight => "ExpectedCltvHeight",
            Slot::RefundPublicKey => "ExpectedRefundPublicKey",
            Slot::RefundPublicKeyHash => "ExpectedRefundPublicKeyHash",
        }
    }

    fn mismatch(self, position: usize) -> SwapError {
        SwapError::UnexpectedScriptElement {
            position,
            code: self.error_code(),
        }
    }
}

const HASH160: Slot = Slot::Op(OP_HASH160, "ExpectedOpHash160");
const EQUAL: Slot = Slot::Op(OP_EQUAL, "ExpectedOpEqual");
const IF: Slot = Slot::Op(OP_IF, "ExpectedOpIf");
const ELSE: Slot = Slot::Op(OP_ELSE, "ExpectedOpElse");
const CLTV: Slot = Slot::Op(OP_CLTV, "ExpectedOpCltv");
const DROP: Slot = Slot::Op(OP_DROP, "ExpectedOpDrop");
const DUP: Slot = Slot::Op(OP_DUP, "ExpectedOpDup");
const EQUALVERIFY: Slot = Slot::Op(OP_EQUALVERIFY, "ExpectedOpEqualVerify");
const ENDIF: Slot = Slot::Op(OP_ENDIF, "ExpectedOpEndIf");
const CHECKSIG: Slot = Slot::Op(OP_CHECKSIG, "ExpectedOpCheckSig");

const PK_LAYOUT: [Slot; 12] = [
    HASH160,
    Slot::PaymentHash,
    EQUAL,
    IF,
    Slot::DestinationPublicKey,
    ELSE,
    Slot::CltvHeight,
    CLTV,
    DROP,
    Slot::RefundPublicKey,
    ENDIF,
    CHECKSIG,
];

const PKHASH_LAYOUT: [Slot; 17] = [
    DUP,
    HASH160,
    Slot::PaymentHash,
    EQUAL,
    IF,
    DROP,
    Slot::DestinationPublicKey,
    ELSE,
    Slot::CltvHeight,
    CLTV,
    DROP,
    DUP,
    HASH160,
    Slot::RefundPublicKeyHash,
    EQUALVERIFY,
    ENDIF,
    CHECKSIG,
];

impl SwapScriptType {
    fn from_element_count(count: usize) -> Result<Self> {
        match count {
            12 => Ok(SwapScriptType::Pk),
            17 => Ok(SwapScriptType::Pkhash),
            other => Err(SwapError::InvalidScriptLength(other)),
        }
    }

    fn layout(self) -> &'static [Slot] {
        match self {
            SwapScriptType::Pk => &PK_LAYOUT,
            SwapScriptType::Pkhash => &PKHASH_LAYOUT,
        }
    }
}

#[derive(Default)]
struct Fields {
    payment_hash: Option<ripemd160::Hash>,
    destination_public_key: Option<PublicKey>,
    timelock_block_height: Option<u32>,
    refund_public_key: Option<PublicKey>,
    refund_public_key_hash: Option<PubkeyHash>,
}

impl Fields {
    fn read(&mut self, slot: Slot, position: usize, instruction: Instruction<'_>) -> Result<()> {
        let mismatch = || slot.mismatch(position);

        match (slot, instruction) {
            (Slot::Op(expected, _), Instruction::Op(op)) if op == expected => {}
            (Slot::PaymentHash, Instruction::PushBytes(bytes)) if bytes.len() == 20 => {
                self.payment_hash =
                    Some(ripemd160::Hash::from_slice(bytes.as_bytes()).map_err(|_| mismatch())?);
            }
            (Slot::DestinationPublicKey, Instruction::PushBytes(bytes)) if bytes.len() == 33 => {
                self.destination_public_key =
                    Some(PublicKey::from_slice(bytes.as_bytes()).map_err(|_| mismatch())?);
            }
            (Slot::RefundPublicKey, Instruction::PushBytes(bytes)) if bytes.len() == 33 => {
                self.refund_public_key =
                    Some(PublicKey::from_slice(bytes.as_bytes()).map_err(|_| mismatch())?);
            }
            (Slot::RefundPublicKeyHash, Instruction::PushBytes(bytes)) if bytes.len() == 20 => {
                self.refund_public_key_hash =
                    Some(PubkeyHash::from_slice(bytes.as_bytes()).map_err(|_| mismatch())?);
            }
            (Slot::CltvHeight, instruction) => {
                let height = parse_script_num(instruction).ok_or_else(mismatch)?;
                if !(0..LOCKTIME_THRESHOLD).contains(&height) {
                    return Err(mismatch());
                }
                self.timelock_block_height = Some(height as u32);
            }
            _ => return Err(mismatch()),
        }

        Ok(())
    }
}

fn parse_script_num(instruction: Instruction<'_>) -> Option<i64> {
    match instruction {
        Instruction::PushBytes(bytes) => decode_script_num(bytes.as_bytes()),
        Instruction::Op(op) => {
            let code = op.to_u8();
            let one = OP_PUSHNUM_1.to_u8();
            let sixteen = OP_PUSHNUM_16.to_u8();
            (one..=sixteen)
                .contains(&code)
                .then(|| i64::from(code - one + 1))
        }
    }
}

fn decode_script_num(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return Some(0);
    }
    // CLTV accepts up to 5-byte operands.
    if bytes.len() > 5 {
        return None;
    }

    // Minimal encoding: a trailing 0x00 or 0x80 only carries the sign bit
    // when the byte before it would otherwise set it.
    if let [.., last] = bytes
        && last & 0x7f == 0
        && !matches!(bytes, [.., before, _] if before & 0x80 != 0)
    {
        return None;
    }

    let mut magnitude = bytes.to_vec();
    let negative = magnitude.last().is_some_and(|b| (b & 0x80) != 0);
    if let Some(last) = magnitude.last_mut() {
        *last &= 0x7f;
    }

    let mut value: i64 = 0;
    for (i, b) in magnitude.iter().enumerate() {
        value |= (*b as i64) << (8 * i);
    }

    Some(if negative { -value } else { value })
}

/// Decodes a swap redeem script and derives every output form it can take
/// on `network`.
pub fn swap_script_details(network: SwapNetwork, script: &Script) -> Result<SwapScriptDetails> {
    let instructions = script
        .instructions_minimal()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SwapError::InvalidScript(format!("{e:?}")))?;

    let script_type = SwapScriptType::from_element_count(instructions.len())?;

    let mut fields = Fields::default();
    for (position, (slot, instruction)) in script_type
        .layout()
        .iter()
        .zip(instructions)
        .enumerate()
    {
        fields.read(*slot, position, instruction)?;
    }

    let missing = |slot: Slot| SwapError::UnexpectedScriptElement {
        position: 0,
        code: slot.error_code(),
    };
    let payment_hash = fields
        .payment_hash
        .ok_or_else(|| missing(Slot::PaymentHash))?;
    let destination_public_key = fields
        .destination_public_key
        .ok_or_else(|| missing(Slot::DestinationPublicKey))?;
    let timelock_block_height = fields
        .timelock_block_height
        .ok_or_else(|| missing(Slot::CltvHeight))?;

    let (refund_public_key, refund_public_key_hash) = match script_type {
        SwapScriptType::Pk => {
            let key = fields
                .refund_public_key
                .ok_or_else(|| missing(Slot::RefundPublicKey))?;
            (Some(key), key.pubkey_hash())
        }
        SwapScriptType::Pkhash => {
            let hash = fields
                .refund_public_key_hash
                .ok_or_else(|| missing(Slot::RefundPublicKeyHash))?;
            (None, hash)
        }
    };

    let profile = network.profile();

    let p2sh_output_script = script.to_p2sh();
    let p2sh_address = base58_address(profile.p2sh_prefix, &p2sh_output_script.as_bytes()[2..22]);

    let (witness_output_script, p2wsh_address, p2sh_p2wsh_output_script, p2sh_p2wsh_address) =
        if profile.is_segwit_absent() {
            (None, None, None, None)
        } else {
            let witness_output_script = script.to_p2wsh();
            let p2wsh_address = segwit_address(profile, &witness_output_script.as_bytes()[2..])?;
            let nested = witness_output_script.to_p2sh();
            let nested_address = base58_address(profile.p2sh_prefix, &nested.as_bytes()[2..22]);
            (
                Some(witness_output_script),
                Some(p2wsh_address),
                Some(nested),
                Some(nested_address),
            )
        };

    Ok(SwapScriptDetails {
        network,
        script_type,
        destination_public_key,
        payment_hash,
        refund_public_key,
        refund_public_key_hash,
        timelock_block_height,
        redeem_script: script.to_owned(),
        p2sh_output_script,
        p2sh_address,
        p2sh_p2wsh_output_script,
        p2sh_p2wsh_address,
        witness_output_script,
        p2wsh_address,
        refund_p2pkh_address: p2pkh_address(network, &refund_public_key_hash),
        refund_p2wpkh_address: p2wpkh_address(network, &refund_public_key_hash),
    })
}
