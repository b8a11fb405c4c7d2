use bitcoin::hashes::{Hash as _, ripemd160, sha256};
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CLTV, OP_DROP, OP_DUP, OP_ELSE, OP_ENDIF, OP_EQUAL, OP_EQUALVERIFY,
    OP_HASH160, OP_IF,
};
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::{PubkeyHash, PublicKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapScriptType {
    Pk,
    Pkhash,
}

/// The refund branch checks either a raw key or a key hash, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundKey {
    PublicKey(PublicKey),
    PublicKeyHash(PubkeyHash),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapScriptParams {
    pub destination_public_key: PublicKey,
    pub payment_hash: sha256::Hash,
    pub refund: RefundKey,
    pub timeout_block_height: u32,
}

impl SwapScriptParams {
    pub fn script_type(&self) -> SwapScriptType {
        match self.refund {
            RefundKey::PublicKey(_) => SwapScriptType::Pk,
            RefundKey::PublicKeyHash(_) => SwapScriptType::Pkhash,
        }
    }

    pub fn script(&self) -> ScriptBuf {
        match &self.refund {
            RefundKey::PublicKey(refund_public_key) => pk_swap_script(
                &self.destination_public_key,
                &self.payment_hash,
                refund_public_key,
                self.timeout_block_height,
            ),
            RefundKey::PublicKeyHash(refund_public_key_hash) => pk_hash_swap_script(
                &self.destination_public_key,
                &self.payment_hash,
                refund_public_key_hash,
                self.timeout_block_height,
            ),
        }
    }
}

/// HASH160 of the preimage, which is what the script commits to.
pub fn payment_hash_digest(payment_hash: &sha256::Hash) -> ripemd160::Hash {
    ripemd160::Hash::hash(payment_hash.as_byte_array())
}

pub fn preimage_payment_hash(preimage: &[u8; 32]) -> sha256::Hash {
    sha256::Hash::hash(preimage)
}

pub fn public_key_hash(public_key: &PublicKey) -> PubkeyHash {
    public_key.pubkey_hash()
}

pub fn pk_swap_script(
    destination_public_key: &PublicKey,
    payment_hash: &sha256::Hash,
    refund_public_key: &PublicKey,
    timeout_block_height: u32,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_HASH160)
        .push_slice(payment_hash_digest(payment_hash).as_byte_array())
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_key(destination_public_key)
        .push_opcode(OP_ELSE)
        .push_int(i64::from(timeout_block_height))
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_key(refund_public_key)
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

pub fn pk_hash_swap_script(
    destination_public_key: &PublicKey,
    payment_hash: &sha256::Hash,
    refund_public_key_hash: &PubkeyHash,
    timeout_block_height: u32,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(payment_hash_digest(payment_hash).as_byte_array())
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_opcode(OP_DROP)
        .push_key(destination_public_key)
        .push_opcode(OP_ELSE)
        .push_int(i64::from(timeout_block_height))
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(refund_public_key_hash.as_byte_array())
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}
