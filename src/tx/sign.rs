use bitcoin::hashes::{Hash as _, sha256d};
use bitcoin::script::Script;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey, Signing};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Amount, Transaction};

use super::SwapOutputKind;
use crate::chain::ChainProfile;
use crate::error::{Result, SwapError};

const SIGHASH_FORKID: u32 = 0x40;

pub fn sighash_type(profile: &ChainProfile) -> u32 {
    let all = EcdsaSighashType::All.to_u32();
    match profile.fork_id {
        Some(fork_id) => all | SIGHASH_FORKID | (fork_id << 8),
        None => all,
    }
}

/// Digest an input signature commits to. Fork-id chains always use the
/// BIP143 algorithm, even for legacy inputs.
pub fn input_sighash(
    cache: &mut SighashCache<&Transaction>,
    profile: &ChainProfile,
    input_index: usize,
    kind: SwapOutputKind,
    redeem_script: &Script,
    tokens: u64,
) -> Result<[u8; 32]> {
    let value = Amount::from_sat(tokens);

    if profile.fork_id.is_some() {
        let mut preimage = Vec::new();
        cache
            .segwit_v0_encode_signing_data_to(
                &mut preimage,
                input_index,
                redeem_script,
                value,
                EcdsaSighashType::All,
            )
            .map_err(|e| SwapError::Signing(format!("input {input_index}: {e:?}")))?;

        // BIP143 ends with the sighash type; SIGHASH_ALL leaves every other
        // field unaffected by the fork-id bits.
        preimage.truncate(preimage.len().saturating_sub(4));
        preimage.extend_from_slice(&sighash_type(profile).to_le_bytes());
        return Ok(sha256d::Hash::hash(&preimage).to_byte_array());
    }

    if kind.is_witness() {
        cache
            .p2wsh_signature_hash(input_index, redeem_script, value, EcdsaSighashType::All)
            .map(|hash| hash.to_byte_array())
            .map_err(|e| SwapError::Signing(format!("input {input_index}: {e:?}")))
    } else {
        cache
            .legacy_signature_hash(input_index, redeem_script, EcdsaSighashType::All.to_u32())
            .map(|hash| hash.to_byte_array())
            .map_err(|e| SwapError::Signing(format!("input {input_index}: {e:?}")))
    }
}

pub fn sign_digest<C: Signing>(
    secp: &Secp256k1<C>,
    digest: [u8; 32],
    secret_key: &SecretKey,
    profile: &ChainProfile,
) -> Vec<u8> {
    let msg = Message::from_digest(digest);
    let sig = secp.sign_ecdsa(&msg, secret_key);
    let mut sig_bytes = sig.serialize_der().to_vec();
    sig_bytes.push(sighash_type(profile) as u8);
    sig_bytes
}
