use bitcoin::bech32::{self, Hrp};
use bitcoin::hashes::{Hash as _, hash160};
use bitcoin::script::{Script, ScriptBuf};
use bitcoin::{PubkeyHash, ScriptHash, WPubkeyHash, WScriptHash, base58};
use serde::Serialize;

use super::{ChainProfile, SwapNetwork};
use crate::error::{Result, SwapError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressDetails {
    #[serde(rename = "type")]
    pub address_type: AddressType,
    #[serde(with = "hex::serde")]
    pub hash: Vec<u8>,
    pub output_script: ScriptBuf,
}

pub fn address_details(network: SwapNetwork, address: &str) -> Result<AddressDetails> {
    let profile = network.profile();

    if let Some(hrp) = profile.bech32_hrp
        && let Ok((decoded_hrp, version, program)) = bech32::segwit::decode(address)
    {
        if !decoded_hrp.to_string().eq_ignore_ascii_case(hrp) {
            return Err(SwapError::InvalidAddress(format!(
                "{address} is not a {network} address"
            )));
        }
        if version.to_u8() != 0 {
            return Err(SwapError::InvalidAddress(format!(
                "unsupported witness version {} in {address}",
                version.to_u8()
            )));
        }
        return match program.len() {
            20 => {
                let hash = WPubkeyHash::from_slice(&program)
                    .map_err(|e| SwapError::InvalidAddress(e.to_string()))?;
                Ok(AddressDetails {
                    address_type: AddressType::P2wpkh,
                    output_script: ScriptBuf::new_p2wpkh(&hash),
                    hash: program,
                })
            }
            32 => {
                let hash = WScriptHash::from_slice(&program)
                    .map_err(|e| SwapError::InvalidAddress(e.to_string()))?;
                Ok(AddressDetails {
                    address_type: AddressType::P2wsh,
                    output_script: ScriptBuf::new_p2wsh(&hash),
                    hash: program,
                })
            }
            len => Err(SwapError::InvalidAddress(format!(
                "unexpected witness program length {len} in {address}"
            ))),
        };
    }

    let payload = base58::decode_check(address)
        .map_err(|e| SwapError::InvalidAddress(format!("{address}: {e}")))?;
    let Some((&prefix, hash)) = payload.split_first() else {
        return Err(SwapError::InvalidAddress(format!("{address}: empty payload")));
    };
    if hash.len() != 20 {
        return Err(SwapError::InvalidAddress(format!(
            "{address}: unexpected hash length {}",
            hash.len()
        )));
    }

    if prefix == profile.p2pkh_prefix {
        let pkh =
            PubkeyHash::from_slice(hash).map_err(|e| SwapError::InvalidAddress(e.to_string()))?;
        Ok(AddressDetails {
            address_type: AddressType::P2pkh,
            output_script: ScriptBuf::new_p2pkh(&pkh),
            hash: hash.to_vec(),
        })
    } else if prefix == profile.p2sh_prefix {
        let sh =
            ScriptHash::from_slice(hash).map_err(|e| SwapError::InvalidAddress(e.to_string()))?;
        Ok(AddressDetails {
            address_type: AddressType::P2sh,
            output_script: ScriptBuf::new_p2sh(&sh),
            hash: hash.to_vec(),
        })
    } else {
        Err(SwapError::InvalidAddress(format!(
            "{address} has version {prefix:#04x}, not a {network} address"
        )))
    }
}

/// Address of a standard output script, `None` for anything non-standard or
/// for segwit outputs on a chain without segwit.
pub fn address_from_output_script(network: SwapNetwork, script: &Script) -> Option<String> {
    let profile = network.profile();
    let bytes = script.as_bytes();

    if script.is_p2pkh() {
        Some(base58_address(profile.p2pkh_prefix, &bytes[3..23]))
    } else if script.is_p2sh() {
        Some(base58_address(profile.p2sh_prefix, &bytes[2..22]))
    } else if script.is_p2wpkh() || script.is_p2wsh() {
        segwit_address(profile, &bytes[2..]).ok()
    } else {
        None
    }
}

pub(crate) fn base58_address(prefix: u8, hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + hash.len());
    payload.push(prefix);
    payload.extend_from_slice(hash);
    base58::encode_check(&payload)
}

pub(crate) fn segwit_address(profile: &ChainProfile, program: &[u8]) -> Result<String> {
    let hrp = profile
        .bech32_hrp
        .ok_or_else(|| SwapError::SegwitUnavailable(format!("{profile:?}")))?;
    let hrp = Hrp::parse(hrp).map_err(|e| SwapError::InvalidAddress(e.to_string()))?;
    bech32::segwit::encode(hrp, bech32::segwit::VERSION_0, program)
        .map_err(|e| SwapError::InvalidAddress(e.to_string()))
}

pub fn p2pkh_address(network: SwapNetwork, hash: &PubkeyHash) -> String {
    base58_address(network.profile().p2pkh_prefix, hash.as_byte_array())
}

pub fn p2wpkh_address(network: SwapNetwork, hash: &PubkeyHash) -> Option<String> {
    segwit_address(network.profile(), hash.as_byte_array()).ok()
}

pub(crate) fn script_hash160(script: &Script) -> hash160::Hash {
    hash160::Hash::hash(script.as_bytes())
}
