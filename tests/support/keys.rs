use anyhow::{Context as _, Result};
use bitcoin::hashes::{Hash as _, sha256};
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, PublicKey, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use chain_swaps::chain::SwapNetwork;
use chain_swaps::chain::address::p2wpkh_address;
use chain_swaps::script::template::{preimage_payment_hash, public_key_hash};
use chain_swaps::script::{
    RefundKey, SwapScriptDetails, SwapScriptParams, SwapScriptType, swap_script_details,
};
use chain_swaps::tx::SwapUtxo;

pub const TIMEOUT_BLOCK_HEIGHT: u32 = 800_000;

pub fn secret_key(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).expect("valid secret key")
}

pub fn public_key(secret_key: &SecretKey) -> PublicKey {
    PublicKey::new(secret_key.public_key(&Secp256k1::new()))
}

/// A P2WPKH address controlled by `secret_key`.
pub fn wallet_address(network: SwapNetwork, secret_key: &SecretKey) -> Result<String> {
    p2wpkh_address(network, &public_key_hash(&public_key(secret_key)))
        .context("network has no p2wpkh addresses")
}

pub struct SwapFixture {
    pub network: SwapNetwork,
    pub claim_key: SecretKey,
    pub refund_key: SecretKey,
    pub preimage: [u8; 32],
    pub payment_hash: sha256::Hash,
    pub script: ScriptBuf,
    pub details: SwapScriptDetails,
}

impl SwapFixture {
    pub fn new(network: SwapNetwork, script_type: SwapScriptType) -> Result<Self> {
        let claim_key = secret_key(1);
        let refund_key = secret_key(2);
        let preimage = [9u8; 32];
        let payment_hash = preimage_payment_hash(&preimage);

        let refund_public_key = public_key(&refund_key);
        let refund = match script_type {
            SwapScriptType::Pk => RefundKey::PublicKey(refund_public_key),
            SwapScriptType::Pkhash => RefundKey::PublicKeyHash(public_key_hash(&refund_public_key)),
        };

        let script = SwapScriptParams {
            destination_public_key: public_key(&claim_key),
            payment_hash,
            refund,
            timeout_block_height: TIMEOUT_BLOCK_HEIGHT,
        }
        .script();
        let details = swap_script_details(network, &script).context("decode fixture script")?;

        Ok(Self {
            network,
            claim_key,
            refund_key,
            preimage,
            payment_hash,
            script,
            details,
        })
    }

    pub fn id(&self) -> String {
        self.payment_hash.to_string()
    }

    /// Pays `outputs` from an ordinary key spend.
    pub fn funding_tx(&self, outputs: &[(ScriptBuf, u64)]) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: bitcoin::absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(Txid::from_byte_array([7u8; 32]), 0),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::from_slice(&[
                    vec![0x30; 72],
                    public_key(&secret_key(3)).to_bytes(),
                ]),
            }],
            output: outputs
                .iter()
                .map(|(script_pubkey, tokens)| TxOut {
                    value: Amount::from_sat(*tokens),
                    script_pubkey: script_pubkey.clone(),
                })
                .collect(),
        }
    }

    pub fn utxo(&self, tx: &Transaction, vout: u32) -> SwapUtxo {
        let output = &tx.output[vout as usize];
        SwapUtxo {
            transaction_id: tx.compute_txid(),
            vout,
            tokens: output.value.to_sat(),
            output_script: output.script_pubkey.clone(),
            redeem_script: self.script.clone(),
            funding_transaction: Some(tx.clone()),
        }
    }

    pub fn p2wsh(&self) -> ScriptBuf {
        self.details
            .witness_output_script
            .clone()
            .expect("segwit network")
    }
}
