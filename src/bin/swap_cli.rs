use std::path::PathBuf;
use std::str::FromStr as _;

use anyhow::{Context as _, Result};
use bitcoin::consensus::encode::{deserialize_hex, serialize_hex};
use bitcoin::hashes::sha256;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::SecretKey;
use bitcoin::{PubkeyHash, PublicKey, Transaction, Txid};
use chain_swaps::chain::SwapNetwork;
use chain_swaps::chain::address::address_details;
use chain_swaps::pool::{SqliteCache, get_detected_swaps};
use chain_swaps::script::{RefundKey, SwapScriptParams, swap_script_details};
use chain_swaps::tx::{
    ClaimArgs, RefundArgs, SwapUtxo, claim_transaction, refund_psbt, refund_transaction,
};
use clap::{Parser as _, Subcommand};
use hex::FromHex as _;
use serde_json::json;

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long, default_value = "btc")]
    network: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    SwapScript {
        #[arg(long)]
        destination_public_key: String,

        /// Hex sha256 of the preimage.
        #[arg(long)]
        payment_hash: String,

        #[arg(long, conflicts_with = "refund_public_key_hash")]
        refund_public_key: Option<String>,

        #[arg(long)]
        refund_public_key_hash: Option<String>,

        #[arg(long)]
        timeout_block_height: u32,
    },
    DecodeScript {
        #[arg(long)]
        script: String,
    },
    AddressDetails {
        #[arg(long)]
        address: String,
    },
    ClaimTx {
        #[arg(long)]
        script: String,

        /// `txid:vout:tokens:address`, repeatable.
        #[arg(long = "utxo", required = true)]
        utxos: Vec<String>,

        #[arg(long)]
        destination: String,

        #[arg(long, default_value_t = 1)]
        fee_rate: u64,

        #[arg(long)]
        preimage: String,

        #[arg(long)]
        private_key: String,
    },
    RefundTx {
        #[arg(long)]
        script: String,

        #[arg(long = "utxo", required = true)]
        utxos: Vec<String>,

        #[arg(long)]
        destination: String,

        #[arg(long, default_value_t = 1)]
        fee_rate: u64,

        #[arg(long)]
        timelock_block_height: u32,

        #[arg(long)]
        private_key: Option<String>,
    },
    RefundPsbt {
        #[arg(long)]
        script: String,

        #[arg(long = "utxo", required = true)]
        utxos: Vec<String>,

        #[arg(long)]
        destination: String,

        #[arg(long, default_value_t = 1)]
        fee_rate: u64,

        #[arg(long)]
        timelock_block_height: u32,

        #[arg(long = "funding-transaction")]
        funding_transactions: Vec<String>,
    },
    DetectedSwaps {
        #[arg(long)]
        store_path: PathBuf,

        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    chain_swaps::logging::init().ok();
    let args = Args::parse();
    let network = SwapNetwork::from_str(&args.network).context("parse network")?;

    let out = match args.command {
        Command::SwapScript {
            destination_public_key,
            payment_hash,
            refund_public_key,
            refund_public_key_hash,
            timeout_block_height,
        } => {
            let refund = match (refund_public_key, refund_public_key_hash) {
                (Some(key), None) => RefundKey::PublicKey(
                    PublicKey::from_str(&key).context("parse refund_public_key")?,
                ),
                (None, Some(hash)) => RefundKey::PublicKeyHash(
                    PubkeyHash::from_str(&hash).context("parse refund_public_key_hash")?,
                ),
                _ => anyhow::bail!(
                    "pass exactly one of --refund-public-key, --refund-public-key-hash"
                ),
            };

            let params = SwapScriptParams {
                destination_public_key: PublicKey::from_str(&destination_public_key)
                    .context("parse destination_public_key")?,
                payment_hash: sha256::Hash::from_str(&payment_hash)
                    .context("parse payment_hash")?,
                refund,
                timeout_block_height,
            };
            let script = params.script();
            let details = swap_script_details(network, &script).context("decode swap script")?;

            json!({
              "script": script.to_hex_string(),
              "details": details,
            })
        }
        Command::DecodeScript { script } => {
            let script = parse_script(&script)?;
            let details = swap_script_details(network, &script).context("decode swap script")?;
            serde_json::to_value(details)?
        }
        Command::AddressDetails { address } => {
            let details = address_details(network, &address).context("parse address")?;
            serde_json::to_value(details)?
        }
        Command::ClaimTx {
            script,
            utxos,
            destination,
            fee_rate,
            preimage,
            private_key,
        } => {
            let script = parse_script(&script)?;
            let claim = claim_transaction(&ClaimArgs {
                network,
                destination,
                fee_tokens_per_vbyte: fee_rate,
                preimage: <[u8; 32]>::from_hex(&preimage).context("parse preimage")?,
                private_key: SecretKey::from_str(&private_key).context("parse private_key")?,
                utxos: parse_utxos(network, &script, &utxos, &[])?,
            })
            .context("build claim transaction")?;

            transaction_json(&claim.transaction, claim.fee)
        }
        Command::RefundTx {
            script,
            utxos,
            destination,
            fee_rate,
            timelock_block_height,
            private_key,
        } => {
            let script = parse_script(&script)?;
            let private_key = private_key
                .as_deref()
                .map(SecretKey::from_str)
                .transpose()
                .context("parse private_key")?;
            let refund = refund_transaction(&RefundArgs {
                network,
                destination,
                fee_tokens_per_vbyte: fee_rate,
                private_key,
                timelock_block_height,
                utxos: parse_utxos(network, &script, &utxos, &[])?,
            })
            .context("build refund transaction")?;

            let mut out = transaction_json(&refund.transaction, refund.fee);
            out["is_signed"] = json!(refund.is_signed);
            out
        }
        Command::RefundPsbt {
            script,
            utxos,
            destination,
            fee_rate,
            timelock_block_height,
            funding_transactions,
        } => {
            let script = parse_script(&script)?;
            let funding = funding_transactions
                .iter()
                .map(|hex| deserialize_hex::<Transaction>(hex.as_str()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("parse funding transaction")?;
            let psbt = refund_psbt(&RefundArgs {
                network,
                destination,
                fee_tokens_per_vbyte: fee_rate,
                private_key: None,
                timelock_block_height,
                utxos: parse_utxos(network, &script, &utxos, &funding)?,
            })
            .context("build refund psbt")?;

            json!({
              "psbt": psbt.serialize_hex(),
              "transaction_id": psbt.unsigned_tx.compute_txid().to_string(),
            })
        }
        Command::DetectedSwaps { store_path, id } => {
            let cache = SqliteCache::open(store_path).context("open sqlite cache")?;
            let swaps = get_detected_swaps(&cache, &id)
                .await
                .context("get detected swaps")?;
            serde_json::to_value(swaps)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn parse_script(hex: &str) -> Result<ScriptBuf> {
    ScriptBuf::from_hex(hex).context("parse script hex")
}

fn parse_utxos(
    network: SwapNetwork,
    script: &ScriptBuf,
    raw: &[String],
    funding: &[Transaction],
) -> Result<Vec<SwapUtxo>> {
    raw.iter()
        .map(|utxo| {
            let parts: Vec<&str> = utxo.split(':').collect();
            let [txid, vout, tokens, address] = parts.as_slice() else {
                anyhow::bail!("expected txid:vout:tokens:address, got {utxo}");
            };
            let transaction_id = Txid::from_str(txid).context("parse utxo txid")?;
            Ok(SwapUtxo {
                transaction_id,
                vout: vout.parse().context("parse utxo vout")?,
                tokens: tokens.parse().context("parse utxo tokens")?,
                output_script: address_details(network, address)
                    .context("parse utxo address")?
                    .output_script,
                redeem_script: script.clone(),
                funding_transaction: funding
                    .iter()
                    .find(|tx| tx.compute_txid() == transaction_id)
                    .cloned(),
            })
        })
        .collect()
}

fn transaction_json(tx: &Transaction, fee: u64) -> serde_json::Value {
    json!({
      "transaction": serialize_hex(tx),
      "transaction_id": tx.compute_txid().to_string(),
      "fee": fee,
    })
}
