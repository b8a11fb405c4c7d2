mod support;

use anyhow::{Context as _, Result};
use assert_cmd::Command;
use bitcoin::Transaction;
use bitcoin::consensus::encode::deserialize_hex;
use chain_swaps::chain::SwapNetwork;
use chain_swaps::script::SwapScriptType;
use predicates::prelude::*;
use serde_json::{Value, json};
use support::keys::{SwapFixture, TIMEOUT_BLOCK_HEIGHT, secret_key, wallet_address};

const G: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
const TWO_G: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

fn swap_cli() -> Result<Command> {
    Command::cargo_bin("swap_cli").context("locate swap_cli binary")
}

fn run_json(args: &[&str]) -> Result<Value> {
    let output = swap_cli()?.args(args).assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).context("parse cli output")
}

#[test]
fn address_details_for_legacy_and_segwit() -> Result<()> {
    let legacy = run_json(&["address-details", "--address", "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"])?;
    assert_eq!(legacy["type"], json!("p2pkh"));
    assert_eq!(legacy["hash"], json!("751e76e8199196d454941c45d1b3a323f1433bd6"));
    assert_eq!(
        legacy["output_script"],
        json!("76a914751e76e8199196d454941c45d1b3a323f1433bd688ac")
    );

    let segwit = run_json(&[
        "address-details",
        "--address",
        "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
    ])?;
    assert_eq!(segwit["type"], json!("p2wpkh"));
    assert_eq!(segwit["hash"], json!("751e76e8199196d454941c45d1b3a323f1433bd6"));
    Ok(())
}

#[test]
fn swap_script_round_trips_through_decode() -> Result<()> {
    let payment_hash = "aa".repeat(32);
    let created = run_json(&[
        "--network",
        "btctestnet",
        "swap-script",
        "--destination-public-key",
        G,
        "--payment-hash",
        &payment_hash,
        "--refund-public-key",
        TWO_G,
        "--timeout-block-height",
        "800000",
    ])?;
    let script = created["script"].as_str().context("script hex")?.to_string();
    assert_eq!(created["details"]["type"], json!("pk"));

    let decoded = run_json(&["--network", "btctestnet", "decode-script", "--script", &script])?;
    assert_eq!(decoded, created["details"]);
    assert_eq!(decoded["destination_public_key"], json!(G));
    assert_eq!(decoded["refund_public_key"], json!(TWO_G));
    assert_eq!(decoded["timelock_block_height"], json!(800_000));
    assert_eq!(decoded["network"], json!("btctestnet"));
    assert!(
        decoded["p2wsh_address"]
            .as_str()
            .is_some_and(|address| address.starts_with("tb1q"))
    );
    Ok(())
}

#[test]
fn claim_tx_spends_the_swap_utxo() -> Result<()> {
    let network = SwapNetwork::Btc;
    let fixture = SwapFixture::new(network, SwapScriptType::Pk)?;
    let funding = fixture.funding_tx(&[(fixture.p2wsh(), 100_000)]);
    let p2wsh_address = fixture.details.p2wsh_address.clone().context("p2wsh address")?;
    let utxo = format!("{}:0:100000:{p2wsh_address}", funding.compute_txid());

    let out = run_json(&[
        "claim-tx",
        "--script",
        &fixture.script.to_hex_string(),
        "--utxo",
        &utxo,
        "--destination",
        &wallet_address(network, &secret_key(6))?,
        "--fee-rate",
        "3",
        "--preimage",
        &hex::encode(fixture.preimage),
        "--private-key",
        &hex::encode(fixture.claim_key.secret_bytes()),
    ])?;

    let fee = out["fee"].as_u64().context("fee")?;
    let tx: Transaction =
        deserialize_hex(out["transaction"].as_str().context("transaction hex")?)?;
    assert_eq!(out["transaction_id"], json!(tx.compute_txid().to_string()));
    assert_eq!(tx.input[0].previous_output.txid, funding.compute_txid());
    assert_eq!(tx.output[0].value.to_sat(), 100_000 - fee);
    Ok(())
}

#[test]
fn refund_tx_without_key_is_unsigned() -> Result<()> {
    let network = SwapNetwork::Btc;
    let fixture = SwapFixture::new(network, SwapScriptType::Pkhash)?;
    let funding = fixture.funding_tx(&[(fixture.details.p2sh_output_script.clone(), 80_000)]);
    let utxo = format!(
        "{}:0:80000:{}",
        funding.compute_txid(),
        fixture.details.p2sh_address
    );
    let height = TIMEOUT_BLOCK_HEIGHT.to_string();

    let out = run_json(&[
        "refund-tx",
        "--script",
        &fixture.script.to_hex_string(),
        "--utxo",
        &utxo,
        "--destination",
        &wallet_address(network, &secret_key(7))?,
        "--timelock-block-height",
        &height,
    ])?;
    assert_eq!(out["is_signed"], json!(false));
    let tx: Transaction =
        deserialize_hex(out["transaction"].as_str().context("transaction hex")?)?;
    assert!(tx.input[0].script_sig.is_empty());
    assert_eq!(tx.lock_time.to_consensus_u32(), TIMEOUT_BLOCK_HEIGHT);
    Ok(())
}

#[test]
fn detected_swaps_reads_an_empty_store() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let store = dir.path().join("swaps.sqlite3");
    let store = store.to_str().context("utf-8 path")?;

    let out = run_json(&["detected-swaps", "--store-path", store, "--id", &"ab".repeat(32)])?;
    assert_eq!(out["funding"], json!([]));
    assert_eq!(out["claim"], json!([]));
    assert_eq!(out["refund"], json!([]));
    Ok(())
}

#[test]
fn rejects_unknown_network_and_bad_scripts() -> Result<()> {
    swap_cli()?
        .args(["--network", "dogecoin", "decode-script", "--script", "00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse network"));

    swap_cli()?
        .args(["decode-script", "--script", "0014751e76e8199196d454941c45d1b3a323f1433bd6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("decode swap script"));
    Ok(())
}
