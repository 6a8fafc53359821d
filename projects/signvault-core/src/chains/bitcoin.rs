//! Bitcoin transaction payload support
//!
//! The simplified UTXO flow: this layer emits one output and no inputs
//! (input selection happens upstream), and the device bridge hands back a
//! complete raw transaction rather than a bare signature.

use crate::chains::ethereum::{decode_hex, format_amount};
use crate::transaction::TransactionData;
use anyhow::{bail, Context, Result};
use bitcoin::hashes::{sha256d, Hash};
use ethereum_types::U256;

/// Build the unsigned payload for a Bitcoin-like transfer: a single
/// output, inputs resolved upstream.
pub fn encode_unsigned(tx: &TransactionData) -> Result<Vec<u8>> {
    let value = parse_satoshis(&tx.value)?;
    let envelope = serde_json::json!({
        "inputs": [],
        "outputs": [
            {"address": tx.to, "value": value}
        ],
    });
    Ok(serde_json::to_vec(&envelope)?)
}

/// Human-readable projection of a Bitcoin transfer
pub fn display_data(tx: &TransactionData) -> Result<serde_json::Value> {
    let value = parse_satoshis(&tx.value)?;
    Ok(serde_json::json!({
        "chain": tx.chain.as_str(),
        "from": tx.from,
        "to": tx.to,
        "amount": format_amount(U256::from(value), 8, "BTC"),
    }))
}

/// Treat the device's "signature" as the finished raw transaction and
/// derive its txid with the double SHA-256.
///
/// Returns `(raw_transaction, hash)`, both display-encoded.
pub fn assemble_raw_transaction(signature: &str) -> Result<(String, String)> {
    let bytes = decode_hex(signature).context("raw transaction is not valid hex")?;
    if bytes.is_empty() {
        bail!("raw transaction is empty");
    }
    let txid = sha256d::Hash::hash(&bytes);
    Ok((format!("0x{}", hex::encode(&bytes)), txid.to_string()))
}

fn parse_satoshis(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .with_context(|| format!("invalid satoshi amount {:?}", raw))
}
