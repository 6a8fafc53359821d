//! Trezor device family driver
//!
//! The Trezor bridge does its own wire encoding, so preparation emits a
//! JSON parameter map (field names preserved) instead of raw RLP. The
//! bridge is also looser about signature shape: either the compact hex
//! layout or a structured `{v, r, s}` object comes back, and both are
//! normalized before assembly.

use crate::chains::{bitcoin, ethereum, Chain};
use crate::config::ChainDefaults;
use crate::errors::{Result, WalletError};
use crate::signers::{
    ExternalSigner, PayloadEncoding, PreparedSigningData, SignatureVerifier,
};
use crate::transaction::{SignedTransaction, TransactionData};
use anyhow::{anyhow, bail, Context};
use std::sync::Arc;

const SUPPORTED_CHAINS: &[Chain] = &[Chain::Ethereum, Chain::Polygon, Chain::Bsc, Chain::Bitcoin];

pub struct TrezorSigner {
    defaults: Arc<ChainDefaults>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl TrezorSigner {
    pub fn new(defaults: Arc<ChainDefaults>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        TrezorSigner { defaults, verifier }
    }

    fn ensure_supported(&self, chain: Chain) -> Result<()> {
        if !self.supports_chain(chain) {
            return Err(WalletError::UnsupportedChain(format!(
                "Trezor devices do not support {}",
                chain
            )));
        }
        Ok(())
    }

    fn evm_params(&self, tx: &TransactionData) -> Result<ethereum::EvmTxParams> {
        ethereum::EvmTxParams::from_transaction(tx, &self.defaults)
            .map_err(|e| WalletError::InvalidTransaction(e.to_string()))
    }

    /// JSON parameter map the bridge encodes itself. Built from the
    /// normalized params so the signed values and the displayed values
    /// cannot drift.
    fn evm_param_map(&self, tx: &TransactionData, params: &ethereum::EvmTxParams) -> serde_json::Value {
        let mut map = serde_json::json!({
            "to": tx.to,
            "value": params.value.to_string(),
            "nonce": params.nonce,
            "gasLimit": params.gas_limit.to_string(),
            "chainId": params.chain_id,
        });
        match &params.fee {
            ethereum::FeeParams::Legacy { gas_price } => {
                map["gasPrice"] = gas_price.to_string().into();
            }
            ethereum::FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                map["maxFeePerGas"] = max_fee_per_gas.to_string().into();
                map["maxPriorityFeePerGas"] = max_priority_fee_per_gas.to_string().into();
            }
        }
        if !params.data.is_empty() {
            map["data"] = format!("0x{}", hex::encode(&params.data)).into();
        }
        map
    }
}

/// Accept either the 130-hex compact layout or a `{v, r, s}` object and
/// reduce both to the same components.
pub fn normalize_signature(signature: &str) -> anyhow::Result<ethereum::SignatureParts> {
    let trimmed = signature.trim();
    if !trimmed.starts_with('{') {
        return ethereum::parse_compact_signature(trimmed);
    }

    let object: serde_json::Value =
        serde_json::from_str(trimmed).context("signature object is not valid JSON")?;
    let r = field_bytes(&object, "r")?;
    let s = field_bytes(&object, "s")?;
    let v = match object.get("v") {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| anyhow!("v is not an unsigned integer"))?,
        Some(serde_json::Value::String(raw)) => {
            let stripped = raw.strip_prefix("0x").unwrap_or(raw);
            u64::from_str_radix(stripped, 16).context("v is not valid hex")?
        }
        _ => bail!("signature object is missing v"),
    };
    if v > u8::MAX as u64 {
        bail!("v out of range: {}", v);
    }

    Ok(ethereum::SignatureParts { r, s, v: v as u8 })
}

// 32-byte left-padded component from an "r"/"s" field
fn field_bytes(object: &serde_json::Value, key: &str) -> anyhow::Result<Vec<u8>> {
    let raw = object
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("signature object is missing {}", key))?;
    let bytes = ethereum::decode_hex(raw).with_context(|| format!("{} is not valid hex", key))?;
    if bytes.is_empty() || bytes.len() > 32 {
        bail!("{} must be 1..=32 bytes, got {}", key, bytes.len());
    }
    let mut padded = vec![0u8; 32 - bytes.len()];
    padded.extend_from_slice(&bytes);
    Ok(padded)
}

impl ExternalSigner for TrezorSigner {
    fn supported_chains(&self) -> &[Chain] {
        SUPPORTED_CHAINS
    }

    fn prepare_for_signing(&self, tx: &TransactionData) -> Result<PreparedSigningData> {
        self.ensure_supported(tx.chain)?;

        if tx.chain.is_evm() {
            let params = self.evm_params(tx)?;
            let payload = serde_json::to_vec(&self.evm_param_map(tx, &params))?;
            Ok(PreparedSigningData {
                raw_data: format!("0x{}", hex::encode(&payload)),
                display_data: ethereum::display_data(tx, &params),
                encoding: PayloadEncoding::Json,
            })
        } else {
            let payload = bitcoin::encode_unsigned(tx)
                .map_err(|e| WalletError::InvalidTransaction(e.to_string()))?;
            Ok(PreparedSigningData {
                raw_data: format!("0x{}", hex::encode(&payload)),
                display_data: bitcoin::display_data(tx)
                    .map_err(|e| WalletError::InvalidTransaction(e.to_string()))?,
                encoding: PayloadEncoding::Utxo,
            })
        }
    }

    fn validate_signature(&self, tx: &TransactionData, signature: &str, public_key: &str) -> bool {
        if signature.is_empty() || public_key.is_empty() {
            return false;
        }
        if tx.chain.is_evm() {
            // Permissive intake, strict components
            match normalize_signature(signature) {
                Ok(parts) => self.verifier.verify(tx, &parts.to_compact_hex(), public_key),
                Err(_) => false,
            }
        } else {
            self.verifier.verify(tx, signature, public_key)
        }
    }

    fn construct_signed_transaction(
        &self,
        tx: &TransactionData,
        signature: &str,
        _public_key: &str,
    ) -> Result<SignedTransaction> {
        self.ensure_supported(tx.chain)?;

        if tx.chain.is_evm() {
            let params = self.evm_params(tx)?;
            let sig = normalize_signature(signature)
                .map_err(|e| WalletError::MalformedSignature(e.to_string()))?;
            let raw = ethereum::encode_signed(&params, &sig);
            let hash = ethereum::transaction_hash(&raw);
            Ok(SignedTransaction::new(
                format!("0x{}", hex::encode(&raw)),
                hash,
                tx.clone(),
            ))
        } else {
            let (raw, hash) = bitcoin::assemble_raw_transaction(signature)
                .map_err(|e| WalletError::MalformedSignature(e.to_string()))?;
            Ok(SignedTransaction::new(raw, hash, tx.clone()))
        }
    }

    fn confirmation_steps(&self) -> Vec<String> {
        vec![
            "Connect your Trezor and enter your PIN".to_string(),
            "Check the transaction details on the device screen".to_string(),
            "Hold the button to confirm the transaction".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signers::StructuralVerifier;

    fn signer() -> TrezorSigner {
        TrezorSigner::new(
            Arc::new(ChainDefaults::default()),
            Arc::new(StructuralVerifier),
        )
    }

    fn eth_tx() -> TransactionData {
        TransactionData::transfer(
            Chain::Ethereum,
            "0x1111111111111111111111111111111111111111",
            "0x0000000000000000000000000000000000000abc",
            "1000000000000000000",
        )
    }

    fn compact_sig() -> String {
        format!("0x{}{}{}", "11".repeat(32), "22".repeat(32), "1b")
    }

    fn object_sig() -> String {
        serde_json::json!({
            "v": 27,
            "r": format!("0x{}", "11".repeat(32)),
            "s": format!("0x{}", "22".repeat(32)),
        })
        .to_string()
    }

    #[test]
    fn test_prepare_emits_json_param_map() {
        let prepared = signer().prepare_for_signing(&eth_tx()).unwrap();
        assert_eq!(prepared.encoding, PayloadEncoding::Json);

        let payload = ethereum::decode_hex(&prepared.raw_data).unwrap();
        let map: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(map["to"], "0x0000000000000000000000000000000000000abc");
        assert_eq!(map["value"], "1000000000000000000");
        assert_eq!(map["chainId"], 1);
        assert_eq!(map["gasLimit"], "21000");
        assert_eq!(map["gasPrice"], "1000000000");
    }

    #[test]
    fn test_normalize_accepts_both_layouts() {
        let from_compact = normalize_signature(&compact_sig()).unwrap();
        let from_object = normalize_signature(&object_sig()).unwrap();
        assert_eq!(from_compact, from_object);
    }

    #[test]
    fn test_normalize_pads_short_components() {
        let sig = serde_json::json!({"v": 28, "r": "0x11", "s": "0x22"}).to_string();
        let parts = normalize_signature(&sig).unwrap();
        assert_eq!(parts.r[31], 0x11);
        assert_eq!(&parts.r[..31], &[0u8; 31][..]);
        assert_eq!(parts.v, 28);
    }

    #[test]
    fn test_normalize_rejects_incomplete_objects() {
        assert!(normalize_signature(r#"{"v": 27, "r": "0x11"}"#).is_err());
        assert!(normalize_signature(r#"{"r": "0x11", "s": "0x22"}"#).is_err());
        assert!(normalize_signature("{not json").is_err());
    }

    #[test]
    fn test_both_layouts_assemble_identically() {
        let signer = signer();
        let key = format!("0x{}", "cd".repeat(33));

        let a = signer
            .construct_signed_transaction(&eth_tx(), &compact_sig(), &key)
            .unwrap();
        let b = signer
            .construct_signed_transaction(&eth_tx(), &object_sig(), &key)
            .unwrap();
        assert_eq!(a.raw_transaction(), b.raw_transaction());
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_validate_accepts_object_layout() {
        let signer = signer();
        let key = format!("0x{}", "cd".repeat(33));
        assert!(signer.validate_signature(&eth_tx(), &object_sig(), &key));
        assert!(signer.validate_signature(&eth_tx(), &compact_sig(), &key));
        assert!(!signer.validate_signature(&eth_tx(), "", &key));
        assert!(!signer.validate_signature(&eth_tx(), r#"{"v": 27}"#, &key));
    }
}
