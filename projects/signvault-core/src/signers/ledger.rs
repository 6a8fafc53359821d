//! Ledger device family driver
//!
//! Ledger-class devices sign raw RLP payloads for EVM chains; the UTXO
//! flow goes through the simplified single-output payload.

use crate::chains::{bitcoin, ethereum, Chain};
use crate::config::ChainDefaults;
use crate::errors::{Result, WalletError};
use crate::signers::{
    ExternalSigner, PayloadEncoding, PreparedSigningData, SignatureVerifier,
};
use crate::transaction::{SignedTransaction, TransactionData};
use std::sync::Arc;

const SUPPORTED_CHAINS: &[Chain] = &[Chain::Ethereum, Chain::Polygon, Chain::Bsc, Chain::Bitcoin];

pub struct LedgerSigner {
    defaults: Arc<ChainDefaults>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl LedgerSigner {
    pub fn new(defaults: Arc<ChainDefaults>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        LedgerSigner { defaults, verifier }
    }

    fn ensure_supported(&self, chain: Chain) -> Result<()> {
        if !self.supports_chain(chain) {
            return Err(WalletError::UnsupportedChain(format!(
                "Ledger devices do not support {}",
                chain
            )));
        }
        Ok(())
    }

    fn evm_params(&self, tx: &TransactionData) -> Result<ethereum::EvmTxParams> {
        ethereum::EvmTxParams::from_transaction(tx, &self.defaults)
            .map_err(|e| WalletError::InvalidTransaction(e.to_string()))
    }
}

impl ExternalSigner for LedgerSigner {
    fn supported_chains(&self) -> &[Chain] {
        SUPPORTED_CHAINS
    }

    fn prepare_for_signing(&self, tx: &TransactionData) -> Result<PreparedSigningData> {
        self.ensure_supported(tx.chain)?;

        if tx.chain.is_evm() {
            let params = self.evm_params(tx)?;
            let raw = ethereum::encode_unsigned(&params);
            log::debug!(
                "Prepared {} byte RLP payload for {} transfer",
                raw.len(),
                tx.chain
            );
            Ok(PreparedSigningData {
                raw_data: format!("0x{}", hex::encode(&raw)),
                display_data: ethereum::display_data(tx, &params),
                encoding: PayloadEncoding::Rlp,
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
        // Ledger returns the strict 65-byte compact layout for EVM chains
        if tx.chain.is_evm() && ethereum::parse_compact_signature(signature).is_err() {
            return false;
        }
        self.verifier.verify(tx, signature, public_key)
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
            let sig = ethereum::parse_compact_signature(signature)
                .map_err(|e| WalletError::MalformedSignature(e.to_string()))?;
            let raw = ethereum::encode_signed(&params, &sig);
            let hash = ethereum::transaction_hash(&raw);
            Ok(SignedTransaction::new(
                format!("0x{}", hex::encode(&raw)),
                hash,
                tx.clone(),
            ))
        } else {
            // UTXO asymmetry: the bridge returns the finished raw
            // transaction, not a bare signature
            let (raw, hash) = bitcoin::assemble_raw_transaction(signature)
                .map_err(|e| WalletError::MalformedSignature(e.to_string()))?;
            Ok(SignedTransaction::new(raw, hash, tx.clone()))
        }
    }

    fn confirmation_steps(&self) -> Vec<String> {
        vec![
            "Connect your Ledger device and unlock it with your PIN".to_string(),
            "Open the app for the transaction's chain".to_string(),
            "Review the recipient and amount on the device screen".to_string(),
            "Press both buttons to approve the transaction".to_string(),
        ]
    }
}
