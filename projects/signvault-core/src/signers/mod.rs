//! External signer drivers for SignVault
//!
//! Each device family implements [`ExternalSigner`]: payload preparation,
//! signature validation and final assembly. Nothing here touches a
//! physical device - callers relay bytes to hardware out of band and hand
//! the resulting signature back to the orchestrator.

pub mod ledger;
pub mod mock;
pub mod trezor;

pub use ledger::LedgerSigner;
pub use mock::{MockSigner, SigningCall};
pub use trezor::TrezorSigner;

use crate::chains::{ethereum, Chain};
use crate::config::ChainDefaults;
use crate::errors::Result;
use crate::transaction::{SignedTransaction, TransactionData};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ========== Device Types ==========

/// Concrete device models the subsystem accepts at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    LedgerNanoS,
    LedgerNanoX,
    TrezorOne,
    TrezorModelT,
    Mock,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::LedgerNanoS => "ledger_nano_s",
            DeviceType::LedgerNanoX => "ledger_nano_x",
            DeviceType::TrezorOne => "trezor_one",
            DeviceType::TrezorModelT => "trezor_model_t",
            DeviceType::Mock => "mock",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ledger_nano_s" => Some(DeviceType::LedgerNanoS),
            "ledger_nano_x" => Some(DeviceType::LedgerNanoX),
            "trezor_one" => Some(DeviceType::TrezorOne),
            "trezor_model_t" => Some(DeviceType::TrezorModelT),
            "mock" => Some(DeviceType::Mock),
            _ => None,
        }
    }

    pub fn family(&self) -> SignerFamily {
        match self {
            DeviceType::LedgerNanoS | DeviceType::LedgerNanoX => SignerFamily::Ledger,
            DeviceType::TrezorOne | DeviceType::TrezorModelT => SignerFamily::Trezor,
            DeviceType::Mock => SignerFamily::Mock,
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signer families a device model maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerFamily {
    Ledger,
    Trezor,
    Mock,
}

// ========== Prepared Payloads ==========

/// Wire encoding of a prepared payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Rlp,
    Json,
    Utxo,
    Mock,
}

impl PayloadEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadEncoding::Rlp => "rlp",
            PayloadEncoding::Json => "json",
            PayloadEncoding::Utxo => "utxo",
            PayloadEncoding::Mock => "mock",
        }
    }
}

/// Output of `prepare_for_signing`: the exact bytes to sign plus a
/// human-readable projection for the confirmation screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSigningData {
    /// Hex payload, `0x`-prefixed - what the device actually signs
    pub raw_data: String,
    /// What the user confirms. Must never show more precision than the
    /// raw payload carries.
    pub display_data: serde_json::Value,
    pub encoding: PayloadEncoding,
}

// ========== Signature Verification ==========

/// Pluggable signature check strategy.
///
/// The shipped implementation is structural only (lengths and hex shape,
/// no curve math) - prototype-grade by design. A production deployment
/// swaps in an ecrecover-based verifier here without touching the state
/// machine.
pub trait SignatureVerifier: Send + Sync {
    /// `signature` arrives normalized to the compact hex layout by the
    /// calling driver.
    fn verify(&self, tx: &TransactionData, signature: &str, public_key: &str) -> bool;
}

/// Structural well-formedness checks only
pub struct StructuralVerifier;

impl SignatureVerifier for StructuralVerifier {
    fn verify(&self, tx: &TransactionData, signature: &str, public_key: &str) -> bool {
        if signature.is_empty() || public_key.is_empty() {
            return false;
        }
        let key = public_key.strip_prefix("0x").unwrap_or(public_key);
        if key.len() < 64 || hex::decode(key).is_err() {
            return false;
        }
        if tx.chain.is_evm() {
            return ethereum::parse_compact_signature(signature).is_ok();
        }
        // UTXO flow: the "signature" is a complete raw transaction
        match ethereum::decode_hex(signature) {
            Ok(bytes) => !bytes.is_empty(),
            Err(_) => false,
        }
    }
}

// ========== Capability Interface ==========

/// Capability interface implemented by each device family.
pub trait ExternalSigner: Send + Sync {
    /// Chains this device family can sign for
    fn supported_chains(&self) -> &[Chain];

    fn supports_chain(&self, chain: Chain) -> bool {
        self.supported_chains().contains(&chain)
    }

    /// Build the exact payload the device must sign, plus its display
    /// projection. Fails with `UnsupportedChain` for foreign chains.
    fn prepare_for_signing(&self, tx: &TransactionData) -> Result<PreparedSigningData>;

    /// Structural validation of a returned signature. Empty inputs are
    /// rejected outright.
    fn validate_signature(&self, tx: &TransactionData, signature: &str, public_key: &str) -> bool;

    /// Assemble the broadcast-ready transaction from the device's
    /// signature.
    fn construct_signed_transaction(
        &self,
        tx: &TransactionData,
        signature: &str,
        public_key: &str,
    ) -> Result<SignedTransaction>;

    /// BIP44 path for the chain's coin type
    fn derivation_path(&self, chain: Chain, account_index: u32) -> String {
        format!("m/44'/{}'/0'/0/{}", chain.coin_type(), account_index)
    }

    /// Ordered instructions walking the user through confirmation
    fn confirmation_steps(&self) -> Vec<String>;
}

// ========== Family Dispatch ==========

/// Resolves a stored device type to its signer driver. Built once at
/// orchestrator construction; tests can inject their own drivers.
pub struct SignerRegistry {
    ledger: Arc<dyn ExternalSigner>,
    trezor: Arc<dyn ExternalSigner>,
    mock: Arc<dyn ExternalSigner>,
}

impl SignerRegistry {
    pub fn with_defaults(defaults: ChainDefaults) -> Self {
        let verifier: Arc<dyn SignatureVerifier> = Arc::new(StructuralVerifier);
        let defaults = Arc::new(defaults);
        SignerRegistry {
            ledger: Arc::new(LedgerSigner::new(defaults.clone(), verifier.clone())),
            trezor: Arc::new(TrezorSigner::new(defaults, verifier)),
            mock: Arc::new(MockSigner::new()),
        }
    }

    pub fn new(
        ledger: Arc<dyn ExternalSigner>,
        trezor: Arc<dyn ExternalSigner>,
        mock: Arc<dyn ExternalSigner>,
    ) -> Self {
        SignerRegistry {
            ledger,
            trezor,
            mock,
        }
    }

    /// The one place device families map to drivers.
    pub fn resolve(&self, device_type: DeviceType) -> Arc<dyn ExternalSigner> {
        match device_type.family() {
            SignerFamily::Ledger => self.ledger.clone(),
            SignerFamily::Trezor => self.trezor.clone(),
            SignerFamily::Mock => self.mock.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_round_trip() {
        for device in [
            DeviceType::LedgerNanoS,
            DeviceType::LedgerNanoX,
            DeviceType::TrezorOne,
            DeviceType::TrezorModelT,
            DeviceType::Mock,
        ] {
            assert_eq!(DeviceType::parse(device.as_str()), Some(device));
        }
        assert_eq!(DeviceType::parse("ledger_stax"), None);
    }

    #[test]
    fn test_family_mapping() {
        assert_eq!(DeviceType::LedgerNanoS.family(), SignerFamily::Ledger);
        assert_eq!(DeviceType::LedgerNanoX.family(), SignerFamily::Ledger);
        assert_eq!(DeviceType::TrezorOne.family(), SignerFamily::Trezor);
        assert_eq!(DeviceType::TrezorModelT.family(), SignerFamily::Trezor);
        assert_eq!(DeviceType::Mock.family(), SignerFamily::Mock);
    }

    #[test]
    fn test_structural_verifier_rejects_junk() {
        let verifier = StructuralVerifier;
        let tx = crate::transaction::TransactionData::transfer(
            Chain::Ethereum,
            "0xaa",
            "0xbb",
            "1000",
        );
        let good = format!("0x{}", "ab".repeat(65));
        let key = format!("0x{}", "cd".repeat(33));

        assert!(verifier.verify(&tx, &good, &key));
        assert!(!verifier.verify(&tx, "", &key));
        assert!(!verifier.verify(&tx, &good, ""));
        assert!(!verifier.verify(&tx, "0xdeadbeef", &key));
        assert!(!verifier.verify(&tx, &good, "0x1234"));
    }

    #[test]
    fn test_default_derivation_paths() {
        let registry = SignerRegistry::with_defaults(ChainDefaults::default());
        let ledger = registry.resolve(DeviceType::LedgerNanoX);
        assert_eq!(ledger.derivation_path(Chain::Ethereum, 0), "m/44'/60'/0'/0/0");
        assert_eq!(ledger.derivation_path(Chain::Bitcoin, 2), "m/44'/0'/0'/0/2");
    }
}
