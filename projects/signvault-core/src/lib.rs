//! SignVault core: hardware-wallet signing orchestration
//!
//! Registers externally-held signing devices, prepares device-specific
//! unsigned payloads, tracks each in-flight signing request through its
//! lifecycle and assembles the final signed transaction once a signature
//! comes back from the device. Private keys never enter this process.

pub mod chains;
pub mod config;
pub mod errors;
pub mod events;
pub mod manager;
pub mod signers;
pub mod transaction;

pub use chains::Chain;
pub use config::{ChainDefaults, ManagerConfig};
pub use errors::WalletError;
pub use events::{MemoryEventSink, NullEventSink, WalletEvent, WalletEventSink};
pub use manager::{DeviceInfo, HardwareWalletManager};
pub use signers::{
    DeviceType, ExternalSigner, MockSigner, PayloadEncoding, PreparedSigningData, SignerRegistry,
};
pub use transaction::{SignedTransaction, TransactionData};
