//! Hardware wallet orchestration
//!
//! `HardwareWalletManager` is the only entry point callers use: it
//! registers devices, creates and finalizes signing requests, routes to
//! the right signer driver by device type, enforces per-user limits and
//! emits lifecycle events. All device I/O happens outside: callers relay
//! the prepared payload to hardware and hand the signature back to
//! `submit_signature`.

use crate::chains::Chain;
use crate::config::ManagerConfig;
use crate::errors::{Result, WalletError};
use crate::events::{WalletEvent, WalletEventSink};
use crate::signers::{DeviceType, SignerRegistry};
use crate::transaction::{SignedTransaction, TransactionData};
use signvault_db::types::{NewAssociation, NewSigningRequest, SigningRequest, WalletAssociation};
use signvault_db::Database;
use std::sync::Arc;

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Caller-supplied description of a physical (or mock) device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub device_id: String,
    pub device_label: Option<String>,
    pub firmware_version: Option<String>,
    pub public_key: String,
    pub address: String,
    pub metadata: Option<serde_json::Value>,
}

pub struct HardwareWalletManager {
    db: Arc<Database>,
    config: ManagerConfig,
    signers: SignerRegistry,
    events: Arc<dyn WalletEventSink>,
}

impl HardwareWalletManager {
    pub fn new(db: Arc<Database>, config: ManagerConfig, events: Arc<dyn WalletEventSink>) -> Self {
        let signers = SignerRegistry::with_defaults(config.chain_defaults.clone());
        HardwareWalletManager {
            db,
            config,
            signers,
            events,
        }
    }

    /// Construct with caller-supplied drivers (tests inject mocks here)
    pub fn with_signers(
        db: Arc<Database>,
        config: ManagerConfig,
        signers: SignerRegistry,
        events: Arc<dyn WalletEventSink>,
    ) -> Self {
        HardwareWalletManager {
            db,
            config,
            signers,
            events,
        }
    }

    /// Register a device for a user on a chain.
    ///
    /// The association is persisted active and unverified; the per-user
    /// cap is enforced inside the insert's critical section.
    pub async fn register_device(
        &self,
        user_id: &str,
        device: &DeviceInfo,
        chain: Chain,
        derivation_path: Option<&str>,
    ) -> Result<WalletAssociation> {
        let signer = self.signers.resolve(device.device_type);
        if !signer.supports_chain(chain) {
            return Err(WalletError::InvalidDevice(format!(
                "{} does not support chain {}",
                device.device_type, chain
            )));
        }

        let derivation_path = match derivation_path {
            Some(path) => path.to_string(),
            None => signer.derivation_path(chain, 0),
        };
        let supported_chains: Vec<String> = signer
            .supported_chains()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();

        let association = self
            .db
            .insert_association(
                &NewAssociation {
                    user_id: user_id.to_string(),
                    device_type: device.device_type.as_str().to_string(),
                    device_id: device.device_id.clone(),
                    device_label: device.device_label.clone(),
                    firmware_version: device.firmware_version.clone(),
                    public_key: device.public_key.clone(),
                    address: device.address.clone(),
                    chain: chain.as_str().to_string(),
                    derivation_path,
                    supported_chains,
                    metadata: device.metadata.clone(),
                },
                self.config.max_associations_per_user,
            )
            .await?;

        log::info!(
            "Registered {} device for user {} on {}",
            device.device_type,
            user_id,
            chain
        );
        self.emit(WalletEvent::HardwareWalletConnected {
            association_id: association.id,
            user_id: association.user_id.clone(),
            device_type: association.device_type.clone(),
            device_id: association.device_id.clone(),
            public_key: association.public_key.clone(),
            address: association.address.clone(),
            chain: association.chain.clone(),
            derivation_path: association.derivation_path.clone(),
            supported_chains: association.supported_chains.clone(),
        })
        .await;

        Ok(association)
    }

    /// Mark an association verified. The challenge-response exchange
    /// itself happens at the device bridge, outside this subsystem.
    pub async fn verify_device(&self, association_id: i64) -> Result<WalletAssociation> {
        self.db.set_association_verified(association_id).await?;
        self.db
            .get_association(association_id)
            .await?
            .ok_or(WalletError::AssociationNotFound(association_id))
    }

    /// Cancel the association's outstanding requests, then soft-delete
    /// it. Returns how many requests were cancelled.
    pub async fn remove_association(&self, association_id: i64) -> Result<usize> {
        let association = self
            .db
            .get_association(association_id)
            .await?
            .ok_or(WalletError::AssociationNotFound(association_id))?;

        let cancelled = self
            .db
            .cancel_requests_for_association(association.id)
            .await?;
        self.db.deactivate_association(association.id).await?;

        log::info!(
            "Removed association {} ({} outstanding requests cancelled)",
            association.id,
            cancelled
        );
        Ok(cancelled)
    }

    /// Create a signing request: prepare the device payload once, stamp
    /// the deadline, persist as pending.
    pub async fn create_signing_request(
        &self,
        association_id: i64,
        tx: &TransactionData,
    ) -> Result<SigningRequest> {
        tx.validate()?;

        let association = self
            .db
            .get_association(association_id)
            .await?
            .ok_or(WalletError::AssociationNotFound(association_id))?;
        if !association.is_active {
            return Err(WalletError::InvalidDevice(format!(
                "association {} is inactive",
                association_id
            )));
        }

        let device_type = DeviceType::parse(&association.device_type)
            .ok_or_else(|| WalletError::UnsupportedDeviceType(association.device_type.clone()))?;
        let signer = self.signers.resolve(device_type);
        let prepared = signer.prepare_for_signing(tx)?;

        let expires_at = now_ts() + self.config.signing_request_ttl_seconds;
        let metadata = serde_json::json!({
            "encoding": prepared.encoding.as_str(),
            "displayData": prepared.display_data,
            "deviceType": device_type.as_str(),
        });

        let request = self
            .db
            .insert_signing_request(
                &NewSigningRequest {
                    user_id: association.user_id.clone(),
                    association_id: association.id,
                    chain: tx.chain.as_str().to_string(),
                    transaction_data: serde_json::to_value(tx)?,
                    raw_data_to_sign: prepared.raw_data,
                    metadata,
                    expires_at,
                },
                self.config.max_pending_requests_per_user,
            )
            .await?;

        self.emit(WalletEvent::HardwareWalletSigningRequested {
            request_id: request.id,
            association_id: request.association_id,
            user_id: request.user_id.clone(),
            chain: request.chain.clone(),
            transaction_data: request.transaction_data.clone(),
            raw_data_to_sign: request.raw_data_to_sign.clone(),
            expires_at: request.expires_at,
            metadata: request.metadata.clone(),
        })
        .await;

        Ok(request)
    }

    /// Finalize a signing request with the device's signature.
    ///
    /// Valid signature: the request completes and the assembled
    /// transaction is returned. Invalid signature or assembly failure:
    /// the request durably transitions to failed with the reason, the
    /// completion event carries the error, and the error is re-raised.
    pub async fn submit_signature(
        &self,
        request_id: i64,
        signature: &str,
        public_key: &str,
    ) -> Result<SignedTransaction> {
        let now = now_ts();
        // The guarded update rejects terminal and expired requests in one
        // step; stale completions lose even before the sweep runs
        let request = self.db.begin_signing(request_id, now).await?;

        // Resolution failures past this point must not strand the row in
        // `signing` - it is no longer in the open set the sweep covers
        let (association, signer, tx) = match self.resolve_submission(&request).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.record_failure(&request, &e.to_string()).await;
                return Err(e);
            }
        };

        if !signer.validate_signature(&tx, signature, public_key) {
            let reason = "signature validation failed";
            self.record_failure(&request, reason).await;
            return Err(WalletError::InvalidSignature(format!(
                "request {}: {}",
                request.id, reason
            )));
        }

        match signer.construct_signed_transaction(&tx, signature, public_key) {
            Ok(signed) => {
                self.db
                    .complete_request(request.id, signature, public_key, signed.hash())
                    .await?;
                self.db
                    .touch_association_last_used(association.id)
                    .await?;

                log::info!(
                    "Signing request {} completed, tx hash {}",
                    request.id,
                    signed.hash()
                );
                self.emit(WalletEvent::HardwareWalletSigningCompleted {
                    request_id: request.id,
                    association_id: request.association_id,
                    user_id: request.user_id.clone(),
                    chain: request.chain.clone(),
                    success: true,
                    signature: Some(signature.to_string()),
                    public_key: Some(public_key.to_string()),
                    transaction_hash: Some(signed.hash().to_string()),
                    error_message: None,
                })
                .await;

                Ok(signed)
            }
            Err(e) => {
                // The caller always sees a definitive failure: record it,
                // announce it, re-raise it
                self.record_failure(&request, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Note that the prepared payload reached a connected device.
    /// Informational only: `awaiting_device` behaves exactly like
    /// `pending` for limits, expiry and submission.
    pub async fn mark_request_dispatched(&self, request_id: i64) -> Result<SigningRequest> {
        Ok(self.db.mark_awaiting_device(request_id).await?)
    }

    /// Cancel a signing request. Terminal requests are left untouched -
    /// cancellation is deliberately idempotent and never errors.
    pub async fn cancel_signing_request(&self, request_id: i64) -> Result<bool> {
        let cancelled = self.db.cancel_request(request_id).await?;
        if cancelled {
            log::info!("Signing request {} cancelled", request_id);
        }
        Ok(cancelled)
    }

    /// Sweep expired requests. Safe to run concurrently with request
    /// creation and submission; meant for an external scheduler.
    pub async fn expire_old_requests(&self) -> Result<usize> {
        Ok(self.db.expire_old_requests(now_ts()).await?)
    }

    /// Chains a device type can sign for. Unknown device types yield an
    /// empty set - this is a UI discovery query, not a validation point.
    pub fn get_supported_chains(&self, device_type: &str) -> Vec<Chain> {
        match DeviceType::parse(device_type) {
            Some(device_type) => self
                .signers
                .resolve(device_type)
                .supported_chains()
                .to_vec(),
            None => Vec::new(),
        }
    }

    /// Confirmation walkthrough for a device type, empty for unknown
    pub fn get_confirmation_steps(&self, device_type: &str) -> Vec<String> {
        match DeviceType::parse(device_type) {
            Some(device_type) => self.signers.resolve(device_type).confirmation_steps(),
            None => Vec::new(),
        }
    }

    async fn resolve_submission(
        &self,
        request: &SigningRequest,
    ) -> Result<(
        WalletAssociation,
        Arc<dyn crate::signers::ExternalSigner>,
        TransactionData,
    )> {
        let association = self
            .db
            .get_association(request.association_id)
            .await?
            .ok_or(WalletError::AssociationNotFound(request.association_id))?;
        let device_type = DeviceType::parse(&association.device_type)
            .ok_or_else(|| WalletError::UnsupportedDeviceType(association.device_type.clone()))?;
        let signer = self.signers.resolve(device_type);
        let tx: TransactionData = serde_json::from_value(request.transaction_data.clone())?;
        Ok((association, signer, tx))
    }

    async fn record_failure(&self, request: &SigningRequest, reason: &str) {
        if let Err(e) = self.db.fail_request(request.id, reason).await {
            // Lost a race to another terminal transition; the first
            // recorded outcome stands
            log::warn!("Could not mark request {} failed: {}", request.id, e);
        }
        self.emit(WalletEvent::HardwareWalletSigningCompleted {
            request_id: request.id,
            association_id: request.association_id,
            user_id: request.user_id.clone(),
            chain: request.chain.clone(),
            success: false,
            signature: None,
            public_key: None,
            transaction_hash: None,
            error_message: Some(reason.to_string()),
        })
        .await;
    }

    async fn emit(&self, event: WalletEvent) {
        let name = event.name();
        if let Err(e) = self.events.publish(event).await {
            log::warn!("Failed to publish {}: {}", name, e);
        }
    }
}
