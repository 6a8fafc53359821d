use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Lifecycle notifications handed to an external pub/sub mechanism.
/// Delivery is fire-and-forget: failures are logged by the orchestrator
/// and never affect the signing flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum WalletEvent {
    #[serde(rename_all = "camelCase")]
    HardwareWalletConnected {
        association_id: i64,
        user_id: String,
        device_type: String,
        device_id: String,
        public_key: String,
        address: String,
        chain: String,
        derivation_path: String,
        supported_chains: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    HardwareWalletSigningRequested {
        request_id: i64,
        association_id: i64,
        user_id: String,
        chain: String,
        transaction_data: serde_json::Value,
        raw_data_to_sign: String,
        expires_at: i64,
        metadata: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    HardwareWalletSigningCompleted {
        request_id: i64,
        association_id: i64,
        user_id: String,
        chain: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        public_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transaction_hash: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

impl WalletEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WalletEvent::HardwareWalletConnected { .. } => "HardwareWalletConnected",
            WalletEvent::HardwareWalletSigningRequested { .. } => "HardwareWalletSigningRequested",
            WalletEvent::HardwareWalletSigningCompleted { .. } => "HardwareWalletSigningCompleted",
        }
    }
}

/// Where lifecycle events go. Implemented over whatever bus the host
/// application uses.
#[async_trait]
pub trait WalletEventSink: Send + Sync {
    async fn publish(&self, event: WalletEvent) -> anyhow::Result<()>;
}

/// Sink that drops everything
pub struct NullEventSink;

#[async_trait]
impl WalletEventSink for NullEventSink {
    async fn publish(&self, event: WalletEvent) -> anyhow::Result<()> {
        log::debug!("Dropping event {}", event.name());
        Ok(())
    }
}

/// Sink that records events for assertions
#[derive(Default)]
pub struct MemoryEventSink {
    events: std::sync::Mutex<Vec<WalletEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<WalletEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletEventSink for MemoryEventSink {
    async fn publish(&self, event: WalletEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_camel_case() {
        let event = WalletEvent::HardwareWalletSigningCompleted {
            request_id: 1,
            association_id: 2,
            user_id: "alice".to_string(),
            chain: "ethereum".to_string(),
            success: false,
            signature: None,
            public_key: None,
            transaction_hash: None,
            error_message: Some("signature validation failed".to_string()),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "HardwareWalletSigningCompleted");
        assert_eq!(json["requestId"], 1);
        assert_eq!(json["errorMessage"], "signature validation failed");
        assert!(json.get("signature").is_none());
    }
}
