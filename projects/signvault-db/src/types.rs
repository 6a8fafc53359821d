use serde::{Deserialize, Serialize};

// ========== Association Types ==========

/// A durable binding of (user, device, chain, derivation path).
///
/// Rows are soft-deleted: `is_active` flips false, the row stays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAssociation {
    pub id: i64,
    pub user_id: String,
    pub device_type: String,
    pub device_id: String,
    pub device_label: Option<String>,
    pub firmware_version: Option<String>,
    pub public_key: String,
    pub address: String,
    pub chain: String,
    pub derivation_path: String,
    pub supported_chains: Vec<String>,
    pub metadata: Option<serde_json::Value>,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_used_at: Option<i64>,
    pub created_at: i64,
}

/// Input for creating an association row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssociation {
    pub user_id: String,
    pub device_type: String,
    pub device_id: String,
    pub device_label: Option<String>,
    pub firmware_version: Option<String>,
    pub public_key: String,
    pub address: String,
    pub chain: String,
    pub derivation_path: String,
    pub supported_chains: Vec<String>,
    pub metadata: Option<serde_json::Value>,
}

// ========== Signing Request Types ==========

/// Lifecycle of a signing request. `Completed`, `Failed`, `Expired` and
/// `Cancelled` are sinks; `Pending` and `AwaitingDevice` are the open set
/// counted for admission control and swept by expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    AwaitingDevice,
    Signing,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::AwaitingDevice => "awaiting_device",
            RequestStatus::Signing => "signing",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
            RequestStatus::Expired => "expired",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "awaiting_device" => Some(RequestStatus::AwaitingDevice),
            "signing" => Some(RequestStatus::Signing),
            "completed" => Some(RequestStatus::Completed),
            "failed" => Some(RequestStatus::Failed),
            "expired" => Some(RequestStatus::Expired),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed
                | RequestStatus::Failed
                | RequestStatus::Expired
                | RequestStatus::Cancelled
        )
    }

    /// Open for admission-control counting and the expiry sweep.
    pub fn is_open(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::AwaitingDevice)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One signing attempt, from creation to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningRequest {
    pub id: i64,
    pub user_id: String,
    pub association_id: i64,
    pub status: RequestStatus,
    pub chain: String,
    /// Snapshot of the transaction as submitted.
    pub transaction_data: serde_json::Value,
    /// Exact payload the device must sign. Written once at creation,
    /// never recomputed.
    pub raw_data_to_sign: String,
    /// Encoding, display projection and device type.
    pub metadata: serde_json::Value,
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub signature: Option<String>,
    pub public_key: Option<String>,
    pub transaction_hash: Option<String>,
    pub error: Option<String>,
}

/// Input for creating a signing request row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSigningRequest {
    pub user_id: String,
    pub association_id: i64,
    pub chain: String,
    pub transaction_data: serde_json::Value,
    pub raw_data_to_sign: String,
    pub metadata: serde_json::Value,
    pub expires_at: i64,
}
