use signvault_db::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Unsupported device type: {0}")]
    UnsupportedDeviceType(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Request not processable: {0}")]
    NotProcessable(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Association not found: {0}")]
    AssociationNotFound(i64),

    #[error("Signing request not found: {0}")]
    RequestNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<DatabaseError> for WalletError {
    fn from(e: DatabaseError) -> Self {
        // Admission and state-machine outcomes surface under their own
        // names; everything else stays a storage error.
        match e {
            DatabaseError::LimitExceeded(msg) => WalletError::LimitExceeded(msg),
            DatabaseError::NotProcessable(msg) => WalletError::NotProcessable(msg),
            DatabaseError::AssociationNotFound(id) => WalletError::AssociationNotFound(id),
            DatabaseError::RequestNotFound(id) => WalletError::RequestNotFound(id),
            other => WalletError::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
