use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Association not found: {0}")]
    AssociationNotFound(i64),

    #[error("Signing request not found: {0}")]
    RequestNotFound(i64),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Request not processable: {0}")]
    NotProcessable(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
