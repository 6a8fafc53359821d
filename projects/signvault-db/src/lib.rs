pub mod database;
pub mod errors;
pub mod migrations;
pub mod types;

// Re-export main types and the database
pub use database::Database;
pub use errors::DatabaseError;
pub use types::*;

use std::path::PathBuf;

/// Initialize the database and return a Database instance
pub async fn init_database() -> anyhow::Result<Database> {
    Database::new().await.map_err(Into::into)
}

/// Get the default database path
pub fn get_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".signvault")
        .join("signvault.db")
}

/// Check if the database file exists
pub fn database_exists() -> bool {
    get_database_path().exists()
}
