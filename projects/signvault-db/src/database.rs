use crate::errors::{DatabaseError, Result};
use crate::migrations::apply_migrations;
use crate::types::{
    NewAssociation, NewSigningRequest, RequestStatus, SigningRequest, WalletAssociation,
};
use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Main database manager
pub struct Database {
    connection: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Create a new database instance at the default path
    pub async fn new() -> Result<Self> {
        let path = crate::get_database_path();
        let db = Self::open_at_path(path).await?;
        Ok(db)
    }

    /// Create a database instance at a specific path
    pub async fn open_at_path(path: PathBuf) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        log::info!("Opening database at: {:?}", path);

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        if let Err(e) = apply_migrations(&conn) {
            log::error!("Failed to apply migrations: {}", e);
            return Err(e);
        }

        let db = Database {
            connection: Arc::new(Mutex::new(conn)),
            path,
        };

        log::info!("Database initialized successfully");
        Ok(db)
    }

    /// Create an in-memory database instance for testing
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        if let Err(e) = apply_migrations(&conn) {
            log::error!("Failed to apply migrations to in-memory database: {}", e);
            return Err(e);
        }

        Ok(Database {
            connection: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Health check - ensure database is accessible
    pub async fn health_check(&self) -> Result<()> {
        let conn = self.connection.lock().await;
        match conn.query_row("SELECT 1", [], |_| Ok(())) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("Health check failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Execute a closure with database connection
    pub async fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let conn = self.connection.lock().await;
        f(&conn)
    }

    /// Execute a transaction
    pub async fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let mut conn = self.connection.lock().await;
        let tx = conn.transaction()?;

        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Execute a transaction that takes the write lock up front.
    ///
    /// Count-then-insert admission checks must run here so two concurrent
    /// calls cannot both observe a free slot.
    pub async fn write_transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let mut conn = self.connection.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Get current UNIX timestamp
    pub fn current_timestamp() -> i64 {
        chrono::Utc::now().timestamp()
    }

    // ========== Association Methods ==========

    /// Insert an association, enforcing the per-user cap inside a single
    /// write-locked transaction.
    pub async fn insert_association(
        &self,
        new: &NewAssociation,
        max_per_user: usize,
    ) -> Result<WalletAssociation> {
        let now = Self::current_timestamp();
        let supported_chains = serde_json::to_string(&new.supported_chains)?;
        let metadata = match &new.metadata {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };
        let new = new.clone();

        self.write_transaction(move |conn| {
            let active: i64 = conn.query_row(
                "SELECT COUNT(*) FROM wallet_associations WHERE user_id = ?1 AND is_active = TRUE",
                [&new.user_id],
                |row| row.get(0),
            )?;

            if active as usize >= max_per_user {
                return Err(DatabaseError::LimitExceeded(format!(
                    "user {} already has {} active associations (max {})",
                    new.user_id, active, max_per_user
                )));
            }

            conn.execute(
                "INSERT INTO wallet_associations (
                    user_id, device_type, device_id, device_label, firmware_version,
                    public_key, address, chain, derivation_path, supported_chains,
                    metadata, is_active, is_verified, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, TRUE, FALSE, ?12)",
                rusqlite::params![
                    new.user_id,
                    new.device_type,
                    new.device_id,
                    new.device_label,
                    new.firmware_version,
                    new.public_key,
                    new.address,
                    new.chain,
                    new.derivation_path,
                    supported_chains,
                    metadata,
                    now,
                ],
            )?;

            let id = conn.last_insert_rowid();
            log::info!("Registered association {} for user {}", id, new.user_id);
            query_association(conn, id)?.ok_or(DatabaseError::AssociationNotFound(id))
        })
        .await
    }

    /// Get an association by id
    pub async fn get_association(&self, id: i64) -> Result<Option<WalletAssociation>> {
        self.with_connection(move |conn| query_association(conn, id)).await
    }

    /// List active associations owned by a user
    pub async fn list_associations_for_user(&self, user_id: &str) -> Result<Vec<WalletAssociation>> {
        let user_id = user_id.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ASSOCIATION_COLUMNS} FROM wallet_associations
                 WHERE user_id = ?1 AND is_active = TRUE
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([&user_id], association_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    /// Count active associations for a user
    pub async fn count_active_associations(&self, user_id: &str) -> Result<usize> {
        let user_id = user_id.to_string();
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM wallet_associations WHERE user_id = ?1 AND is_active = TRUE",
                [&user_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    /// Mark an association as verified
    pub async fn set_association_verified(&self, id: i64) -> Result<()> {
        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE wallet_associations SET is_verified = TRUE WHERE id = ?1 AND is_active = TRUE",
                [id],
            )?;
            if updated == 0 {
                return Err(DatabaseError::AssociationNotFound(id));
            }
            log::info!("Association {} verified", id);
            Ok(())
        })
        .await
    }

    /// Update an association's last-used timestamp
    pub async fn touch_association_last_used(&self, id: i64) -> Result<()> {
        let now = Self::current_timestamp();
        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE wallet_associations SET last_used_at = ?1 WHERE id = ?2",
                rusqlite::params![now, id],
            )?;
            if updated == 0 {
                return Err(DatabaseError::AssociationNotFound(id));
            }
            Ok(())
        })
        .await
    }

    /// Soft-delete an association
    pub async fn deactivate_association(&self, id: i64) -> Result<()> {
        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE wallet_associations SET is_active = FALSE WHERE id = ?1",
                [id],
            )?;
            if updated == 0 {
                return Err(DatabaseError::AssociationNotFound(id));
            }
            log::info!("Association {} deactivated", id);
            Ok(())
        })
        .await
    }

    // ========== Signing Request Methods ==========

    /// Insert a signing request, enforcing the per-user open-request cap
    /// inside a single write-locked transaction.
    pub async fn insert_signing_request(
        &self,
        new: &NewSigningRequest,
        max_open_per_user: usize,
    ) -> Result<SigningRequest> {
        let now = Self::current_timestamp();
        let transaction_data = serde_json::to_string(&new.transaction_data)?;
        let metadata = serde_json::to_string(&new.metadata)?;
        let new = new.clone();

        self.write_transaction(move |conn| {
            let open: i64 = conn.query_row(
                "SELECT COUNT(*) FROM signing_requests
                 WHERE user_id = ?1 AND status IN ('pending', 'awaiting_device')",
                [&new.user_id],
                |row| row.get(0),
            )?;

            if open as usize >= max_open_per_user {
                return Err(DatabaseError::LimitExceeded(format!(
                    "user {} already has {} open signing requests (max {})",
                    new.user_id, open, max_open_per_user
                )));
            }

            conn.execute(
                "INSERT INTO signing_requests (
                    user_id, association_id, status, chain, transaction_data,
                    raw_data_to_sign, metadata, expires_at, created_at, updated_at
                ) VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    new.user_id,
                    new.association_id,
                    new.chain,
                    transaction_data,
                    new.raw_data_to_sign,
                    metadata,
                    new.expires_at,
                    now,
                ],
            )?;

            let id = conn.last_insert_rowid();
            log::info!("Created signing request {} for user {}", id, new.user_id);
            query_request(conn, id)?.ok_or(DatabaseError::RequestNotFound(id))
        })
        .await
    }

    /// Get a signing request by id
    pub async fn get_signing_request(&self, id: i64) -> Result<Option<SigningRequest>> {
        self.with_connection(move |conn| query_request(conn, id)).await
    }

    /// List signing requests tied to an association, newest first
    pub async fn list_requests_for_association(
        &self,
        association_id: i64,
    ) -> Result<Vec<SigningRequest>> {
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM signing_requests
                 WHERE association_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([association_id], request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    /// Count a user's requests in the open set
    pub async fn count_open_requests(&self, user_id: &str) -> Result<usize> {
        let user_id = user_id.to_string();
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM signing_requests
                 WHERE user_id = ?1 AND status IN ('pending', 'awaiting_device')",
                [&user_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    /// Note that a request has been handed to a connected device.
    /// Treated identically to `pending` for admission and expiry.
    pub async fn mark_awaiting_device(&self, id: i64) -> Result<SigningRequest> {
        let now = Self::current_timestamp();
        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE signing_requests SET status = 'awaiting_device', updated_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                rusqlite::params![now, id],
            )?;
            if updated == 0 {
                return Err(DatabaseError::NotProcessable(format!(
                    "request {} is not pending",
                    id
                )));
            }
            query_request(conn, id)?.ok_or(DatabaseError::RequestNotFound(id))
        })
        .await
    }

    /// Move an open, unexpired request to `signing`.
    ///
    /// The WHERE clause is the guard: a terminal, already-signing or
    /// already-expired row matches nothing and the call fails without
    /// touching state.
    pub async fn begin_signing(&self, id: i64, now: i64) -> Result<SigningRequest> {
        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE signing_requests SET status = 'signing', updated_at = ?1
                 WHERE id = ?2 AND status IN ('pending', 'awaiting_device') AND expires_at > ?1",
                rusqlite::params![now, id],
            )?;
            if updated == 0 {
                return match query_request(conn, id)? {
                    Some(req) => Err(DatabaseError::NotProcessable(format!(
                        "request {} is {} (expires_at {})",
                        id, req.status, req.expires_at
                    ))),
                    None => Err(DatabaseError::RequestNotFound(id)),
                };
            }
            query_request(conn, id)?.ok_or(DatabaseError::RequestNotFound(id))
        })
        .await
    }

    /// Record a successful signature on a request in `signing`
    pub async fn complete_request(
        &self,
        id: i64,
        signature: &str,
        public_key: &str,
        transaction_hash: &str,
    ) -> Result<SigningRequest> {
        let now = Self::current_timestamp();
        let signature = signature.to_string();
        let public_key = public_key.to_string();
        let transaction_hash = transaction_hash.to_string();

        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE signing_requests
                 SET status = 'completed', signature = ?1, public_key = ?2,
                     transaction_hash = ?3, updated_at = ?4
                 WHERE id = ?5 AND status = 'signing'",
                rusqlite::params![signature, public_key, transaction_hash, now, id],
            )?;
            if updated == 0 {
                return Err(DatabaseError::NotProcessable(format!(
                    "request {} is not in signing state",
                    id
                )));
            }
            query_request(conn, id)?.ok_or(DatabaseError::RequestNotFound(id))
        })
        .await
    }

    /// Record a failure on a non-terminal request
    pub async fn fail_request(&self, id: i64, error: &str) -> Result<SigningRequest> {
        let now = Self::current_timestamp();
        let error = error.to_string();

        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE signing_requests SET status = 'failed', error = ?1, updated_at = ?2
                 WHERE id = ?3 AND status IN ('pending', 'awaiting_device', 'signing')",
                rusqlite::params![error, now, id],
            )?;
            if updated == 0 {
                return Err(DatabaseError::NotProcessable(format!(
                    "request {} is already terminal",
                    id
                )));
            }
            query_request(conn, id)?.ok_or(DatabaseError::RequestNotFound(id))
        })
        .await
    }

    /// Cancel a request. Terminal requests (and unknown ids) are left
    /// untouched and reported as `false` - cancellation never errors.
    pub async fn cancel_request(&self, id: i64) -> Result<bool> {
        let now = Self::current_timestamp();
        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE signing_requests SET status = 'cancelled', updated_at = ?1
                 WHERE id = ?2 AND status NOT IN ('completed', 'failed', 'expired', 'cancelled')",
                rusqlite::params![now, id],
            )?;
            Ok(updated > 0)
        })
        .await
    }

    /// Cancel every non-terminal request tied to an association
    pub async fn cancel_requests_for_association(&self, association_id: i64) -> Result<usize> {
        let now = Self::current_timestamp();
        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE signing_requests SET status = 'cancelled', updated_at = ?1
                 WHERE association_id = ?2
                   AND status NOT IN ('completed', 'failed', 'expired', 'cancelled')",
                rusqlite::params![now, association_id],
            )?;
            Ok(updated)
        })
        .await
    }

    /// Sweep every open request past its deadline into `expired`.
    ///
    /// Idempotent: terminal rows never match, so a concurrent sweep or a
    /// repeat invocation is harmless.
    pub async fn expire_old_requests(&self, now: i64) -> Result<usize> {
        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE signing_requests SET status = 'expired', updated_at = ?1
                 WHERE status IN ('pending', 'awaiting_device') AND expires_at <= ?1",
                rusqlite::params![now],
            )?;
            if updated > 0 {
                log::info!("Expired {} stale signing requests", updated);
            }
            Ok(updated)
        })
        .await
    }
}

// ========== Row Mapping ==========

const ASSOCIATION_COLUMNS: &str = "id, user_id, device_type, device_id, device_label, \
    firmware_version, public_key, address, chain, derivation_path, supported_chains, \
    metadata, is_active, is_verified, last_used_at, created_at";

const REQUEST_COLUMNS: &str = "id, user_id, association_id, status, chain, \
    transaction_data, raw_data_to_sign, metadata, expires_at, created_at, updated_at, \
    signature, public_key, transaction_hash, error";

fn json_col<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn association_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WalletAssociation> {
    let metadata: Option<String> = row.get(11)?;
    let metadata = match metadata {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(WalletAssociation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        device_type: row.get(2)?,
        device_id: row.get(3)?,
        device_label: row.get(4)?,
        firmware_version: row.get(5)?,
        public_key: row.get(6)?,
        address: row.get(7)?,
        chain: row.get(8)?,
        derivation_path: row.get(9)?,
        supported_chains: json_col(row, 10)?,
        metadata,
        is_active: row.get(12)?,
        is_verified: row.get(13)?,
        last_used_at: row.get(14)?,
        created_at: row.get(15)?,
    })
}

fn request_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SigningRequest> {
    let status: String = row.get(3)?;
    let status = RequestStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown request status: {}", status).into(),
        )
    })?;

    Ok(SigningRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        association_id: row.get(2)?,
        status,
        chain: row.get(4)?,
        transaction_data: json_col(row, 5)?,
        raw_data_to_sign: row.get(6)?,
        metadata: json_col(row, 7)?,
        expires_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        signature: row.get(11)?,
        public_key: row.get(12)?,
        transaction_hash: row.get(13)?,
        error: row.get(14)?,
    })
}

fn query_association(conn: &Connection, id: i64) -> Result<Option<WalletAssociation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ASSOCIATION_COLUMNS} FROM wallet_associations WHERE id = ?1"
    ))?;
    Ok(stmt.query_row([id], association_from_row).optional()?)
}

fn query_request(conn: &Connection, id: i64) -> Result<Option<SigningRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM signing_requests WHERE id = ?1"
    ))?;
    Ok(stmt.query_row([id], request_from_row).optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_association(user_id: &str) -> NewAssociation {
        NewAssociation {
            user_id: user_id.to_string(),
            device_type: "ledger_nano_x".to_string(),
            device_id: "ledger-001".to_string(),
            device_label: Some("Main Ledger".to_string()),
            firmware_version: Some("2.1.0".to_string()),
            public_key: "04deadbeef".to_string(),
            address: "0x1111111111111111111111111111111111111111".to_string(),
            chain: "ethereum".to_string(),
            derivation_path: "m/44'/60'/0'/0/0".to_string(),
            supported_chains: vec![
                "ethereum".to_string(),
                "polygon".to_string(),
                "bsc".to_string(),
                "bitcoin".to_string(),
            ],
            metadata: None,
        }
    }

    fn sample_request(user_id: &str, association_id: i64, expires_at: i64) -> NewSigningRequest {
        NewSigningRequest {
            user_id: user_id.to_string(),
            association_id,
            chain: "ethereum".to_string(),
            transaction_data: serde_json::json!({"to": "0xabc", "value": "1000"}),
            raw_data_to_sign: "0xdeadbeef".to_string(),
            metadata: serde_json::json!({"encoding": "rlp"}),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_database_creation() {
        let _ = env_logger::try_init();
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::open_at_path(db_path).await.unwrap();
        assert!(db.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_association_limit_enforced() {
        let db = Database::new_in_memory().await.unwrap();

        for _ in 0..2 {
            db.insert_association(&sample_association("alice"), 2)
                .await
                .unwrap();
        }

        let err = db
            .insert_association(&sample_association("alice"), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::LimitExceeded(_)));

        // Deactivated rows free a slot
        db.deactivate_association(1).await.unwrap();
        db.insert_association(&sample_association("alice"), 2)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_open_request_limit_enforced() {
        let db = Database::new_in_memory().await.unwrap();
        let assoc = db
            .insert_association(&sample_association("bob"), 10)
            .await
            .unwrap();
        let deadline = Database::current_timestamp() + 300;

        for _ in 0..3 {
            db.insert_signing_request(&sample_request("bob", assoc.id, deadline), 3)
                .await
                .unwrap();
        }

        let err = db
            .insert_signing_request(&sample_request("bob", assoc.id, deadline), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::LimitExceeded(_)));
        assert_eq!(db.count_open_requests("bob").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_signing_transitions() {
        let db = Database::new_in_memory().await.unwrap();
        let assoc = db
            .insert_association(&sample_association("carol"), 10)
            .await
            .unwrap();
        let now = Database::current_timestamp();
        let req = db
            .insert_signing_request(&sample_request("carol", assoc.id, now + 300), 5)
            .await
            .unwrap();
        assert_eq!(req.status, RequestStatus::Pending);

        let req = db.begin_signing(req.id, now).await.unwrap();
        assert_eq!(req.status, RequestStatus::Signing);

        // A second begin_signing must not double-transition
        let err = db.begin_signing(req.id, now).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotProcessable(_)));

        let req = db
            .complete_request(req.id, "0xsig", "0xpub", "0xhash")
            .await
            .unwrap();
        assert_eq!(req.status, RequestStatus::Completed);
        assert_eq!(req.signature.as_deref(), Some("0xsig"));
        assert_eq!(req.transaction_hash.as_deref(), Some("0xhash"));
    }

    #[tokio::test]
    async fn test_begin_signing_rejects_expired() {
        let db = Database::new_in_memory().await.unwrap();
        let assoc = db
            .insert_association(&sample_association("dave"), 10)
            .await
            .unwrap();
        let now = Database::current_timestamp();
        let req = db
            .insert_signing_request(&sample_request("dave", assoc.id, now - 1), 5)
            .await
            .unwrap();

        // Past expires_at is rejected even before the sweep runs
        let err = db.begin_signing(req.id, now).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotProcessable(_)));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        let assoc = db
            .insert_association(&sample_association("erin"), 10)
            .await
            .unwrap();
        let now = Database::current_timestamp();
        let req = db
            .insert_signing_request(&sample_request("erin", assoc.id, now + 300), 5)
            .await
            .unwrap();

        assert!(db.cancel_request(req.id).await.unwrap());
        // Second cancel is a silent no-op
        assert!(!db.cancel_request(req.id).await.unwrap());
        // Unknown id is a silent no-op too
        assert!(!db.cancel_request(9999).await.unwrap());

        let req = db.get_signing_request(req.id).await.unwrap().unwrap();
        assert_eq!(req.status, RequestStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_expiry_sweep() {
        let db = Database::new_in_memory().await.unwrap();
        let assoc = db
            .insert_association(&sample_association("frank"), 10)
            .await
            .unwrap();
        let now = Database::current_timestamp();

        let stale = db
            .insert_signing_request(&sample_request("frank", assoc.id, now - 10), 5)
            .await
            .unwrap();
        let fresh = db
            .insert_signing_request(&sample_request("frank", assoc.id, now + 300), 5)
            .await
            .unwrap();

        // A completed request with a past deadline must be untouched
        let done = db
            .insert_signing_request(&sample_request("frank", assoc.id, now - 10), 5)
            .await
            .unwrap();
        db.begin_signing(done.id, now - 60).await.unwrap();
        db.complete_request(done.id, "0xsig", "0xpub", "0xhash")
            .await
            .unwrap();

        // Dispatched-but-unconfirmed requests are swept just like pending
        let dispatched = db
            .insert_signing_request(&sample_request("frank", assoc.id, now - 5), 5)
            .await
            .unwrap();
        db.mark_awaiting_device(dispatched.id).await.unwrap();

        assert_eq!(db.expire_old_requests(now).await.unwrap(), 2);
        // Second sweep finds nothing
        assert_eq!(db.expire_old_requests(now).await.unwrap(), 0);

        let stale = db.get_signing_request(stale.id).await.unwrap().unwrap();
        let fresh = db.get_signing_request(fresh.id).await.unwrap().unwrap();
        let done = db.get_signing_request(done.id).await.unwrap().unwrap();
        let dispatched = db.get_signing_request(dispatched.id).await.unwrap().unwrap();
        assert_eq!(stale.status, RequestStatus::Expired);
        assert_eq!(fresh.status, RequestStatus::Pending);
        assert_eq!(done.status, RequestStatus::Completed);
        assert_eq!(dispatched.status, RequestStatus::Expired);
    }
}
