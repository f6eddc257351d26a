//! SQLite implementation of the StateStore trait.
//!
//! This is the primary persistence backend for sync state. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use weft_agent_core::{Did, EndpointUrl, PendingRecord, RecordId, SyncDirection, Watermark, WatermarkKey};

use crate::error::{Result, StateError};
use crate::migration;
use crate::traits::StateStore;

/// SQLite-based state store.
///
/// Thread-safe via internal Mutex. All operations run on the blocking
/// thread pool to avoid stalling the async runtime.
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        // set_watermark is the commit point of a pass; its write must reach
        // disk before the call returns.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| StateError::Lock(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StateError::Task(e.to_string()))?
    }
}

/// Owned copy of a key's columns for moving into blocking closures.
#[derive(Clone)]
struct KeyColumns {
    did: String,
    endpoint: String,
    direction: i64,
}

impl From<&WatermarkKey> for KeyColumns {
    fn from(key: &WatermarkKey) -> Self {
        Self {
            did: key.did.as_str().to_string(),
            endpoint: key.endpoint.as_str().to_string(),
            direction: key.direction.to_u8() as i64,
        }
    }
}

impl From<&PendingRecord> for KeyColumns {
    fn from(record: &PendingRecord) -> Self {
        Self {
            did: record.did.as_str().to_string(),
            endpoint: record.endpoint.as_str().to_string(),
            direction: record.direction.to_u8() as i64,
        }
    }
}

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, i64, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn pending_from_columns(
    did: String,
    endpoint: String,
    direction: i64,
    record_id: Vec<u8>,
) -> Result<PendingRecord> {
    let did = Did::parse(did).map_err(|e| StateError::InvalidData(e.to_string()))?;
    let endpoint =
        EndpointUrl::parse(endpoint).map_err(|e| StateError::InvalidData(e.to_string()))?;
    let direction = SyncDirection::from_u8(direction as u8)
        .ok_or_else(|| StateError::InvalidData(format!("unknown direction code: {direction}")))?;
    let record_id = RecordId::try_from(record_id.as_slice())
        .map_err(|_| StateError::InvalidData("record_id is not 32 bytes".into()))?;
    Ok(PendingRecord {
        record_id,
        did,
        endpoint,
        direction,
    })
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get_watermark(&self, key: &WatermarkKey) -> Result<Option<Watermark>> {
        let k = KeyColumns::from(key);
        self.blocking(move |conn| {
            let cursor: Option<String> = conn
                .query_row(
                    "SELECT cursor FROM watermarks
                     WHERE did = ?1 AND endpoint = ?2 AND direction = ?3",
                    params![k.did, k.endpoint, k.direction],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(cursor.map(Watermark::new))
        })
        .await
    }

    async fn set_watermark(&self, key: &WatermarkKey, watermark: &Watermark) -> Result<()> {
        let k = KeyColumns::from(key);
        let cursor = watermark.as_str().to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO watermarks (did, endpoint, direction, cursor, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(did, endpoint, direction) DO UPDATE SET
                     cursor = excluded.cursor,
                     updated_at = excluded.updated_at",
                params![k.did, k.endpoint, k.direction, cursor, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn add_pending(&self, record: &PendingRecord) -> Result<()> {
        let k = KeyColumns::from(record);
        let record_id = record.record_id.as_bytes().to_vec();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO pending_records
                     (did, endpoint, direction, record_id, attempts, enqueued_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![k.did, k.endpoint, k.direction, record_id, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_pending(&self, record: &PendingRecord) -> Result<()> {
        let k = KeyColumns::from(record);
        let record_id = record.record_id.as_bytes().to_vec();
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM pending_records
                 WHERE did = ?1 AND endpoint = ?2 AND direction = ?3 AND record_id = ?4",
                params![k.did, k.endpoint, k.direction, record_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_pending(&self, key: &WatermarkKey) -> Result<Vec<PendingRecord>> {
        let k = KeyColumns::from(key);
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT did, endpoint, direction, record_id FROM pending_records
                 WHERE did = ?1 AND endpoint = ?2 AND direction = ?3
                 ORDER BY enqueued_at, record_id",
            )?;

            let rows = stmt
                .query_map(params![k.did, k.endpoint, k.direction], row_to_pending)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(did, endpoint, direction, record_id)| {
                    pending_from_columns(did, endpoint, direction, record_id)
                })
                .collect()
        })
        .await
    }

    async fn note_pending_attempt(&self, record: &PendingRecord) -> Result<u32> {
        let k = KeyColumns::from(record);
        let record_id = record.record_id.as_bytes().to_vec();
        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE pending_records SET attempts = attempts + 1
                 WHERE did = ?1 AND endpoint = ?2 AND direction = ?3 AND record_id = ?4",
                params![k.did, k.endpoint, k.direction, record_id],
            )?;
            if updated == 0 {
                return Ok(0);
            }
            let attempts: u32 = conn.query_row(
                "SELECT attempts FROM pending_records
                 WHERE did = ?1 AND endpoint = ?2 AND direction = ?3 AND record_id = ?4",
                params![k.did, k.endpoint, k.direction, record_id],
                |row| row.get(0),
            )?;
            Ok(attempts)
        })
        .await
    }

    async fn register_identity(&self, did: &Did) -> Result<()> {
        let did = did.as_str().to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO registered_identities (did, registered_at)
                 VALUES (?1, ?2)",
                params![did, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn deregister_identity(&self, did: &Did) -> Result<()> {
        let did = did.as_str().to_string();
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM registered_identities WHERE did = ?1",
                params![did],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_identities(&self) -> Result<Vec<Did>> {
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT did FROM registered_identities ORDER BY did")?;

            let dids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            dids.into_iter()
                .map(|d| Did::parse(d).map_err(|e| StateError::InvalidData(e.to_string())))
                .collect()
        })
        .await
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
