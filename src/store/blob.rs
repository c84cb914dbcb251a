use super::schema::LocalBlobEntry;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// File name of the cache database inside the cache directory.
pub const DB_FILE: &str = "doclens.db";

/// Keyed store of document bytes. `doc_id` is the uniqueness key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Insert or overwrite the entry for `entry.doc_id`. Atomic per key.
    async fn put(&self, entry: LocalBlobEntry) -> Result<()>;

    async fn get(&self, doc_id: &str) -> Result<Option<LocalBlobEntry>>;

    /// Remove the entry. Deleting an absent key is not an error.
    async fn delete(&self, doc_id: &str) -> Result<()>;

    async fn contains(&self, doc_id: &str) -> Result<bool>;
}

/// SQLite-backed blob store.
pub struct SqliteBlobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBlobStore {
    pub fn open(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        let conn = Connection::open(cache_dir.join(DB_FILE))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA temp_store   = MEMORY;",
        )?;

        Self::init_schema(&conn)?;
        debug!(path = %cache_dir.display(), "opened blob store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blobs (
                doc_id       TEXT PRIMARY KEY,
                filename     TEXT NOT NULL,
                blob         BLOB NOT NULL,
                upload_date  TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await?
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LocalBlobEntry> {
        let raw_date: String = row.get(3)?;
        let upload_date = DateTime::parse_from_rfc3339(&raw_date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?;
        Ok(LocalBlobEntry {
            doc_id: row.get(0)?,
            filename: row.get(1)?,
            blob: row.get(2)?,
            upload_date,
        })
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn put(&self, entry: LocalBlobEntry) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO blobs (doc_id, filename, blob, upload_date)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(doc_id) DO UPDATE SET
                    filename = excluded.filename,
                    blob = excluded.blob,
                    upload_date = excluded.upload_date",
                params![
                    entry.doc_id,
                    entry.filename,
                    entry.blob,
                    entry.upload_date.to_rfc3339(),
                ],
            )?;
            info!(doc_id = %entry.doc_id, bytes = entry.blob.len(), "cached document bytes");
            Ok(())
        })
        .await
    }

    async fn get(&self, doc_id: &str) -> Result<Option<LocalBlobEntry>> {
        let doc_id = doc_id.to_string();
        self.with_conn(move |conn| {
            let entry = conn
                .query_row(
                    "SELECT doc_id, filename, blob, upload_date FROM blobs WHERE doc_id = ?1",
                    params![doc_id],
                    Self::row_to_entry,
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        let doc_id = doc_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM blobs WHERE doc_id = ?1", params![doc_id])?;
            if removed > 0 {
                info!(doc_id = %doc_id, "evicted cached document bytes");
            }
            Ok(())
        })
        .await
    }

    async fn contains(&self, doc_id: &str) -> Result<bool> {
        let doc_id = doc_id.to_string();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM blobs WHERE doc_id = ?1",
                    params![doc_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}
