//! Relational identity store backed by the `uploads` table.
//!
//! Every query runs under its own deadline ([`SqlIdentityStore::query_timeout`]); two queries
//! issued by one registry operation get two independent budgets and are not wrapped in a
//! transaction. Connection-level failures and deadline expiry both surface as
//! `RegistryError::Timeout`, distinct from query errors such as constraint violations.

use super::IdentityStore;
use crate::{FileRecord, RegistryError, RegistryResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use stash_types::SafeFilename;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename VARCHAR(255) NOT NULL
)";

/// SQLite-based identity store.
#[derive(Debug)]
pub struct SqlIdentityStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqlIdentityStore {
    /// Connect to `database_url`, creating the database file if needed, and run migrations.
    pub async fn connect(database_url: &str, query_timeout: Duration) -> RegistryResult<Self> {
        let opts = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RegistryError::InvalidInput(format!("database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(query_timeout);

        let pool = SqlitePoolOptions::new()
            // One connection serializes writers and keeps `sqlite::memory:` databases alive
            // for the lifetime of the pool.
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(query_timeout)
            .connect_with(opts)
            .await
            .map_err(|e| RegistryError::from_sqlx("connect", e))?;

        let store = Self::from_pool(pool, query_timeout);
        store.migrate().await?;

        tracing::info!("connected identity store at {}", database_url);
        Ok(store)
    }

    /// Wrap an existing pool. The caller is responsible for running [`Self::migrate`].
    pub fn from_pool(pool: Pool<Sqlite>, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub async fn migrate(&self) -> RegistryResult<()> {
        self.bounded("migrate", sqlx::query(SCHEMA_SQL).execute(&self.pool))
            .await
            .map(|_| ())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    async fn bounded<T, F>(&self, operation: &'static str, query: F) -> RegistryResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RegistryError::from_sqlx(operation, e)),
            Err(_) => Err(RegistryError::Timeout {
                operation,
                reason: format!("no response within {:?}", self.query_timeout),
            }),
        }
    }
}

fn to_record((id, filename): (i64, String)) -> RegistryResult<FileRecord> {
    let safe = SafeFilename::sanitize(&filename).map_err(|e| RegistryError::CorruptRecord {
        id,
        reason: e.to_string(),
    })?;
    if safe.as_str() != filename {
        return Err(RegistryError::CorruptRecord {
            id,
            reason: format!("`{filename}` is not a plain base name"),
        });
    }
    Ok(FileRecord::new(id, safe))
}

#[async_trait]
impl IdentityStore for SqlIdentityStore {
    async fn register(&self, filename: &SafeFilename) -> RegistryResult<FileRecord> {
        let id: i64 = self
            .bounded(
                "insert upload",
                sqlx::query_scalar("INSERT INTO uploads (filename) VALUES (?) RETURNING id")
                    .bind(filename.as_str())
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(FileRecord::new(id, filename.clone()))
    }

    async fn lookup(&self, id: i64) -> RegistryResult<FileRecord> {
        let row: Option<(i64, String)> = self
            .bounded(
                "lookup upload",
                sqlx::query_as("SELECT id, filename FROM uploads WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        match row {
            Some(row) => to_record(row),
            None => Err(RegistryError::NotFound(format!("file id {id}"))),
        }
    }

    async fn list(&self) -> RegistryResult<Vec<FileRecord>> {
        let rows: Vec<(i64, String)> = self
            .bounded(
                "list uploads",
                sqlx::query_as("SELECT id, filename FROM uploads ORDER BY id")
                    .fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter().map(to_record).collect()
    }

    async fn unregister(&self, record: &FileRecord) -> RegistryResult<()> {
        let result = self
            .bounded(
                "delete upload",
                sqlx::query("DELETE FROM uploads WHERE id = ?")
                    .bind(record.id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(format!("file id {}", record.id)));
        }
        Ok(())
    }

    async fn count(&self) -> RegistryResult<u64> {
        let count: i64 = self
            .bounded(
                "count uploads",
                sqlx::query_scalar("SELECT COUNT(*) FROM uploads").fetch_one(&self.pool),
            )
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
