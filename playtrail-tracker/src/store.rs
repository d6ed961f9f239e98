//! History store contract consumed by the reconciler

use async_trait::async_trait;
use playtrail_common::db::{history, NewPlayRecord, PlayRecord};
use playtrail_common::Result;
use sqlx::SqlitePool;

/// Durable table of play records
///
/// Passive persistence only; the reconciler decides what to write.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn latest_record(&self) -> Result<Option<PlayRecord>>;

    async fn insert(&self, record: &NewPlayRecord) -> Result<i64>;

    async fn update_progress(&self, id: i64, progress_ms: i64) -> Result<()>;

    /// Set `progress = duration` (idempotent)
    async fn finalize(&self, id: i64) -> Result<()>;

    /// Optionally finalize `finalize`, then insert `record`
    ///
    /// Stores that can should do both atomically.
    async fn supersede(&self, finalize: Option<i64>, record: &NewPlayRecord) -> Result<i64> {
        if let Some(id) = finalize {
            self.finalize(id).await?;
        }
        self.insert(record).await
    }
}

/// [`HistoryStore`] on the SQLite `history` table
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn latest_record(&self) -> Result<Option<PlayRecord>> {
        history::latest_record(&self.pool).await
    }

    async fn insert(&self, record: &NewPlayRecord) -> Result<i64> {
        history::insert_record(&self.pool, record).await
    }

    async fn update_progress(&self, id: i64, progress_ms: i64) -> Result<()> {
        history::update_progress(&self.pool, id, progress_ms).await
    }

    async fn finalize(&self, id: i64) -> Result<()> {
        history::finalize_record(&self.pool, id).await
    }

    async fn supersede(&self, finalize: Option<i64>, record: &NewPlayRecord) -> Result<i64> {
        history::supersede_record(&self.pool, finalize, record).await
    }
}
