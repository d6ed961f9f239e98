//! Best-effort durable sink for fault records

use async_trait::async_trait;
use playtrail_common::db::error_log;
use playtrail_common::time;
use sqlx::SqlitePool;
use tracing::error;

#[async_trait]
pub trait ErrorReporter: Send + Sync {
    /// Record a fault; returns the record id, or `None` if the sink itself failed
    ///
    /// Must never fail outward.
    async fn log(&self, category: &str, message: &str) -> Option<i64>;
}

/// [`ErrorReporter`] writing to the `error_log` table
#[derive(Clone)]
pub struct ErrorLog {
    pool: SqlitePool,
}

impl ErrorLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ErrorReporter for ErrorLog {
    async fn log(&self, category: &str, message: &str) -> Option<i64> {
        match error_log::insert_error(&self.pool, &time::now(), category, message).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(
                    category = %category,
                    message = %message,
                    error = %e,
                    "Failed to write error log entry"
                );
                None
            }
        }
    }
}
