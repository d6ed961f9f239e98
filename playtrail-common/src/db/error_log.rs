//! `error_log` table operations

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::db::models::ErrorLogEntry;
use crate::time::{parse_db_timestamp, to_db_timestamp};
use crate::Result;

/// Append a fault record and return its id
pub async fn insert_error(
    pool: &SqlitePool,
    date: &DateTime<Utc>,
    category: &str,
    description: &str,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO error_log (date, type, description) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(to_db_timestamp(date))
    .bind(category)
    .bind(description)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Most recent fault records, newest first
pub async fn recent_errors(pool: &SqlitePool, limit: i64) -> Result<Vec<ErrorLogEntry>> {
    let rows = sqlx::query(
        "SELECT id, date, type, description FROM error_log ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<ErrorLogEntry> {
            let date: String = row.try_get("date")?;
            Ok(ErrorLogEntry {
                id: row.try_get("id")?,
                date: parse_db_timestamp(&date)?,
                category: row.try_get("type")?,
                description: row.try_get("description")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_insert_returns_increasing_ids() {
        let pool = init_memory_database().await.unwrap();
        let now = Utc::now();

        let first = insert_error(&pool, &now, "429", "rate limited").await.unwrap();
        let second = insert_error(&pool, &now, "validation", "missing duration")
            .await
            .unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_recent_errors_round_trip() {
        let pool = init_memory_database().await.unwrap();
        let now = Utc::now();
        insert_error(&pool, &now, "persistence", "disk full").await.unwrap();

        let entries = recent_errors(&pool, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, "persistence");
        assert_eq!(entries[0].description, "disk full");
    }
}
