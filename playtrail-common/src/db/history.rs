//! `history` table operations
//!
//! Plain persistence: no business logic lives here. Deciding when to insert,
//! update or finalize is the tracker's job.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};

use crate::db::models::{NewPlayRecord, PlayRecord};
use crate::time::{parse_db_timestamp, to_db_timestamp};
use crate::Result;

const SELECT_COLUMNS: &str =
    "SELECT id, artist1, artist2, artist3, track_name, played_at, progress, duration FROM history";

fn row_to_record(row: &SqliteRow) -> Result<PlayRecord> {
    let played_at: String = row.try_get("played_at")?;
    Ok(PlayRecord {
        id: row.try_get("id")?,
        artist1: row.try_get("artist1")?,
        artist2: row.try_get("artist2")?,
        artist3: row.try_get("artist3")?,
        track_name: row.try_get("track_name")?,
        played_at: parse_db_timestamp(&played_at)?,
        progress_ms: row.try_get("progress")?,
        duration_ms: row.try_get("duration")?,
    })
}

/// Most recently started play, if any
pub async fn latest_record(pool: &SqlitePool) -> Result<Option<PlayRecord>> {
    let row = sqlx::query(&format!(
        "{} ORDER BY played_at DESC, id DESC LIMIT 1",
        SELECT_COLUMNS
    ))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// Fetch one record by id
pub async fn get_record(pool: &SqlitePool, id: i64) -> Result<Option<PlayRecord>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// Most recent plays, newest first
pub async fn recent_records(pool: &SqlitePool, limit: i64) -> Result<Vec<PlayRecord>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY played_at DESC, id DESC LIMIT ?",
        SELECT_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_record).collect()
}

async fn insert_with<'e, E>(executor: E, record: &NewPlayRecord) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO history (artist1, artist2, artist3, track_name, played_at, progress, duration)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&record.artist1)
    .bind(&record.artist2)
    .bind(&record.artist3)
    .bind(&record.track_name)
    .bind(to_db_timestamp(&record.played_at))
    .bind(record.progress_ms)
    .bind(record.duration_ms)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

async fn finalize_with<'e, E>(executor: E, id: i64) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE history SET progress = duration WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Insert a new play and return its id
pub async fn insert_record(pool: &SqlitePool, record: &NewPlayRecord) -> Result<i64> {
    insert_with(pool, record).await
}

/// Record the latest known position of an open play
pub async fn update_progress(pool: &SqlitePool, id: i64, progress_ms: i64) -> Result<()> {
    sqlx::query("UPDATE history SET progress = ? WHERE id = ?")
        .bind(progress_ms)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Force a play's progress up to its full duration (idempotent)
pub async fn finalize_record(pool: &SqlitePool, id: i64) -> Result<()> {
    finalize_with(pool, id).await
}

/// Optionally finalize the previous play, then insert the next one, in one transaction
pub async fn supersede_record(
    pool: &SqlitePool,
    finalize: Option<i64>,
    record: &NewPlayRecord,
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    if let Some(prev_id) = finalize {
        finalize_with(&mut *tx, prev_id).await?;
    }
    let id = insert_with(&mut *tx, record).await?;

    tx.commit().await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(track: &str, minute: u32, progress_ms: i64) -> NewPlayRecord {
        NewPlayRecord::new(
            &["Artist".to_string()],
            track,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            progress_ms,
            200_000,
        )
    }

    #[tokio::test]
    async fn test_latest_record_empty() {
        let pool = init_memory_database().await.unwrap();
        assert!(latest_record(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_then_latest() {
        let pool = init_memory_database().await.unwrap();
        insert_record(&pool, &sample("First", 0, 1_000)).await.unwrap();
        let id = insert_record(&pool, &sample("Second", 5, 2_000)).await.unwrap();

        let latest = latest_record(&pool).await.unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.track_name, "Second");
        assert_eq!(latest.artist1, "Artist");
        assert_eq!(latest.progress_ms, 2_000);
        assert_eq!(latest.played_at, sample("Second", 5, 0).played_at);
    }

    #[tokio::test]
    async fn test_latest_orders_by_played_at_not_id() {
        let pool = init_memory_database().await.unwrap();
        insert_record(&pool, &sample("Later", 30, 0)).await.unwrap();
        insert_record(&pool, &sample("Earlier", 10, 0)).await.unwrap();

        let latest = latest_record(&pool).await.unwrap().unwrap();
        assert_eq!(latest.track_name, "Later");
    }

    #[tokio::test]
    async fn test_played_at_keeps_subsecond_precision() {
        let pool = init_memory_database().await.unwrap();
        let mut record = sample("Precise", 0, 0);
        record.played_at = record.played_at + Duration::microseconds(123_456);
        let id = insert_record(&pool, &record).await.unwrap();

        let stored = get_record(&pool, id).await.unwrap().unwrap();
        assert_eq!(stored.played_at, record.played_at);
    }

    #[tokio::test]
    async fn test_update_progress() {
        let pool = init_memory_database().await.unwrap();
        let id = insert_record(&pool, &sample("Song", 0, 1_000)).await.unwrap();

        update_progress(&pool, id, 61_000).await.unwrap();
        update_progress(&pool, id, 61_000).await.unwrap();

        let stored = get_record(&pool, id).await.unwrap().unwrap();
        assert_eq!(stored.progress_ms, 61_000);
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let id = insert_record(&pool, &sample("Song", 0, 198_000)).await.unwrap();

        finalize_record(&pool, id).await.unwrap();
        finalize_record(&pool, id).await.unwrap();

        let stored = get_record(&pool, id).await.unwrap().unwrap();
        assert_eq!(stored.progress_ms, 200_000);
        assert!(stored.is_finalized());
    }

    #[tokio::test]
    async fn test_supersede_finalizes_and_inserts() {
        let pool = init_memory_database().await.unwrap();
        let prev = insert_record(&pool, &sample("Song", 0, 197_500)).await.unwrap();

        let next = supersede_record(&pool, Some(prev), &sample("Song", 4, 500))
            .await
            .unwrap();

        let prev_row = get_record(&pool, prev).await.unwrap().unwrap();
        let next_row = get_record(&pool, next).await.unwrap().unwrap();
        assert_eq!(prev_row.progress_ms, 200_000);
        assert_eq!(next_row.progress_ms, 500);
    }

    #[tokio::test]
    async fn test_supersede_without_finalize_leaves_previous() {
        let pool = init_memory_database().await.unwrap();
        let prev = insert_record(&pool, &sample("Song", 0, 50_000)).await.unwrap();

        supersede_record(&pool, None, &sample("Other", 1, 0)).await.unwrap();

        let prev_row = get_record(&pool, prev).await.unwrap().unwrap();
        assert_eq!(prev_row.progress_ms, 50_000);
    }

    #[tokio::test]
    async fn test_supersede_rolls_back_finalize_when_insert_fails() {
        let pool = init_memory_database().await.unwrap();
        let prev = insert_record(&pool, &sample("Song", 0, 197_000)).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER reject_insert BEFORE INSERT ON history \
             BEGIN SELECT RAISE(ABORT, 'insert rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let result = supersede_record(&pool, Some(prev), &sample("Song", 4, 500)).await;
        assert!(result.is_err());

        let prev_row = get_record(&pool, prev).await.unwrap().unwrap();
        assert_eq!(prev_row.progress_ms, 197_000);
        assert_eq!(recent_records(&pool, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recent_records_newest_first() {
        let pool = init_memory_database().await.unwrap();
        for minute in 0..5 {
            insert_record(&pool, &sample(&format!("T{}", minute), minute, 0))
                .await
                .unwrap();
        }

        let recent = recent_records(&pool, 3).await.unwrap();
        let names: Vec<_> = recent.iter().map(|r| r.track_name.as_str()).collect();
        assert_eq!(names, vec!["T4", "T3", "T2"]);
    }
}
