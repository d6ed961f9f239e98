//! Session reconciler
//!
//! Turns one [`PlaybackSnapshot`] per cycle into a write against the history
//! store: extend the open play, or start a new one (finalizing the previous
//! play first when it stopped within one sample of its end).
//!
//! No state is kept between cycles. The latest stored record is read fresh
//! every time, so a restart resumes exactly where the store left off.
//!
//! Identity is primary artist plus track name. Progress is clamped to the
//! track duration before it is stored or compared, so a provider reporting a
//! position past the end cannot push a record beyond its own length.

use chrono::{DateTime, Utc};
use playtrail_common::db::{NewPlayRecord, PlayRecord};
use playtrail_common::time::elapsed_ms;
use tracing::{debug, info};

use crate::normalizer::PlaybackSnapshot;
use crate::store::HistoryStore;

/// A play that stopped with less than this left is treated as played to the end
pub const FINALIZE_TOLERANCE_MS: i64 = 6_000;

/// Why a new record is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertReason {
    /// Nothing stored yet
    ColdStart,
    /// Same track again: progress went backwards or the play outlived the track
    Replay,
    TrackChange,
}

/// What one cycle writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The open play continues
    UpdateProgress { id: i64, progress_ms: i64 },
    /// Start a new play, finalizing `finalize` first if set
    Insert {
        reason: InsertReason,
        finalize: Option<i64>,
        record: NewPlayRecord,
    },
}

/// Result of an applied decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub decision: Decision,
    /// Id of the record that is now open
    pub record_id: i64,
}

fn same_identity(prev: &PlayRecord, cur: &PlaybackSnapshot) -> bool {
    prev.artist1 == cur.primary_artist() && prev.track_name == cur.track_name
}

fn finalize_target(prev: &PlayRecord) -> Option<i64> {
    (prev.remaining_ms() < FINALIZE_TOLERANCE_MS).then_some(prev.id)
}

/// Decide the write for `cur` given the latest stored play
///
/// `now` is the sample time; it becomes `played_at` of any new record.
pub fn decide(prev: Option<&PlayRecord>, cur: &PlaybackSnapshot, now: DateTime<Utc>) -> Decision {
    let progress_ms = cur.progress_ms.min(cur.duration_ms);
    let new_record = || {
        NewPlayRecord::new(
            &cur.artists,
            cur.track_name.clone(),
            now,
            progress_ms,
            cur.duration_ms,
        )
    };

    let Some(prev) = prev else {
        return Decision::Insert {
            reason: InsertReason::ColdStart,
            finalize: None,
            record: new_record(),
        };
    };

    if same_identity(prev, cur) {
        let elapsed = elapsed_ms(&prev.played_at, &now);
        if progress_ms >= prev.progress_ms && elapsed < prev.duration_ms {
            return Decision::UpdateProgress {
                id: prev.id,
                progress_ms,
            };
        }
        return Decision::Insert {
            reason: InsertReason::Replay,
            finalize: finalize_target(prev),
            record: new_record(),
        };
    }

    Decision::Insert {
        reason: InsertReason::TrackChange,
        finalize: finalize_target(prev),
        record: new_record(),
    }
}

/// Read the latest play, decide, and apply the decision
///
/// A store failure aborts the cycle; finalize and insert are applied through
/// [`HistoryStore::supersede`] so they land together or not at all.
pub async fn reconcile(
    store: &dyn HistoryStore,
    cur: &PlaybackSnapshot,
) -> playtrail_common::Result<Reconciled> {
    let prev = store.latest_record().await?;
    let decision = decide(prev.as_ref(), cur, cur.sampled_at);

    let record_id = match &decision {
        Decision::UpdateProgress { id, progress_ms } => {
            store.update_progress(*id, *progress_ms).await?;
            debug!(record_id = id, progress_ms = progress_ms, "Play continues");
            *id
        }
        Decision::Insert {
            reason,
            finalize,
            record,
        } => {
            let id = store.supersede(*finalize, record).await?;
            info!(
                record_id = id,
                reason = ?reason,
                finalized = ?finalize,
                artist = %record.artist1,
                track = %record.track_name,
                "New play recorded"
            );
            id
        }
    };

    Ok(Reconciled {
        decision,
        record_id,
    })
}
