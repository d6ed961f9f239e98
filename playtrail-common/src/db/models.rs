//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored in `artist1` when the provider reports no artists at all
pub const NO_ARTIST: &str = "No artist";

/// Maximum number of artists kept per play
pub const MAX_ARTISTS: usize = 3;

/// One row of the `history` table: a (possibly still growing) playthrough
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub id: i64,
    pub artist1: String,
    pub artist2: Option<String>,
    pub artist3: Option<String>,
    pub track_name: String,
    /// When the playthrough began
    pub played_at: DateTime<Utc>,
    /// Last known position; how far this play got
    pub progress_ms: i64,
    pub duration_ms: i64,
}

impl PlayRecord {
    /// Track time left unreported by the last sample (negative if progress overshot)
    pub fn remaining_ms(&self) -> i64 {
        self.duration_ms - self.progress_ms
    }

    /// True once progress has been forced up to the full duration
    pub fn is_finalized(&self) -> bool {
        self.progress_ms == self.duration_ms
    }
}

/// A play about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayRecord {
    pub artist1: String,
    pub artist2: Option<String>,
    pub artist3: Option<String>,
    pub track_name: String,
    pub played_at: DateTime<Utc>,
    pub progress_ms: i64,
    pub duration_ms: i64,
}

impl NewPlayRecord {
    /// Build a record from an ordered artist list
    ///
    /// Keeps the first three names; an empty list stores [`NO_ARTIST`].
    pub fn new(
        artists: &[String],
        track_name: impl Into<String>,
        played_at: DateTime<Utc>,
        progress_ms: i64,
        duration_ms: i64,
    ) -> Self {
        let mut names = artists.iter().take(MAX_ARTISTS).cloned();
        Self {
            artist1: names.next().unwrap_or_else(|| NO_ARTIST.to_string()),
            artist2: names.next(),
            artist3: names.next(),
            track_name: track_name.into(),
            played_at,
            progress_ms,
            duration_ms,
        }
    }
}

/// One row of the `error_log` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: i64,
    pub date: DateTime<Utc>,
    /// Fault category, e.g. an upstream HTTP status or an error kind
    pub category: String,
    pub description: String,
}
