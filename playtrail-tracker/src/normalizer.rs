//! Raw provider output to [`PlaybackSnapshot`]
//!
//! Pure transform. A sample either becomes a complete snapshot, a "no
//! playback" signal, or a [`ValidationError`]; nothing partial is passed on.

use chrono::{DateTime, Utc};
use playtrail_common::db::{MAX_ARTISTS, NO_ARTIST};

use crate::error::ValidationError;
use crate::provider::RawPlayback;

/// One sampled observation of a playing (or paused) track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    /// Provider track id; absent for local files
    pub track_id: Option<String>,
    pub track_name: String,
    /// Up to [`MAX_ARTISTS`] names in credit order
    pub artists: Vec<String>,
    pub progress_ms: i64,
    pub duration_ms: i64,
    pub is_playing: bool,
    pub sampled_at: DateTime<Utc>,
}

impl PlaybackSnapshot {
    /// Artist used for identity comparisons
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or(NO_ARTIST)
    }
}

/// Result of normalizing one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
    /// No session, or the session is not playing a track
    Inactive,
    /// A track is loaded but not playing
    Paused(PlaybackSnapshot),
    Playing(PlaybackSnapshot),
}

impl Sample {
    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        match self {
            Sample::Inactive => None,
            Sample::Paused(s) | Sample::Playing(s) => Some(s),
        }
    }
}

/// Turn one provider sample into a [`Sample`]
///
/// Required fields are checked in order: artists, track name, progress,
/// duration. An empty artist list is valid (stored as [`NO_ARTIST`]); a
/// missing one is not.
pub fn normalize(
    raw: Option<RawPlayback>,
    sampled_at: DateTime<Utc>,
) -> Result<Sample, ValidationError> {
    let Some(raw) = raw else {
        return Ok(Sample::Inactive);
    };
    // Episodes and ads come back without an item
    let Some(item) = raw.item else {
        return Ok(Sample::Inactive);
    };

    let artists: Vec<String> = item
        .artists
        .ok_or(ValidationError::MissingField("artists"))?
        .into_iter()
        .filter_map(|a| a.name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .take(MAX_ARTISTS)
        .collect();

    let track_name = item
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or(ValidationError::MissingField("track name"))?;

    let progress_ms = raw
        .progress_ms
        .ok_or(ValidationError::MissingField("progress"))?;
    if progress_ms < 0 {
        return Err(ValidationError::InvalidField {
            field: "progress",
            reason: format!("negative position {}", progress_ms),
        });
    }

    let duration_ms = item
        .duration_ms
        .ok_or(ValidationError::MissingField("duration"))?;
    if duration_ms <= 0 {
        return Err(ValidationError::InvalidField {
            field: "duration",
            reason: format!("non-positive length {}", duration_ms),
        });
    }

    let snapshot = PlaybackSnapshot {
        track_id: item.id,
        track_name,
        artists,
        progress_ms,
        duration_ms,
        is_playing: raw.is_playing.unwrap_or(false),
        sampled_at,
    };

    if snapshot.is_playing {
        Ok(Sample::Playing(snapshot))
    } else {
        Ok(Sample::Paused(snapshot))
    }
}
