//! Test doubles for the tracker's collaborators

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playtrail_common::db::{NewPlayRecord, PlayRecord};
use playtrail_tracker::provider::{PlaybackProvider, RawArtist, RawItem, RawPlayback};
use playtrail_tracker::reporter::ErrorReporter;
use playtrail_tracker::store::HistoryStore;
use playtrail_tracker::ProviderError;

/// Raw sample of a playing track by a single artist
pub fn playing(track_id: &str, name: &str, progress_ms: i64, duration_ms: i64) -> RawPlayback {
    RawPlayback {
        is_playing: Some(true),
        progress_ms: Some(progress_ms),
        item: Some(RawItem {
            id: Some(track_id.to_string()),
            name: Some(name.to_string()),
            duration_ms: Some(duration_ms),
            artists: Some(vec![RawArtist {
                name: Some("Artist".to_string()),
            }]),
        }),
    }
}

/// Provider returning whatever playback was last set
#[derive(Default)]
pub struct FakeProvider {
    playback: Mutex<Option<Result<Option<RawPlayback>, ProviderError>>>,
    upcoming: Mutex<Vec<String>>,
    pub enqueued: Mutex<Vec<String>>,
    pub playback_calls: Mutex<usize>,
}

impl FakeProvider {
    pub fn set_playback(&self, playback: Option<RawPlayback>) {
        *self.playback.lock().unwrap() = Some(Ok(playback));
    }

    pub fn set_failure(&self, error: ProviderError) {
        *self.playback.lock().unwrap() = Some(Err(error));
    }

    pub fn set_upcoming(&self, ids: &[&str]) {
        *self.upcoming.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }

    pub fn enqueued(&self) -> Vec<String> {
        self.enqueued.lock().unwrap().clone()
    }

    pub fn playback_calls(&self) -> usize {
        *self.playback_calls.lock().unwrap()
    }
}

#[async_trait]
impl PlaybackProvider for FakeProvider {
    async fn current_playback(&self) -> Result<Option<RawPlayback>, ProviderError> {
        *self.playback_calls.lock().unwrap() += 1;
        self.playback.lock().unwrap().clone().unwrap_or(Ok(None))
    }

    async fn upcoming_queue(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.upcoming.lock().unwrap().clone())
    }

    async fn enqueue(&self, track_id: &str) -> Result<(), ProviderError> {
        self.enqueued.lock().unwrap().push(track_id.to_string());
        Ok(())
    }
}

/// In-memory history with write counters
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PlayRecord>>,
    pub inserts: Mutex<usize>,
    pub updates: Mutex<usize>,
    pub finalizes: Mutex<usize>,
    pub fail: Mutex<bool>,
}

impl MemoryStore {
    /// Add an existing record directly, bypassing the counters
    pub fn seed(&self, record: NewPlayRecord) -> i64 {
        let mut records = self.records.lock().unwrap();
        let id = records.len() as i64 + 1;
        records.push(to_record(id, record));
        id
    }

    pub fn records(&self) -> Vec<PlayRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn record(&self, id: i64) -> PlayRecord {
        self.records()
            .into_iter()
            .find(|r| r.id == id)
            .expect("record exists")
    }

    pub fn inserts(&self) -> usize {
        *self.inserts.lock().unwrap()
    }

    pub fn updates(&self) -> usize {
        *self.updates.lock().unwrap()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    fn check(&self) -> playtrail_common::Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(playtrail_common::Error::Internal("store offline".into()));
        }
        Ok(())
    }
}

fn to_record(id: i64, record: NewPlayRecord) -> PlayRecord {
    PlayRecord {
        id,
        artist1: record.artist1,
        artist2: record.artist2,
        artist3: record.artist3,
        track_name: record.track_name,
        played_at: record.played_at,
        progress_ms: record.progress_ms,
        duration_ms: record.duration_ms,
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn latest_record(&self) -> playtrail_common::Result<Option<PlayRecord>> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .max_by_key(|r| (r.played_at, r.id))
            .cloned())
    }

    async fn insert(&self, record: &NewPlayRecord) -> playtrail_common::Result<i64> {
        self.check()?;
        *self.inserts.lock().unwrap() += 1;
        Ok(self.seed(record.clone()))
    }

    async fn update_progress(&self, id: i64, progress_ms: i64) -> playtrail_common::Result<()> {
        self.check()?;
        *self.updates.lock().unwrap() += 1;
        if let Some(r) = self.records.lock().unwrap().iter_mut().find(|r| r.id == id) {
            r.progress_ms = progress_ms;
        }
        Ok(())
    }

    async fn finalize(&self, id: i64) -> playtrail_common::Result<()> {
        self.check()?;
        *self.finalizes.lock().unwrap() += 1;
        if let Some(r) = self.records.lock().unwrap().iter_mut().find(|r| r.id == id) {
            r.progress_ms = r.duration_ms;
        }
        Ok(())
    }
}

/// Reporter keeping every entry in memory
#[derive(Default)]
pub struct RecordingReporter {
    pub entries: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn categories(&self) -> Vec<String> {
        self.entries().into_iter().map(|(c, _)| c).collect()
    }
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn log(&self, category: &str, message: &str) -> Option<i64> {
        let mut entries = self.entries.lock().unwrap();
        entries.push((category.to_string(), message.to_string()));
        Some(entries.len() as i64)
    }
}

/// A record of "Song" by "Artist" that started `ago` before now
pub fn started_ago(ago: chrono::Duration, progress_ms: i64, duration_ms: i64) -> NewPlayRecord {
    let played_at: DateTime<Utc> = Utc::now() - ago;
    NewPlayRecord::new(
        &["Artist".to_string()],
        "Song",
        played_at,
        progress_ms,
        duration_ms,
    )
}
