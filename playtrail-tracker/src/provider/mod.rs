//! Playback telemetry provider
//!
//! The tracker only talks to the provider through [`PlaybackProvider`]. Raw
//! payloads are deserialized leniently (every field optional) so that an
//! incomplete sample reaches the normalizer and is rejected there, instead of
//! failing as a decode error.

pub mod spotify;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;

pub use spotify::{SpotifyClient, SpotifyCredentials};

/// Current playback as reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawPlayback {
    #[serde(default)]
    pub is_playing: Option<bool>,
    #[serde(default)]
    pub progress_ms: Option<i64>,
    #[serde(default)]
    pub item: Option<RawItem>,
}

/// The playing item (a track for our purposes)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawItem {
    /// Absent for local files
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub artists: Option<Vec<RawArtist>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawArtist {
    #[serde(default)]
    pub name: Option<String>,
}

/// Source of playback telemetry and the listener's queue
#[async_trait]
pub trait PlaybackProvider: Send + Sync {
    /// Current playback, or `None` when no session is active
    async fn current_playback(&self) -> Result<Option<RawPlayback>, ProviderError>;

    /// Ids of the upcoming tracks, next first
    async fn upcoming_queue(&self) -> Result<Vec<String>, ProviderError>;

    /// Ask the provider to append a track to the queue
    async fn enqueue(&self, track_id: &str) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currently_playing_payload() {
        let json = r#"{
            "timestamp": 1714564800000,
            "progress_ms": 42000,
            "is_playing": true,
            "currently_playing_type": "track",
            "item": {
                "id": "4uLU6hMCjMI75M1A2tKUQC",
                "name": "Never Gonna Give You Up",
                "duration_ms": 213573,
                "artists": [{ "id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley" }],
                "album": { "name": "Whenever You Need Somebody" }
            }
        }"#;

        let raw: RawPlayback = serde_json::from_str(json).unwrap();
        assert_eq!(raw.is_playing, Some(true));
        assert_eq!(raw.progress_ms, Some(42_000));
        let item = raw.item.unwrap();
        assert_eq!(item.id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert_eq!(item.duration_ms, Some(213_573));
        assert_eq!(
            item.artists.unwrap()[0].name.as_deref(),
            Some("Rick Astley")
        );
    }

    #[test]
    fn test_episode_payload_has_no_item() {
        let json = r#"{ "progress_ms": 1000, "is_playing": true, "item": null,
                        "currently_playing_type": "episode" }"#;
        let raw: RawPlayback = serde_json::from_str(json).unwrap();
        assert!(raw.item.is_none());
    }

    #[test]
    fn test_local_file_has_null_id() {
        let json = r#"{ "is_playing": false, "progress_ms": 0,
                        "item": { "id": null, "name": "demo.mp3", "duration_ms": 1000, "artists": [] } }"#;
        let raw: RawPlayback = serde_json::from_str(json).unwrap();
        let item = raw.item.unwrap();
        assert!(item.id.is_none());
        assert_eq!(item.artists, Some(vec![]));
    }
}
