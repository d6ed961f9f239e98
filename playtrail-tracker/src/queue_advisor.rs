//! Queue advisor
//!
//! When a configured trigger track starts, make sure the configured follow-up
//! track is next in the listener's queue. At most one enqueue attempt is made
//! per activation of the trigger track; the state for that lives here, owned
//! by the poller.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, TrackerError};
use crate::provider::PlaybackProvider;

/// One trigger set and the track to queue after it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRule {
    pub current_track: Vec<String>,
    pub next_track: String,
}

/// Rules loaded once at startup, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueRules {
    rules: Vec<QueueRule>,
}

impl QueueRules {
    pub fn new(rules: Vec<QueueRule>) -> Self {
        Self { rules }
    }

    /// Parse a JSON array of `{"currentTrack": [...], "nextTrack": "..."}`
    pub fn from_json_str(content: &str) -> Result<Self, TrackerError> {
        let rules: Vec<QueueRule> = serde_json::from_str(content)
            .map_err(|e| TrackerError::Config(format!("Invalid queue rules: {}", e)))?;
        Ok(Self::new(rules))
    }

    /// Load rules from a file; a missing file means no rules
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        if !path.exists() {
            info!(
                "Queue rules file {} not found, queue advisor disabled",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let rules = Self::from_json_str(&content)?;
        info!(rules = rules.len(), "Loaded queue rules from {}", path.display());
        Ok(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// First rule triggered by `track_id`
    pub fn rule_for(&self, track_id: &str) -> Option<&QueueRule> {
        self.rules
            .iter()
            .find(|rule| rule.current_track.iter().any(|id| id == track_id))
    }
}

/// What the advisor did this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueAdvice {
    /// No rules configured, or the track has no id
    Skipped,
    NoRule,
    /// Already acted on this activation
    AlreadyHandled,
    /// The follow-up was already at the head of the queue
    AlreadyQueued,
    Enqueued { next_track: String },
}

/// Per-activation enqueue state
#[derive(Debug, Default)]
pub struct QueueAdvisor {
    rules: QueueRules,
    last_seen_track_id: Option<String>,
    already_added: bool,
}

impl QueueAdvisor {
    pub fn new(rules: QueueRules) -> Self {
        Self {
            rules,
            last_seen_track_id: None,
            already_added: false,
        }
    }

    /// Act on the current track
    ///
    /// The activation is marked handled as soon as the queue has been read,
    /// so a failed enqueue is not retried until the track changes.
    pub async fn advise(
        &mut self,
        track_id: Option<&str>,
        provider: &dyn PlaybackProvider,
    ) -> Result<QueueAdvice, ProviderError> {
        if self.rules.is_empty() {
            return Ok(QueueAdvice::Skipped);
        }
        // Tracks without an id cannot be queued
        let Some(track_id) = track_id else {
            return Ok(QueueAdvice::Skipped);
        };

        if self.last_seen_track_id.as_deref() != Some(track_id) {
            self.last_seen_track_id = Some(track_id.to_string());
            self.already_added = false;
        }

        if self.already_added {
            return Ok(QueueAdvice::AlreadyHandled);
        }
        let Some(rule) = self.rules.rule_for(track_id) else {
            return Ok(QueueAdvice::NoRule);
        };

        let upcoming = provider.upcoming_queue().await?;
        self.already_added = true;

        if upcoming.first() == Some(&rule.next_track) {
            debug!(track_id = %track_id, next_track = %rule.next_track, "Follow-up already queued");
            return Ok(QueueAdvice::AlreadyQueued);
        }

        if let Err(e) = provider.enqueue(&rule.next_track).await {
            warn!(track_id = %track_id, next_track = %rule.next_track, error = %e, "Enqueue failed");
            return Err(e);
        }

        Ok(QueueAdvice::Enqueued {
            next_track: rule.next_track.clone(),
        })
    }
}
