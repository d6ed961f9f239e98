//! Poll loop
//!
//! One cycle: fetch playback, normalize, reconcile, advise the queue. The
//! cycle's outcome picks the sleep before the next one. Cycles run strictly
//! one after another, which is what makes the reconciler's read-decide-write
//! safe without locking.

use std::sync::Arc;
use std::time::Duration;

use playtrail_common::config::PollConfig;
use playtrail_common::time::{self, millis_to_duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::normalizer::{normalize, Sample};
use crate::provider::PlaybackProvider;
use crate::queue_advisor::{QueueAdvice, QueueAdvisor};
use crate::reconciler::reconcile;
use crate::reporter::ErrorReporter;
use crate::store::HistoryStore;

/// Sleep lengths per cycle outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub playing: Duration,
    pub paused: Duration,
    pub idle: Duration,
    pub error: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollIntervals {
    fn from(config: &PollConfig) -> Self {
        Self {
            playing: millis_to_duration(config.playing_ms),
            paused: millis_to_duration(config.paused_ms),
            idle: millis_to_duration(config.idle_ms),
            error: millis_to_duration(config.error_ms),
        }
    }
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Playing,
    Paused,
    /// No playback session
    Inactive,
    /// At least one fault was reported
    Failed,
}

impl CycleOutcome {
    pub fn delay(self, intervals: &PollIntervals) -> Duration {
        match self {
            CycleOutcome::Playing => intervals.playing,
            CycleOutcome::Paused => intervals.paused,
            CycleOutcome::Inactive => intervals.idle,
            CycleOutcome::Failed => intervals.error,
        }
    }
}

/// Owns everything a cycle touches
pub struct Poller {
    provider: Arc<dyn PlaybackProvider>,
    store: Arc<dyn HistoryStore>,
    reporter: Arc<dyn ErrorReporter>,
    advisor: QueueAdvisor,
    intervals: PollIntervals,
}

impl Poller {
    pub fn new(
        provider: Arc<dyn PlaybackProvider>,
        store: Arc<dyn HistoryStore>,
        reporter: Arc<dyn ErrorReporter>,
        advisor: QueueAdvisor,
        intervals: PollIntervals,
    ) -> Self {
        Self {
            provider,
            store,
            reporter,
            advisor,
            intervals,
        }
    }

    pub fn intervals(&self) -> &PollIntervals {
        &self.intervals
    }

    async fn report(&self, error: TrackerError) {
        let category = error.category();
        let message = error.to_string();
        warn!(category = %category, "Cycle fault: {}", message);
        self.reporter.log(&category, &message).await;
    }

    /// Run one cycle to completion; never fails outward
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let sampled_at = time::now();

        let raw = match self.provider.current_playback().await {
            Ok(raw) => raw,
            Err(e) => {
                self.report(e.into()).await;
                return CycleOutcome::Failed;
            }
        };

        let snapshot = match normalize(raw, sampled_at) {
            Ok(Sample::Playing(snapshot)) => snapshot,
            Ok(Sample::Paused(_)) => {
                debug!("Playback paused");
                return CycleOutcome::Paused;
            }
            Ok(Sample::Inactive) => {
                debug!("No active playback");
                return CycleOutcome::Inactive;
            }
            Err(e) => {
                self.report(e.into()).await;
                return CycleOutcome::Failed;
            }
        };

        // Reconciler and advisor are independent; each fault is reported on its own
        let mut outcome = CycleOutcome::Playing;

        if let Err(e) = reconcile(self.store.as_ref(), &snapshot).await {
            self.report(e.into()).await;
            outcome = CycleOutcome::Failed;
        }

        match self
            .advisor
            .advise(snapshot.track_id.as_deref(), self.provider.as_ref())
            .await
        {
            Ok(QueueAdvice::Enqueued { next_track }) => {
                info!(next_track = %next_track, "Queued follow-up track");
            }
            Ok(_) => {}
            Err(e) => {
                self.report(e.into()).await;
                outcome = CycleOutcome::Failed;
            }
        }

        outcome
    }

    /// Poll until `cancel` fires
    ///
    /// Cancellation is checked before each cycle and interrupts the sleep
    /// between cycles; a cycle in progress runs to completion.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            playing_ms = self.intervals.playing.as_millis() as u64,
            paused_ms = self.intervals.paused.as_millis() as u64,
            idle_ms = self.intervals.idle.as_millis() as u64,
            error_ms = self.intervals.error.as_millis() as u64,
            "Poller started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let outcome = self.run_cycle().await;
            let delay = outcome.delay(&self.intervals);
            debug!(outcome = ?outcome, delay_ms = delay.as_millis() as u64, "Cycle complete");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Poller stopped");
    }
}
