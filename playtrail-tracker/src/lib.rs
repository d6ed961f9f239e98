//! # playtrail-tracker
//!
//! Samples the listener's current playback on a state-dependent cadence and
//! keeps a deduplicated history of plays.
//!
//! Data flows provider → [`normalizer`] → [`reconciler`] → [`store`], with the
//! [`queue_advisor`] acting on the same normalized snapshot. The [`poller`]
//! drives the cycle and routes every fault to the [`reporter`].

pub mod config;
pub mod error;
pub mod normalizer;
pub mod poller;
pub mod provider;
pub mod queue_advisor;
pub mod reconciler;
pub mod reporter;
pub mod store;

pub use error::{ProviderError, Result, TrackerError, ValidationError};
pub use poller::{CycleOutcome, PollIntervals, Poller};
