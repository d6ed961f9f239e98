//! # Playtrail Common Library
//!
//! Shared code for the playtrail tracker and its tooling:
//! - Bootstrap configuration loading
//! - Database initialization and the `history` / `error_log` tables
//! - Stats query builder over the stored history
//! - Time helpers and human-readable duration formatting

pub mod config;
pub mod db;
pub mod error;
pub mod human_time;
pub mod stats;
pub mod time;

pub use error::{Error, Result};
