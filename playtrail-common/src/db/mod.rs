//! Database models and queries

pub mod error_log;
pub mod history;
pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
