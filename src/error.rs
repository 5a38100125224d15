//! Error types reported by the navigator to its callers.

use thiserror::Error;

/// Failures surfaced to the UI. Tree-internal inconsistencies are never
/// errors; they are absorbed where they occur.
#[derive(Error, Debug)]
pub enum NavigatorError {
    /// Row source paging failed; no partial forest was applied.
    #[error("Loading failed: {0:#}")]
    Load(anyhow::Error),

    /// A write was rejected; the optimistic change has been discarded.
    #[error("Write failed: {0:#}")]
    Write(anyhow::Error),

    #[error("View state persistence error: {0}")]
    Persist(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NavigatorError>;
