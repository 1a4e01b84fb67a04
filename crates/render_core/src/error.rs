//! Core render errors (pure - no I/O variants).

use thiserror::Error;

/// Core render errors (pure - no I/O variants).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderCoreError {
    #[error("urls must be a list of absolute URLs: {0}")]
    InvalidUrl(String),

    #[error("props must be an object, not an array or scalar")]
    NonObjectProps,

    #[error("globals.location must be a valid absolute URL: {0}")]
    InvalidLocation(String),

    #[error("no JavaScript URLs remained after filtering the urls list")]
    NoJsUrls,

    #[error("config serialization failed: {0}")]
    Serialization(String),

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("render timeout must be positive")]
    InvalidTimeout,

    #[error("fetch attempts must be at least 1")]
    InvalidFetchAttempts,
}

pub type Result<T> = std::result::Result<T, RenderCoreError>;
