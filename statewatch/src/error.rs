//! Error types returned by registry operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A handle that does not name a live item, or an argument outside
    /// its accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An item configuration the registry cannot schedule.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("registry is not initialized")]
    NotInitialized,

    #[error("registry is already running")]
    AlreadyRunning,

    #[error("allocation failed while registering item")]
    AllocationFailure,

    /// `start()` was called outside a Tokio runtime.
    #[error("no Tokio runtime available to drive the ticker")]
    NoRuntime,
}
