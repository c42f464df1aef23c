//! Error types for renderq.

use thiserror::Error;

use crate::SessionId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn render process: {0}")]
    SpawnFailed(String),

    #[error("malformed status artifact: {0}")]
    MalformedStatus(String),

    #[error("completion target no longer exists")]
    TargetGone,

    #[error("unknown job: {0}")]
    UnknownJob(SessionId),

    #[error("queue is shutting down")]
    ShuttingDown,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
