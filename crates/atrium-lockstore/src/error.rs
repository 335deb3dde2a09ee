use thiserror::Error;

/// CAS or lease violations against the Redis-backed lock/state store.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("must hold lock to update; expected fencing token {expected}, got {got:?}")]
    FencingMismatch { expected: String, got: Option<String> },

    #[error("update number mismatch: expected {expected}, got {got:?}")]
    UpdateNumberMismatch { expected: u64, got: Option<u64> },

    #[error("another process modified the key while we held a watch")]
    WatchConflict,

    #[error("{0}")]
    Other(String),
}

/// Specialization for the MARC Upload Session — a `LockError` plus the
/// session-specific operations that can fail against it.
#[derive(Debug, Error)]
pub enum MarcFileUploadSessionError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("invalid path escape: {0}")]
    Escape(#[from] crate::escape::EscapeError),

    #[error("pipeline result validation failed: {0}")]
    PipelineValidation(String),
}
