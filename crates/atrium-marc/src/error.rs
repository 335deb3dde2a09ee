use thiserror::Error;

use atrium_core::ProblemDetail;
use atrium_lockstore::{LockError, MarcFileUploadSessionError};

/// Closed taxonomy of MARC export failures (§4.7). `Session` covers the
/// per-collection lease/CAS path; `Upload` covers S3 multipart failures,
/// which an operator reacts to differently (retry the part, not the lease).
#[derive(Debug, Error)]
pub enum MarcError {
    #[error("could not acquire the export lease for collection {collection_id}")]
    LeaseUnavailable { collection_id: String },

    #[error(transparent)]
    Session(#[from] MarcFileUploadSessionError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("s3 upload failed: {0}")]
    Upload(String),

    #[error("catalog store error: {0}")]
    Store(String),
}

impl MarcError {
    pub fn problem_detail(&self) -> ProblemDetail {
        let (title, status) = match self {
            Self::LeaseUnavailable { .. } => ("Export already in progress", 409),
            Self::Session(_) | Self::Lock(_) => ("Coordination failure", 409),
            Self::Upload(_) => ("Object storage error", 502),
            Self::Store(_) => ("Catalog query failed", 500),
        };
        ProblemDetail { title: title.to_string(), detail: self.to_string(), status }
    }
}
