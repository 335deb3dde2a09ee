use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed taxonomy of error kinds shared across every subsystem crate. Leaf
/// crates define their own narrower enums for CAS/lock/OIDC/etc. failures and
/// convert into this one at the boundary where a uniform problem-detail
/// projection is required.
#[derive(Debug, Error)]
pub enum AtriumError {
    // ── Transport ─────────────────────────────────────────────────────────
    #[error("request to {url} timed out after {retries} retries")]
    RequestTimedOut { url: String, retries: u32 },

    #[error("network error calling {url}: {message}")]
    RequestNetworkException { url: String, message: String },

    // ── Protocol ──────────────────────────────────────────────────────────
    #[error("bad response from {url}: status {status}")]
    BadResponseException {
        url: String,
        status: u16,
        body_preview: String,
    },

    // ── Configuration ─────────────────────────────────────────────────────
    #[error("settings validation failed: {0}")]
    SettingsValidationError(String),

    // ── State / lock ──────────────────────────────────────────────────────
    #[error("lock error: {0}")]
    LockError(String),

    #[error("marc upload session error: {0}")]
    MarcFileUploadSessionError(String),

    // ── Auth ──────────────────────────────────────────────────────────────
    #[error("OIDC authentication error: {0}")]
    OidcAuthenticationError(String),

    // ── General ───────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

impl AtriumError {
    pub fn problem_detail(&self) -> ProblemDetail {
        match self {
            Self::RequestTimedOut { url, .. } => ProblemDetail {
                title: "Timeout".to_string(),
                detail: format!("Request to {url} timed out."),
                status: 504,
            },
            Self::RequestNetworkException { url, .. } => ProblemDetail {
                title: "Network error".to_string(),
                detail: format!("Could not connect to {url}."),
                status: 502,
            },
            Self::BadResponseException { url, status, .. } => ProblemDetail {
                title: "Bad response".to_string(),
                detail: format!("{url} returned an unexpected status ({status})."),
                status: 502,
            },
            Self::SettingsValidationError(message) => ProblemDetail {
                title: "Invalid configuration".to_string(),
                detail: message.clone(),
                status: 500,
            },
            Self::LockError(message) | Self::MarcFileUploadSessionError(message) => {
                ProblemDetail {
                    title: "Coordination failure".to_string(),
                    detail: message.clone(),
                    status: 409,
                }
            }
            Self::OidcAuthenticationError(message) => ProblemDetail {
                title: "Authentication failed".to_string(),
                detail: message.clone(),
                status: 401,
            },
            Self::Other(message) => ProblemDetail {
                title: "Internal error".to_string(),
                detail: message.clone(),
                status: 500,
            },
        }
    }
}

/// Shared projection target for upstream-facing error surfaces. Rendering
/// this to an HTTP response belongs to a collaborator outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetail {
    pub title: String,
    pub detail: String,
    pub status: u16,
}
