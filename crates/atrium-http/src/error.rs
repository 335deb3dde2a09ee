use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared projection target for upstream-facing error surfaces. Rendering
/// this into an HTTP response belongs to a collaborator outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetail {
    pub title: String,
    pub detail: String,
    pub status: u16,
}

/// A request failed before a response could be classified: DNS, connect,
/// TLS, or an outright timeout. Mirrors `RequestNetworkException` /
/// `RequestTimedOut` — the timeout case is a narrower variant of the
/// network case, not a sibling enum.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} timed out after {retries} retries")]
    TimedOut { url: String, retries: u32 },

    #[error("network error calling {url}: {message}")]
    Network {
        url: String,
        message: String,
        retries: u32,
    },

    /// The request went through but the response was unusable: a 5xx, a
    /// code in `disallowed_response_codes`, or a code outside an explicit
    /// `allowed_response_codes` allowlist.
    #[error("bad response from {url}: status {status}")]
    BadResponse {
        url: String,
        status: u16,
        body_preview: String,
        retries: u32,
    },
}

impl HttpError {
    pub fn url(&self) -> &str {
        match self {
            Self::TimedOut { url, .. } => url,
            Self::Network { url, .. } => url,
            Self::BadResponse { url, .. } => url,
        }
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            Self::TimedOut { retries, .. } => *retries,
            Self::Network { retries, .. } => *retries,
            Self::BadResponse { retries, .. } => *retries,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn problem_detail(&self) -> ProblemDetail {
        match self {
            Self::TimedOut { url, .. } => ProblemDetail {
                title: "Timeout".to_string(),
                detail: format!("The request to {url} timed out."),
                status: 504,
            },
            Self::Network { url, .. } => ProblemDetail {
                title: "Network failure contacting third-party service".to_string(),
                detail: format!("A network error occurred while contacting {url}."),
                status: 502,
            },
            Self::BadResponse { url, status, .. } => ProblemDetail {
                title: "Bad response".to_string(),
                detail: format!("{url} returned an unexpected or invalid response ({status})."),
                status: 502,
            },
        }
    }
}
