use atrium_core::ProblemDetail;
use thiserror::Error;

/// Failure modes shared across every `AuthenticationProvider` implementation.
/// Distinguishing `Unreachable` from `Protocol` lets a caller retry the
/// former but not the latter.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not reach authentication server {server}: {message}")]
    Unreachable { server: String, message: String },

    #[error("authentication server {server} returned a malformed response: {message}")]
    Protocol { server: String, message: String },

    #[error("sirsidynix path must not start with '/': {0}")]
    InvalidPath(String),
}

impl AuthError {
    pub fn problem_detail(&self) -> ProblemDetail {
        match self {
            Self::Unreachable { server, .. } => ProblemDetail {
                title: "Authentication server unreachable".to_string(),
                detail: format!("Could not contact the authentication server ({server}). Please try again later."),
                status: 502,
            },
            Self::Protocol { server, message } => ProblemDetail {
                title: "Authentication protocol error".to_string(),
                detail: format!("{server}: {message}"),
                status: 502,
            },
            Self::InvalidPath(path) => ProblemDetail {
                title: "Invalid request".to_string(),
                detail: format!("path '{path}' must be relative"),
                status: 500,
            },
        }
    }
}
