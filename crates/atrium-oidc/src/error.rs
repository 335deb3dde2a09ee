use thiserror::Error;

use atrium_core::ProblemDetail;

/// Closed taxonomy of OIDC flow failures (§7). `TokenExchange` and
/// `Refresh` are distinguished from `TokenValidation` because an operator
/// reacts to them differently: the former are upstream/config problems,
/// the latter are evidence of a forged or stale token.
#[derive(Debug, Error)]
pub enum OidcError {
    #[error("discovery failed for issuer {issuer}: {message}")]
    Discovery { issuer: String, message: String },

    #[error("jwks fetch failed for {jwks_uri}: {message}")]
    Jwks { jwks_uri: String, message: String },

    #[error("invalid or expired state token")]
    InvalidState,

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("id token validation failed: {0}")]
    TokenValidation(String),

    #[error("logout token validation failed: {0}")]
    LogoutTokenValidation(String),

    #[error("patron id extraction failed: {0}")]
    PatronIdExtraction(String),
}

impl OidcError {
    pub fn problem_detail(&self) -> ProblemDetail {
        let (title, status) = match self {
            Self::Discovery { .. } | Self::Jwks { .. } => ("OIDC provider unreachable", 502),
            Self::InvalidState => ("Invalid login session", 400),
            Self::TokenExchange(_) | Self::Refresh(_) => ("OIDC token exchange failed", 502),
            Self::TokenValidation(_) | Self::LogoutTokenValidation(_) => ("Invalid identity token", 401),
            Self::PatronIdExtraction(_) => ("Could not determine patron identity", 502),
        };
        ProblemDetail { title: title.to_string(), detail: self.to_string(), status }
    }
}
