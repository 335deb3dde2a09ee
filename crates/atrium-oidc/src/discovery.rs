use serde::{Deserialize, Serialize};

use atrium_http::Client;
use atrium_lockstore::CacheStore;

use crate::error::OidcError;

const DISCOVERY_CACHE_TTL_SECS: u64 = 86_400;

/// The subset of a provider's `.well-known/openid-configuration` document
/// this crate needs (§4.6). Extra fields in the upstream response are
/// ignored rather than rejected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
}

fn cache_key(issuer: &str) -> String {
    format!("oidc:discovery:{issuer}")
}

/// Fetch and validate the discovery document for `issuer`, serving a cached
/// copy for up to 24 hours before re-fetching.
pub async fn discover(http: &Client, cache: &CacheStore, issuer: &str) -> Result<DiscoveryDocument, OidcError> {
    let key = cache_key(issuer);
    if let Ok(Some(cached)) = cache.get(&key).await {
        if let Ok(doc) = serde_json::from_str::<DiscoveryDocument>(&cached) {
            return Ok(doc);
        }
    }

    let url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
    let response = http.get(&url).await.map_err(|e| OidcError::Discovery { issuer: issuer.to_string(), message: e.to_string() })?;

    let doc: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| OidcError::Discovery { issuer: issuer.to_string(), message: format!("malformed discovery document: {e}") })?;

    validate(&doc, issuer)?;

    if let Ok(serialized) = serde_json::to_string(&doc) {
        let _ = cache.set(&key, &serialized, DISCOVERY_CACHE_TTL_SECS).await;
    }

    Ok(doc)
}

fn validate(doc: &DiscoveryDocument, expected_issuer: &str) -> Result<(), OidcError> {
    if doc.issuer.is_empty() || doc.authorization_endpoint.is_empty() || doc.token_endpoint.is_empty() || doc.jwks_uri.is_empty() {
        return Err(OidcError::Discovery {
            issuer: expected_issuer.to_string(),
            message: "discovery document missing a required endpoint".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_document_missing_endpoints() {
        let doc = DiscoveryDocument {
            issuer: "https://idp.example.org".to_string(),
            authorization_endpoint: String::new(),
            token_endpoint: "https://idp.example.org/token".to_string(),
            jwks_uri: "https://idp.example.org/jwks".to_string(),
            end_session_endpoint: None,
            userinfo_endpoint: None,
        };
        assert!(validate(&doc, "https://idp.example.org").is_err());
    }
}
