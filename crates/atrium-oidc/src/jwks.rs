use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

use atrium_http::Client;
use atrium_lockstore::CacheStore;

use crate::error::OidcError;

const JWKS_CACHE_TTL_SECS: u64 = 86_400;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    pub n: String,
    pub e: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

impl JwksDocument {
    pub fn decoding_key_for(&self, kid: &str) -> Result<DecodingKey, OidcError> {
        let jwk = self
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| OidcError::TokenValidation(format!("no jwks key matching kid '{kid}'")))?;

        DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| OidcError::TokenValidation(format!("malformed jwk for kid '{kid}': {e}")))
    }
}

fn cache_key(jwks_uri: &str) -> String {
    format!("oidc:jwks:{jwks_uri}")
}

pub async fn fetch_jwks(http: &Client, cache: &CacheStore, jwks_uri: &str) -> Result<JwksDocument, OidcError> {
    let key = cache_key(jwks_uri);
    if let Ok(Some(cached)) = cache.get(&key).await {
        if let Ok(doc) = serde_json::from_str::<JwksDocument>(&cached) {
            return Ok(doc);
        }
    }

    let response = http
        .get(jwks_uri)
        .await
        .map_err(|e| OidcError::Jwks { jwks_uri: jwks_uri.to_string(), message: e.to_string() })?;

    let doc: JwksDocument = response
        .json()
        .await
        .map_err(|e| OidcError::Jwks { jwks_uri: jwks_uri.to_string(), message: format!("malformed jwks document: {e}") })?;

    if let Ok(serialized) = serde_json::to_string(&doc) {
        let _ = cache.set(&key, &serialized, JWKS_CACHE_TTL_SECS).await;
    }

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_kid_is_an_error() {
        let doc = JwksDocument { keys: vec![] };
        assert!(doc.decoding_key_for("missing").is_err());
    }
}
