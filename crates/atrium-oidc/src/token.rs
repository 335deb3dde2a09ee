use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use atrium_http::{Client, RequestOptions};

use crate::error::OidcError;
use crate::jwks::JwksDocument;

/// Which way the client authenticates itself to the token endpoint (§4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenEndpointAuthMethod {
    ClientSecretPost,
    ClientSecretBasic,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Claims validated out of an ID token or a back-channel logout token
/// (§4.6). `nonce` is required on an ID token and forbidden on a logout
/// token; the caller enforces which via [`validate_claims`]'s `expect_nonce`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
    pub iss: String,
    #[serde(default)]
    pub aud: serde_json::Value,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub events: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    fn audience_matches(&self, client_id: &str) -> bool {
        match &self.aud {
            serde_json::Value::String(s) => s == client_id,
            serde_json::Value::Array(values) => values.iter().any(|v| v.as_str() == Some(client_id)),
            _ => false,
        }
    }

    pub fn claim_str(&self, name: &str) -> Option<&str> {
        if name == "sub" {
            return self.sub.as_deref();
        }
        self.extra.get(name).and_then(|v| v.as_str())
    }
}

pub async fn exchange_authorization_code(
    http: &Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
    auth_method: TokenEndpointAuthMethod,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> Result<TokenResponse, OidcError> {
    let mut form: Vec<(&str, &str)> = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("code_verifier", code_verifier),
    ];
    if auth_method == TokenEndpointAuthMethod::ClientSecretPost {
        form.push(("client_id", client_id));
        form.push(("client_secret", client_secret));
    }

    let basic_auth_header = (auth_method == TokenEndpointAuthMethod::ClientSecretBasic)
        .then(|| format!("Basic {}", BASE64_STANDARD.encode(format!("{client_id}:{client_secret}"))));

    let response = http
        .request_with(reqwest::Method::POST, token_endpoint, RequestOptions::for_worker(), |b| {
            let mut b = b.form(&form);
            if let Some(header) = &basic_auth_header {
                b = b.header("Authorization", header);
            }
            b
        })
        .await
        .map_err(|e| OidcError::TokenExchange(e.to_string()))?;

    if response.status().as_u16() != 200 {
        let body = response.text().await.unwrap_or_default();
        return Err(OidcError::TokenExchange(format!("token endpoint returned an error: {body}")));
    }

    response.json::<TokenResponse>().await.map_err(|e| OidcError::TokenExchange(format!("malformed token response: {e}")))
}

pub async fn refresh_access_token(
    http: &Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
    auth_method: TokenEndpointAuthMethod,
    refresh_token: &str,
) -> Result<RefreshResponse, OidcError> {
    let mut form: Vec<(&str, &str)> = vec![("grant_type", "refresh_token"), ("refresh_token", refresh_token)];
    if auth_method == TokenEndpointAuthMethod::ClientSecretPost {
        form.push(("client_id", client_id));
        form.push(("client_secret", client_secret));
    }
    let basic_auth_header = (auth_method == TokenEndpointAuthMethod::ClientSecretBasic)
        .then(|| format!("Basic {}", BASE64_STANDARD.encode(format!("{client_id}:{client_secret}"))));

    let response = http
        .request_with(reqwest::Method::POST, token_endpoint, RequestOptions::for_worker(), |b| {
            let mut b = b.form(&form);
            if let Some(header) = &basic_auth_header {
                b = b.header("Authorization", header);
            }
            b
        })
        .await
        .map_err(|e| OidcError::Refresh(e.to_string()))?;

    if response.status().as_u16() != 200 {
        let body = response.text().await.unwrap_or_default();
        return Err(OidcError::Refresh(format!("token endpoint returned an error: {body}")));
    }

    response.json::<RefreshResponse>().await.map_err(|e| OidcError::Refresh(format!("malformed refresh response: {e}")))
}

/// Decode and validate `jwt` against `jwks`, checking `iss`/`aud`/`exp`/`iat`
/// with `clock_skew_secs` tolerance. If `expected_nonce` is `Some`, the
/// claim must match exactly (ID-token case); if `None`, the claim must be
/// absent (back-channel logout-token case, §4.6).
pub fn validate_claims(
    jwt: &str,
    jwks: &JwksDocument,
    expected_issuer: &str,
    client_id: &str,
    expected_nonce: Option<&str>,
    clock_skew_secs: i64,
) -> Result<Claims, OidcError> {
    let header = decode_header(jwt).map_err(|e| OidcError::TokenValidation(format!("malformed jwt header: {e}")))?;
    let kid = header.kid.ok_or_else(|| OidcError::TokenValidation("jwt header missing kid".to_string()))?;
    let key: DecodingKey = jwks.decoding_key_for(&kid)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.leeway = clock_skew_secs.max(0) as u64;

    let decoded = decode::<Claims>(jwt, &key, &validation).map_err(|e| OidcError::TokenValidation(format!("signature or structure invalid: {e}")))?;
    let claims = decoded.claims;

    if claims.iss != expected_issuer {
        return Err(OidcError::TokenValidation(format!("unexpected issuer '{}'", claims.iss)));
    }
    if !claims.audience_matches(client_id) {
        return Err(OidcError::TokenValidation("audience does not include this client".to_string()));
    }

    let now = Utc::now().timestamp();
    if claims.exp + clock_skew_secs <= now {
        return Err(OidcError::TokenValidation("token has expired".to_string()));
    }
    if claims.iat > now + clock_skew_secs {
        return Err(OidcError::TokenValidation("token issued in the future".to_string()));
    }

    match expected_nonce {
        Some(expected) => {
            if claims.nonce.as_deref() != Some(expected) {
                return Err(OidcError::TokenValidation("nonce mismatch".to_string()));
            }
        }
        None => {
            if claims.nonce.is_some() {
                return Err(OidcError::LogoutTokenValidation("logout token must not carry a nonce".to_string()));
            }
            if claims.sub.is_none() && claims.sid.is_none() {
                return Err(OidcError::LogoutTokenValidation("logout token must carry sub or sid".to_string()));
            }
            if claims.jti.is_none() {
                return Err(OidcError::LogoutTokenValidation("logout token missing jti".to_string()));
            }
            let has_backchannel_event = claims
                .events
                .as_ref()
                .and_then(|e| e.as_object())
                .map(|obj| obj.contains_key("http://schemas.openid.net/event/backchannel-logout"))
                .unwrap_or(false);
            if !has_backchannel_event {
                return Err(OidcError::LogoutTokenValidation("logout token missing backchannel-logout event".to_string()));
            }
        }
    }

    Ok(claims)
}
