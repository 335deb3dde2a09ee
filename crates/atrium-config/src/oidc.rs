use std::env;

use regex::Regex;

use crate::error::ConfigError;

/// One OIDC identity provider's settings (§4.6). Loaded per-provider from a
/// `OIDC_<SUFFIX>_*` family of environment variables so a deployment can run
/// more than one OIDC provider side by side.
#[derive(Clone, Debug)]
pub struct OidcProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Either a discovery issuer or the three manual endpoints below, never
    /// both unset.
    pub issuer_url: Option<String>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub jwks_uri: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub use_pkce: bool,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    pub access_type: String,
    pub patron_id_claim: String,
    /// Must contain a named capture group `patron_id` if set; validated at
    /// load time so a malformed expression fails fast rather than at the
    /// first login attempt.
    pub patron_id_regular_expression: Option<String>,
    /// Clock-skew tolerance applied symmetrically to `exp`/`iat` checks.
    pub clock_skew_secs: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenEndpointAuthMethod {
    ClientSecretPost,
    ClientSecretBasic,
}

impl OidcProviderSettings {
    pub fn from_env(suffix: &str) -> Result<Self, ConfigError> {
        let var = |name: &str| env::var(format!("OIDC_{suffix}_{name}"));
        let required = |name: &'static str| var(name).map_err(|_| ConfigError::MissingEnvVar(leak(format!("OIDC_{suffix}_{name}"))));

        let client_id = required("CLIENT_ID")?;
        let client_secret = required("CLIENT_SECRET")?;
        let redirect_uri = required("REDIRECT_URI")?;

        let issuer_url = var("ISSUER_URL").ok();
        let authorization_endpoint = var("AUTHORIZATION_ENDPOINT").ok();
        let token_endpoint = var("TOKEN_ENDPOINT").ok();
        let jwks_uri = var("JWKS_URI").ok();

        if issuer_url.is_none() && (authorization_endpoint.is_none() || token_endpoint.is_none() || jwks_uri.is_none()) {
            return Err(ConfigError::IncompleteConfiguration(
                "either ISSUER_URL or all of AUTHORIZATION_ENDPOINT/TOKEN_ENDPOINT/JWKS_URI must be set".to_string(),
            ));
        }

        let scopes = match var("SCOPES") {
            Ok(raw) => raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            Err(_) => vec!["openid".to_string(), "profile".to_string(), "email".to_string()],
        };
        if !scopes.iter().any(|s| s == "openid") {
            return Err(ConfigError::invalid("SCOPES", "must include 'openid'"));
        }

        let use_pkce = var("USE_PKCE").map(|v| v != "false" && v != "0").unwrap_or(true);

        let token_endpoint_auth_method = match var("TOKEN_ENDPOINT_AUTH_METHOD").as_deref() {
            Ok("client_secret_basic") => TokenEndpointAuthMethod::ClientSecretBasic,
            Ok("client_secret_post") | Err(_) => TokenEndpointAuthMethod::ClientSecretPost,
            Ok(other) => return Err(ConfigError::invalid("TOKEN_ENDPOINT_AUTH_METHOD", format!("unknown method '{other}'"))),
        };

        let access_type = var("ACCESS_TYPE").unwrap_or_else(|_| "offline".to_string());
        let patron_id_claim = var("PATRON_ID_CLAIM").unwrap_or_else(|_| "sub".to_string());

        let patron_id_regular_expression = match var("PATRON_ID_REGULAR_EXPRESSION") {
            Ok(pattern) => {
                let compiled = Regex::new(&pattern).map_err(|e| ConfigError::invalid("PATRON_ID_REGULAR_EXPRESSION", e.to_string()))?;
                if compiled.capture_names().flatten().all(|name| name != "patron_id") {
                    return Err(ConfigError::invalid("PATRON_ID_REGULAR_EXPRESSION", "must contain a named group 'patron_id'"));
                }
                Some(pattern)
            }
            Err(_) => None,
        };

        let clock_skew_secs = match var("CLOCK_SKEW_SECS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::invalid("CLOCK_SKEW_SECS", raw))?,
            Err(_) => 60,
        };

        Ok(Self {
            client_id,
            client_secret,
            issuer_url,
            authorization_endpoint,
            token_endpoint,
            jwks_uri,
            redirect_uri,
            scopes,
            use_pkce,
            token_endpoint_auth_method,
            access_type,
            patron_id_claim,
            patron_id_regular_expression,
            clock_skew_secs,
        })
    }
}

fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_must_include_openid() {
        std::env::set_var("OIDC_T1_CLIENT_ID", "id");
        std::env::set_var("OIDC_T1_CLIENT_SECRET", "secret");
        std::env::set_var("OIDC_T1_REDIRECT_URI", "https://example.org/callback");
        std::env::set_var("OIDC_T1_ISSUER_URL", "https://idp.example.org");
        std::env::set_var("OIDC_T1_SCOPES", "profile,email");

        let result = OidcProviderSettings::from_env("T1");
        assert!(result.is_err());

        std::env::remove_var("OIDC_T1_CLIENT_ID");
        std::env::remove_var("OIDC_T1_CLIENT_SECRET");
        std::env::remove_var("OIDC_T1_REDIRECT_URI");
        std::env::remove_var("OIDC_T1_ISSUER_URL");
        std::env::remove_var("OIDC_T1_SCOPES");
    }

    #[test]
    fn patron_id_regex_requires_named_group() {
        std::env::set_var("OIDC_T2_CLIENT_ID", "id");
        std::env::set_var("OIDC_T2_CLIENT_SECRET", "secret");
        std::env::set_var("OIDC_T2_REDIRECT_URI", "https://example.org/callback");
        std::env::set_var("OIDC_T2_ISSUER_URL", "https://idp.example.org");
        std::env::set_var("OIDC_T2_PATRON_ID_REGULAR_EXPRESSION", "^(?P<nope>.+)$");

        let result = OidcProviderSettings::from_env("T2");
        assert!(result.is_err());

        std::env::remove_var("OIDC_T2_CLIENT_ID");
        std::env::remove_var("OIDC_T2_CLIENT_SECRET");
        std::env::remove_var("OIDC_T2_REDIRECT_URI");
        std::env::remove_var("OIDC_T2_ISSUER_URL");
        std::env::remove_var("OIDC_T2_PATRON_ID_REGULAR_EXPRESSION");
    }
}
