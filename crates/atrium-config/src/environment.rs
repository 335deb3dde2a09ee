//! Process-wide environment variables that are not tied to any one
//! provider or collection — the `SIRSI_DYNIX_APP_ID` default, the
//! reporting-name used to compose playtime CSV file names, and the secret
//! used to sign OIDC state tokens (§6).

use std::env;

use atrium_auth::sirsidynix::DEFAULT_APP_ID;

use crate::error::ConfigError;

#[derive(Clone, Debug)]
pub struct Environment {
    pub sirsi_dynix_app_id: String,
    pub reporting_name: String,
    pub state_signing_secret: String,
}

impl Environment {
    pub fn from_env() -> Result<Self, ConfigError> {
        let state_signing_secret = env::var("ATRIUM_STATE_SIGNING_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("ATRIUM_STATE_SIGNING_SECRET"))?;
        if state_signing_secret.is_empty() {
            return Err(ConfigError::invalid("ATRIUM_STATE_SIGNING_SECRET", "must not be empty"));
        }

        Ok(Self {
            sirsi_dynix_app_id: env::var("SIRSI_DYNIX_APP_ID").unwrap_or_else(|_| DEFAULT_APP_ID.to_string()),
            reporting_name: env::var("ATRIUM_REPORTING_NAME").unwrap_or_else(|_| "atrium".to_string()),
            state_signing_secret,
        })
    }
}
