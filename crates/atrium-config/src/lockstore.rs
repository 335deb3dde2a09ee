use std::env;

use crate::error::ConfigError;

/// Connection settings for the Redis-backed lock and MARC upload session
/// store (§4.2).
#[derive(Clone, Debug)]
pub struct LockStoreConfig {
    pub redis_url: String,
    /// Namespaces every key so one Redis instance can host more than one
    /// installation's leases without collision.
    pub installation_prefix: String,
}

impl LockStoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let redis_url = env::var("REDIS_URL").map_err(|_| ConfigError::MissingEnvVar("REDIS_URL"))?;
        let installation_prefix = env::var("ATRIUM_INSTALLATION_PREFIX").unwrap_or_else(|_| "atrium".to_string());
        Ok(Self { redis_url, installation_prefix })
    }
}
