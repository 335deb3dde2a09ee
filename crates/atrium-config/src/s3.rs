use std::env;

use crate::error::ConfigError;

/// Object-storage destination for MARC multipart uploads (§4.7, §6).
#[derive(Clone, Debug)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Overrides the endpoint for S3-compatible stores (MinIO, etc).
    /// Leave unset for real AWS.
    pub endpoint_url: Option<String>,
}

impl S3Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bucket = env::var("MARC_S3_BUCKET").map_err(|_| ConfigError::MissingEnvVar("MARC_S3_BUCKET"))?;
        let region = env::var("MARC_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let endpoint_url = env::var("MARC_S3_ENDPOINT_URL").ok();
        Ok(Self { bucket, region, endpoint_url })
    }
}
