use std::env;

use crate::error::ConfigError;

/// Per-library MARC export settings (§4.7), grounded on `LibraryInfo` in
/// the upstream exporter: which optional fields a library wants in its
/// records and where its web-client acquisition links should point.
#[derive(Clone, Debug)]
pub struct MarcLibraryConfig {
    pub library_id: String,
    pub library_short_name: String,
    pub opds_base_url: String,
    pub organization_code: String,
    pub web_client_urls: Vec<String>,
    pub include_summary: bool,
    pub include_genres: bool,
}

impl MarcLibraryConfig {
    pub fn from_env(suffix: &str) -> Result<Self, ConfigError> {
        let var = |name: &str| env::var(format!("MARC_LIBRARY_{suffix}_{name}"));
        let required = |name: &'static str| var(name).map_err(|_| ConfigError::MissingEnvVar(leak(format!("MARC_LIBRARY_{suffix}_{name}"))));

        let web_client_urls = var("WEB_CLIENT_URLS")
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            library_id: required("ID")?,
            library_short_name: required("SHORT_NAME")?,
            opds_base_url: required("OPDS_BASE_URL")?,
            organization_code: required("ORGANIZATION_CODE")?,
            web_client_urls,
            include_summary: var("INCLUDE_SUMMARY").map(|v| v != "false" && v != "0").unwrap_or(true),
            include_genres: var("INCLUDE_GENRES").map(|v| v != "false" && v != "0").unwrap_or(true),
        })
    }
}

/// How often the export engine is willing to regenerate a full file for a
/// (library, collection) pair that has no unexported changes.
#[derive(Clone, Debug)]
pub struct MarcExportSchedule {
    pub update_frequency_days: u32,
}

impl MarcExportSchedule {
    pub fn from_env() -> Result<Self, ConfigError> {
        let days = match env::var("MARC_UPDATE_FREQUENCY_DAYS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::invalid("MARC_UPDATE_FREQUENCY_DAYS", raw))?,
            Err(_) => 30,
        };
        Ok(Self { update_frequency_days: days })
    }
}

fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}
