use std::env;

use atrium_core::catalog::{Collection, ProtocolTag};

use crate::error::ConfigError;

/// Loads one collection's [`Collection`] from `COLLECTION_<SUFFIX>_*`
/// environment variables, following the same per-suffix convention as
/// [`crate::sip2::sip2_settings_from_env`] and
/// [`crate::sirsidynix::sirsidynix_settings_from_env`].
pub fn collection_from_env(suffix: &str) -> Result<Collection, ConfigError> {
    let var = |name: &str| env::var(format!("COLLECTION_{suffix}_{name}"));
    let required = |name: &'static str| var(name).map_err(|_| ConfigError::MissingEnvVar(leak(format!("COLLECTION_{suffix}_{name}"))));

    let id = required("ID")?;
    let name = required("NAME")?;
    let protocol = match required("PROTOCOL")?.to_ascii_lowercase().as_str() {
        "opds1" => ProtocolTag::Opds1,
        "opds2_odl" | "opds2odl" => ProtocolTag::Opds2Odl,
        "overdrive" => ProtocolTag::Overdrive,
        other => return Err(ConfigError::invalid("PROTOCOL", format!("unknown protocol '{other}'"))),
    };
    let external_account_id = var("BASE_URL").ok();
    let skipped_license_formats = var("SKIPPED_LICENSE_FORMATS")
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    Ok(Collection { id, name, protocol, external_account_id, skipped_license_formats, last_imported_watermark: None })
}

fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}
