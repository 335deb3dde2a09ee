use std::env;

use atrium_auth::sip2::{Sip2Dialect, Sip2Encoding, Sip2Settings};

use crate::error::ConfigError;

/// Loads one SIP2 provider's [`Sip2Settings`] from a set of
/// `SIP2_<SUFFIX>_*` environment variables, so multiple SIP2 endpoints can
/// coexist by using distinct suffixes (one per collection/library pairing).
pub fn sip2_settings_from_env(suffix: &str) -> Result<Sip2Settings, ConfigError> {
    let var = |name: &str| env::var(format!("SIP2_{suffix}_{name}"));
    let required = |name: &'static str| var(name).map_err(|_| ConfigError::MissingEnvVar(leak(format!("SIP2_{suffix}_{name}"))));

    let server = required("SERVER")?;
    let login_user_id = required("USERNAME")?;
    let login_password = required("PASSWORD")?;

    let mut settings = Sip2Settings::new(server, login_user_id, login_password);

    if let Ok(port) = var("PORT") {
        settings.port = port.parse().map_err(|_| ConfigError::invalid("PORT", port))?;
    }
    if let Ok(location) = var("LOCATION_CODE") {
        settings.location_code = location;
    }
    if let Ok(institution) = var("INSTITUTION_ID") {
        settings.institution_id = institution;
    }
    if let Ok(separator) = var("FIELD_SEPARATOR") {
        settings.field_separator = separator.chars().next().ok_or_else(|| ConfigError::invalid("FIELD_SEPARATOR", "must be one character"))?;
    }
    if let Ok(encoding) = var("ENCODING") {
        settings.encoding = match encoding.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Sip2Encoding::Utf8,
            "cp850" => Sip2Encoding::Cp850,
            other => return Err(ConfigError::invalid("ENCODING", format!("unknown encoding '{other}'"))),
        };
    }
    if let Ok(dialect) = var("DIALECT") {
        settings.dialect = match dialect.to_ascii_lowercase().as_str() {
            "generic" => Sip2Dialect::Generic,
            "polaris" => Sip2Dialect::Polaris,
            other => return Err(ConfigError::invalid("DIALECT", format!("unknown dialect '{other}'"))),
        };
    }
    if let Ok(timeout) = var("TIMEOUT_SECS") {
        let timeout: u64 = timeout.parse().map_err(|_| ConfigError::invalid("TIMEOUT_SECS", "must be an integer"))?;
        if !(1..=9).contains(&timeout) {
            return Err(ConfigError::invalid("TIMEOUT_SECS", "must be between 1 and 9 seconds"));
        }
        settings.timeout_secs = timeout;
    }
    if let Ok(block) = var("PATRON_STATUS_BLOCK") {
        settings.patron_status_block = block != "false" && block != "0";
    }
    if let Ok(limit) = var("FEE_LIMIT") {
        settings.fee_limit = Some(limit.parse().map_err(|_| ConfigError::invalid("FEE_LIMIT", limit))?);
    }

    Ok(settings)
}

/// Environment variables carry only `'static` names well; a per-suffix
/// lookup key needs its message leaked once to satisfy `ConfigError`'s
/// `&'static str` field without a wider rewrite of the error type.
fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}
