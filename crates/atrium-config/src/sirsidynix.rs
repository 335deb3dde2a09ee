use std::env;

use atrium_auth::sirsidynix::SirsiDynixSettings;

use crate::error::ConfigError;

/// Loads one SirsiDynix Horizon endpoint's [`SirsiDynixSettings`] from
/// `SIRSIDYNIX_<SUFFIX>_*` environment variables.
pub fn sirsidynix_settings_from_env(suffix: &str) -> Result<SirsiDynixSettings, ConfigError> {
    let var = |name: &str| env::var(format!("SIRSIDYNIX_{suffix}_{name}"));
    let required = |name: &'static str| var(name).map_err(|_| ConfigError::MissingEnvVar(leak(format!("SIRSIDYNIX_{suffix}_{name}"))));

    let server_url = required("SERVER_URL")?;
    let client_id = required("CLIENT_ID")?;
    let library_id = required("LIBRARY_ID")?;

    let mut settings = SirsiDynixSettings::new(server_url, client_id, library_id);

    if let Ok(app_id) = var("APP_ID") {
        settings.sirsi_app_id = app_id;
    }
    if let Ok(suffixes) = var("DISALLOWED_SUFFIXES") {
        settings.disallowed_suffixes = suffixes.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    if let Ok(block) = var("PATRON_STATUS_BLOCK") {
        settings.patron_status_block = block != "false" && block != "0";
    }

    Ok(settings)
}

fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}
