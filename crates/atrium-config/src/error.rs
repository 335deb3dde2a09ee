use thiserror::Error;

/// Raised while assembling a config struct from environment variables or
/// admin-supplied settings. Each variant names the field that failed so an
/// operator can fix the one setting at fault rather than re-reading the
/// whole subsystem's configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(&'static str),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("incomplete configuration: {0}")]
    IncompleteConfiguration(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue { field, message: message.into() }
    }
}
