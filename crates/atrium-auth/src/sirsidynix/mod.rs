pub mod provider;

pub use provider::SirsiDynixAuthenticationProvider;

pub const DEFAULT_APP_ID: &str = "PALACE";

/// Per-library settings for one SirsiDynix Horizon Web Services endpoint.
#[derive(Clone, Debug)]
pub struct SirsiDynixSettings {
    /// Base server URL, always treated as ending in `/` for `url::Url::join`.
    pub server_url: String,
    pub client_id: String,
    /// `SD-Originating-App-Id` header value. Defaults to [`DEFAULT_APP_ID`];
    /// SirsiDynix recommend setting an app-specific identifier here.
    pub sirsi_app_id: String,
    pub library_id: String,
    /// A patron whose type ends in one of these suffixes is authenticated
    /// but marked blocked, e.g. type `cls` with a disallowed suffix `ls`.
    pub disallowed_suffixes: Vec<String>,
    pub patron_status_block: bool,
}

impl SirsiDynixSettings {
    pub fn new(server_url: impl Into<String>, client_id: impl Into<String>, library_id: impl Into<String>) -> Self {
        let mut server_url = server_url.into();
        if !server_url.ends_with('/') {
            server_url.push('/');
        }
        Self {
            server_url,
            client_id: client_id.into(),
            sirsi_app_id: DEFAULT_APP_ID.to_string(),
            library_id: library_id.into(),
            disallowed_suffixes: Vec::new(),
            patron_status_block: true,
        }
    }
}
