use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpdsError {
    #[error("failed to fetch feed from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: atrium_http::HttpError,
    },

    #[error("failed to parse feed from {url}: {message}")]
    Parse { url: String, message: String },
}
