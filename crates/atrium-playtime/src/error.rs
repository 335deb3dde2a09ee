use thiserror::Error;

use atrium_core::ProblemDetail;

#[derive(Debug, Error)]
pub enum PlaytimeError {
    #[error("playtime store error: {0}")]
    Store(String),

    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
}

impl PlaytimeError {
    pub fn problem_detail(&self) -> ProblemDetail {
        let (title, status) = match self {
            Self::Store(_) => ("Playtime store query failed", 500),
            Self::Csv(_) => ("Report generation failed", 500),
        };
        ProblemDetail { title: title.to_string(), detail: self.to_string(), status }
    }
}
