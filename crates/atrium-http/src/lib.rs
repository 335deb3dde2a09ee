pub mod client;
pub mod error;

pub use client::{exponential_backoff, CodeMatcher, Client, RequestOptions};
pub use error::{HttpError, ProblemDetail};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn code_matcher_series_matches_whole_hundred() {
        let matcher = CodeMatcher::series(5);
        assert!(matcher.matches(503));
        assert!(matcher.matches(500));
        assert!(!matcher.matches(404));
    }

    #[test]
    fn backoff_stays_within_cap() {
        for attempt in 0..10 {
            let delay = exponential_backoff(attempt);
            assert!(delay <= Duration::from_secs(45));
        }
    }
}
