//! A thin wrapper over `reqwest::Client` adding retry/backoff, response-code
//! classification, and Retry-After honoring on top of plain HTTP.
//!
//! Two factories share one request pipeline: [`Client::for_web`] (short
//! timeouts, few redirects, no retries — suitable for the request path) and
//! [`Client::for_worker`] (long timeouts, more redirects, retries on by
//! default — suitable for background import/export tasks).

use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{info, warn};

use crate::error::HttpError;

const DEFAULT_USER_AGENT_VERSION: &str = "1.x.x";
const DEFAULT_ACCEPT: &str = "*/*";

const WEB_TIMEOUT: Duration = Duration::from_secs(5);
const WEB_MAX_REDIRECTS: usize = 2;
const WEB_MAX_RETRIES: u32 = 0;

const WORKER_TIMEOUT: Duration = Duration::from_secs(20);
const WORKER_MAX_REDIRECTS: usize = 20;
const WORKER_MAX_RETRIES: u32 = 3;

/// Maximum delay honored from a `Retry-After` header, regardless of what the
/// server asked for (default 120s — see `RequestOptions::max_retry_after_delay`).
pub const DEFAULT_MAX_RETRY_AFTER_DELAY: Duration = Duration::from_secs(120);

/// A response code, or a whole series such as `5xx`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeMatcher {
    Exact(u16),
    Series(u16),
}

impl CodeMatcher {
    pub fn series(hundreds: u16) -> Self {
        Self::Series(hundreds)
    }

    pub fn matches(&self, status: u16) -> bool {
        match self {
            Self::Exact(code) => *code == status,
            Self::Series(hundreds) => status / 100 == *hundreds,
        }
    }
}

fn any_matches(matchers: &[CodeMatcher], status: u16) -> bool {
    matchers.iter().any(|m| m.matches(status))
}

/// Exponential backoff with jitter: `base^attempt * factor`, jittered by up
/// to `jitter` of the computed delay, capped at `cap`.
pub fn exponential_backoff(attempt: u32) -> Duration {
    exponential_backoff_with(attempt, 2.0, 3.0, 0.5, 45.0)
}

pub fn exponential_backoff_with(attempt: u32, base: f64, factor: f64, jitter: f64, cap: f64) -> Duration {
    let raw = factor * base.powi(attempt as i32);
    let jittered = if jitter > 0.0 {
        let spread = raw * jitter;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        raw + delta
    } else {
        raw
    };
    Duration::from_secs_f64(jittered.clamp(0.0, cap))
}

/// Per-request retry/classification knobs. Defaults come from whichever
/// [`Client`] variant issued the request; any field set here overrides them.
#[derive(Clone)]
pub struct RequestOptions {
    pub allowed_response_codes: Vec<CodeMatcher>,
    pub disallowed_response_codes: Vec<CodeMatcher>,
    pub no_retry_status_codes: Vec<CodeMatcher>,
    pub max_retries: u32,
    pub backoff: fn(u32) -> Duration,
    pub respect_retry_after: bool,
    pub max_retry_after_delay: Duration,
}

impl RequestOptions {
    pub fn for_web() -> Self {
        Self {
            allowed_response_codes: Vec::new(),
            disallowed_response_codes: Vec::new(),
            no_retry_status_codes: Vec::new(),
            max_retries: WEB_MAX_RETRIES,
            backoff: exponential_backoff,
            respect_retry_after: true,
            max_retry_after_delay: DEFAULT_MAX_RETRY_AFTER_DELAY,
        }
    }

    pub fn for_worker() -> Self {
        Self {
            max_retries: WORKER_MAX_RETRIES,
            ..Self::for_web()
        }
    }

    /// Restrict retriable requests to an explicit allowlist (e.g. `["2xx"]`)
    /// instead of the default "anything but 5xx" posture.
    pub fn with_allowed_response_codes(mut self, codes: Vec<CodeMatcher>) -> Self {
        self.allowed_response_codes = codes;
        self
    }
}

/// Which timeout/redirect/retry posture a [`Client`] was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Variant {
    Web,
    Worker,
}

/// An HTTP client with uniform retry, timeout classification, and
/// Retry-After honoring across every outbound call in the service.
#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
    defaults: RequestOptionsTemplate,
    #[allow(dead_code)]
    variant: Variant,
}

/// The subset of [`RequestOptions`] a `Client` carries as its own defaults;
/// individual calls may still override any field via [`RequestOptions`].
#[derive(Clone)]
struct RequestOptionsTemplate {
    max_retries: u32,
    backoff: fn(u32) -> Duration,
    respect_retry_after: bool,
    max_retry_after_delay: Duration,
}

impl Client {
    fn build(variant: Variant, timeout: Duration, max_redirects: usize) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("Atrium Circulation Manager/{DEFAULT_USER_AGENT_VERSION}"))
                .expect("static user agent is valid"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(if max_redirects == 0 {
                reqwest::redirect::Policy::none()
            } else {
                reqwest::redirect::Policy::limited(max_redirects)
            })
            .default_headers(headers)
            .build()
            .expect("reqwest client configuration is always valid");

        let defaults = match variant {
            Variant::Web => {
                let opts = RequestOptions::for_web();
                RequestOptionsTemplate {
                    max_retries: opts.max_retries,
                    backoff: opts.backoff,
                    respect_retry_after: opts.respect_retry_after,
                    max_retry_after_delay: opts.max_retry_after_delay,
                }
            }
            Variant::Worker => {
                let opts = RequestOptions::for_worker();
                RequestOptionsTemplate {
                    max_retries: opts.max_retries,
                    backoff: opts.backoff,
                    respect_retry_after: opts.respect_retry_after,
                    max_retry_after_delay: opts.max_retry_after_delay,
                }
            }
        };

        Self {
            inner,
            defaults,
            variant,
        }
    }

    /// Short timeouts, few redirects, retries disabled — for request-path
    /// calls that must stay inside a request-timeout budget.
    pub fn for_web() -> Self {
        Self::build(Variant::Web, WEB_TIMEOUT, WEB_MAX_REDIRECTS)
    }

    /// Long timeouts, generous redirects, retries on by default — for
    /// background import/export tasks.
    pub fn for_worker() -> Self {
        Self::build(Variant::Worker, WORKER_TIMEOUT, WORKER_MAX_REDIRECTS)
    }

    fn default_options(&self) -> RequestOptions {
        RequestOptions {
            allowed_response_codes: Vec::new(),
            disallowed_response_codes: Vec::new(),
            no_retry_status_codes: Vec::new(),
            max_retries: self.defaults.max_retries,
            backoff: self.defaults.backoff,
            respect_retry_after: self.defaults.respect_retry_after,
            max_retry_after_delay: self.defaults.max_retry_after_delay,
        }
    }

    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.get_with(url, self.default_options()).await
    }

    pub async fn get_with(&self, url: &str, options: RequestOptions) -> Result<Response, HttpError> {
        self.request_with(Method::GET, url, options, |b| b).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Response, HttpError> {
        self.request_with(Method::POST, url, self.default_options(), |b| b.json(body))
            .await
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<Response, HttpError> {
        self.request_with(Method::POST, url, self.default_options(), |b| b.form(form))
            .await
    }

    /// Issue a request, applying `build` to the [`RequestBuilder`] before
    /// sending, retrying according to `options` on retriable failure.
    ///
    /// On each iteration: perform the send, classify the outcome, and
    /// either return it or sleep and loop back to re-send. `attempt` is the
    /// zero-based retry count already spent, attached to whatever error is
    /// ultimately returned.
    pub async fn request_with<F>(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
        build: F,
    ) -> Result<Response, HttpError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            let request = build(self.inner.request(method.clone(), url));
            let outcome = self.send_and_classify(request, url, &options, attempt).await;
            match outcome {
                Outcome::Success(response) => return Ok(response),
                Outcome::Retry { delay, .. } => {
                    warn!(url, attempt, ?delay, "retrying request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Outcome::Fail(err) => return Err(err),
            }
        }
    }

    async fn send_and_classify(
        &self,
        request: RequestBuilder,
        url: &str,
        options: &RequestOptions,
        attempt: u32,
    ) -> Outcome {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = if e.is_timeout() {
                    HttpError::TimedOut {
                        url: url.to_string(),
                        retries: attempt,
                    }
                } else {
                    HttpError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                        retries: attempt,
                    }
                };
                return self.retry_decision(options, attempt, err, None);
            }
        };

        let status = response.status();
        info!(url, status = status.as_u16(), attempt, "request completed");

        if self.is_allowed(status, options) {
            return Outcome::Success(response);
        }

        let retry_after = parse_retry_after(&response);
        let body_preview = preview_body(response).await;
        let err = HttpError::BadResponse {
            url: url.to_string(),
            status: status.as_u16(),
            body_preview,
            retries: attempt,
        };
        self.retry_decision(options, attempt, err, retry_after)
    }

    fn retry_decision(
        &self,
        options: &RequestOptions,
        attempt: u32,
        err: HttpError,
        retry_after: Option<Duration>,
    ) -> Outcome {
        if let Some(status) = err.status() {
            if any_matches(&options.no_retry_status_codes, status) {
                return Outcome::Fail(err);
            }
        }
        if attempt >= options.max_retries {
            return Outcome::Fail(err);
        }

        let mut delay = (options.backoff)(attempt);
        if options.respect_retry_after {
            if let Some(retry_after) = retry_after {
                delay = delay.max(retry_after.min(options.max_retry_after_delay));
            }
        }
        Outcome::Retry { delay, err }
    }

    fn is_allowed(&self, status: StatusCode, options: &RequestOptions) -> bool {
        if !options.allowed_response_codes.is_empty() {
            return any_matches(&options.allowed_response_codes, status.as_u16());
        }
        !status.is_server_error()
            && !any_matches(&options.disallowed_response_codes, status.as_u16())
    }
}

enum Outcome {
    Success(Response),
    Retry { delay: Duration, #[allow(dead_code)] err: HttpError },
    Fail(HttpError),
}

/// Parse the `Retry-After` header as either a delta-seconds integer or an
/// HTTP-date. Returns `None` if absent or unparseable.
fn parse_retry_after(response: &Response) -> Option<Duration> {
    let raw = response.headers().get(reqwest::header::RETRY_AFTER)?;
    let raw = raw.to_str().ok()?;
    if let Ok(seconds) = raw.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = chrono::NaiveDateTime::parse_from_str(raw.trim(), "%a, %d %b %Y %H:%M:%S GMT").ok()?;
    let when = chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(when, chrono::Utc);
    let delta = when.signed_duration_since(chrono::Utc::now());
    delta.to_std().ok()
}

async fn preview_body(response: Response) -> String {
    match response.text().await {
        Ok(text) => text.chars().take(2000).collect(),
        Err(_) => String::new(),
    }
}
