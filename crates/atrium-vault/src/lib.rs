//! Time-bounded access-token cache for upstream OAuth-protected services.
//!
//! Each upstream of OAuth type gets one cached `{access_token, expires_at,
//! refresh_token?}`. [`CredentialVault::get`] returns the current token,
//! refreshing on first use or within a 30-second safety window before
//! expiry. A 401 observed while calling out through [`CredentialVault::call_with_auth`]
//! forces exactly one refresh-and-retry; a second 401 propagates unchanged.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

/// The safety window before `expires_at` within which `get` proactively
/// refreshes rather than handing out a token that might expire mid-flight.
const REFRESH_SAFETY_WINDOW: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct Token {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
}

impl Token {
    fn needs_refresh(&self) -> bool {
        let safety = chrono::Duration::from_std(REFRESH_SAFETY_WINDOW).expect("constant fits");
        Utc::now() + safety >= self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("token refresh failed for {upstream}: {message}")]
    RefreshFailed { upstream: String, message: String },
    #[error(transparent)]
    Http(#[from] atrium_http::HttpError),
}

type RefreshFuture = Pin<Box<dyn Future<Output = Result<Token, VaultError>> + Send>>;

/// Fetches or refreshes a token for one upstream. Implemented per OAuth
/// provider (client-credentials grant, refresh-token grant, etc.).
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self, upstream: &str, previous: Option<&Token>) -> RefreshFuture;
}

pub struct CredentialVault {
    refresher: Arc<dyn TokenRefresher>,
    cache: Mutex<HashMap<String, Token>>,
}

impl CredentialVault {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            refresher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return the current token for `upstream`, refreshing if missing or
    /// inside the safety window.
    pub async fn get(&self, upstream: &str) -> Result<Token, VaultError> {
        let mut cache = self.cache.lock().await;
        let needs_refresh = match cache.get(upstream) {
            Some(token) => token.needs_refresh(),
            None => true,
        };
        if !needs_refresh {
            return Ok(cache.get(upstream).expect("checked above").clone());
        }
        let previous = cache.get(upstream).cloned();
        let fresh = self.refresher.refresh(upstream, previous.as_ref()).await?;
        cache.insert(upstream.to_string(), fresh.clone());
        Ok(fresh)
    }

    /// Force a refresh regardless of expiry — used after observing a 401.
    async fn force_refresh(&self, upstream: &str) -> Result<Token, VaultError> {
        let mut cache = self.cache.lock().await;
        let previous = cache.get(upstream).cloned();
        let fresh = self.refresher.refresh(upstream, previous.as_ref()).await?;
        cache.insert(upstream.to_string(), fresh.clone());
        Ok(fresh)
    }

    /// Run `call` with the current token; if it reports a 401 via
    /// `atrium_http::HttpError::BadResponse { status: 401, .. }`, force one
    /// refresh and retry exactly once. A second 401 propagates unchanged.
    pub async fn call_with_auth<F, Fut, T>(&self, upstream: &str, call: F) -> Result<T, VaultError>
    where
        F: Fn(Token) -> Fut,
        Fut: Future<Output = Result<T, atrium_http::HttpError>>,
    {
        let token = self.get(upstream).await?;
        match call(token).await {
            Ok(value) => Ok(value),
            Err(err) if err.status() == Some(401) => {
                let refreshed = self.force_refresh(upstream).await?;
                call(refreshed).await.map_err(VaultError::from)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
    }

    impl TokenRefresher for CountingRefresher {
        fn refresh(&self, _upstream: &str, _previous: Option<&Token>) -> RefreshFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(Token {
                    access_token: "tok".to_string(),
                    expires_at: Utc::now() + chrono::Duration::hours(1),
                    refresh_token: None,
                })
            })
        }
    }

    #[tokio::test]
    async fn refreshes_once_on_first_use_then_caches() {
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });
        let vault = CredentialVault::new(refresher.clone());
        vault.get("overdrive").await.unwrap();
        vault.get("overdrive").await.unwrap();
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn near_expiry_token_is_refreshed() {
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });
        let vault = CredentialVault::new(refresher.clone());
        {
            let mut cache = vault.cache.lock().await;
            cache.insert(
                "overdrive".to_string(),
                Token {
                    access_token: "stale".to_string(),
                    expires_at: Utc::now() + chrono::Duration::seconds(10),
                    refresh_token: None,
                },
            );
        }
        let token = vault.get("overdrive").await.unwrap();
        assert_eq!(token.access_token, "tok");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unauthorized_response_triggers_one_retry() {
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });
        let vault = CredentialVault::new(refresher);
        let attempt = AtomicUsize::new(0);
        let result = vault
            .call_with_auth("overdrive", |_token| {
                let n = attempt.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(atrium_http::HttpError::BadResponse {
                            url: "https://example.com".to_string(),
                            status: 401,
                            body_preview: String::new(),
                            retries: 0,
                        })
                    } else {
                        Ok("ok".to_string())
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(attempt.load(Ordering::SeqCst), 2);
    }
}
