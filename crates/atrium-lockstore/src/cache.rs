//! Plain TTL'd key-value caching alongside the CAS-protected lease
//! mechanism in [`crate::lease`] — used for OIDC discovery documents, JWKS,
//! PKCE verifiers, and state tokens (§4.6), none of which need the fencing
//! semantics leases provide, just "store for N seconds, optionally consume
//! once".

use redis::aio::ConnectionManager;
use redis::RedisResult;

#[derive(Clone)]
pub struct CacheStore {
    conn: ConnectionManager,
    prefix: String,
}

impl CacheStore {
    pub fn new(conn: ConnectionManager, installation_prefix: impl Into<String>) -> Self {
        Self { conn, prefix: installation_prefix.into() }
    }

    pub fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Store `value` under `key` with an expiry of `ttl_secs` seconds,
    /// overwriting whatever was there.
    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(self.namespaced(key))
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
    }

    pub async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET").arg(self.namespaced(key)).query_async(&mut conn).await
    }

    /// Read and delete `key` in one round trip — used for state tokens,
    /// which the OIDC callback consumes exactly once.
    pub async fn take(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GETDEL").arg(self.namespaced(key)).query_async(&mut conn).await
    }
}
