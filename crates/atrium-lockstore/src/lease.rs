//! Named leases with fencing tokens, backed by a Redis-like key-value
//! service with a JSON-document module (the RedisJSON command family).
//!
//! A lease is a JSON document `{"lock": "<nonce>", ...}` created only if
//! `lock` is absent; the server enforces the TTL. Every mutation on a leased
//! key happens inside a `WATCH`/`MULTI`/`EXEC` transaction that re-reads
//! `lock` and a tenant-specific `update_number`, refuses to commit on a
//! mismatch, and on success increments `update_number` and refreshes the
//! TTL in the same round trip.

use rand::RngCore;
use redis::aio::ConnectionManager;
use redis::{RedisResult, Value};

/// A successfully-acquired lease. Holding one proves fencing-token
/// ownership of `key` until the TTL expires or [`LockStore::release`] is
/// called with the same token.
#[derive(Clone, Debug)]
pub struct Lease {
    pub key: String,
    pub fencing_token: String,
}

/// Thin wrapper over a Redis connection, namespacing every key by an
/// installation prefix.
#[derive(Clone)]
pub struct LockStore {
    conn: ConnectionManager,
    prefix: String,
}

impl LockStore {
    pub fn new(conn: ConnectionManager, installation_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: installation_prefix.into(),
        }
    }

    pub fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn random_nonce() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Acquire a lease on `key`, creating the backing document with
    /// `initial_value` if it does not yet exist. Returns `None` if another
    /// holder's lock is already present and unexpired.
    pub async fn acquire(
        &self,
        key: &str,
        ttl_ms: u64,
        initial_value: &serde_json::Value,
    ) -> RedisResult<Option<Lease>> {
        let full_key = self.namespaced(key);
        let mut conn = self.conn.clone();
        let nonce = Self::random_nonce();

        // Create the document if absent; a no-op if it already exists.
        let _: Value = redis::cmd("JSON.SET")
            .arg(&full_key)
            .arg("$")
            .arg(initial_value.to_string())
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        // Claim the lock field only if nobody holds it.
        let set_result: Value = redis::cmd("JSON.SET")
            .arg(&full_key)
            .arg("$.lock")
            .arg(serde_json::Value::String(nonce.clone()).to_string())
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        if matches!(set_result, Value::Nil) {
            return Ok(None);
        }

        let _: Value = redis::cmd("PEXPIRE")
            .arg(&full_key)
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        Ok(Some(Lease {
            key: full_key,
            fencing_token: nonce,
        }))
    }

    /// Release a lease, but only if it is still held by `lease`'s token —
    /// a lease that already expired and was re-acquired by someone else is
    /// left untouched.
    pub async fn release(&self, lease: &Lease) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        let current: Option<String> = self.read_json_string(&lease.key, "$.lock").await?;
        if current.as_deref() == Some(lease.fencing_token.as_str()) {
            let _: Value = redis::cmd("JSON.DEL")
                .arg(&lease.key)
                .arg("$.lock")
                .query_async(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn json_get_scalar(&self, full_key: &str, path: &str) -> RedisResult<Option<String>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(full_key)
            .arg(path)
            .query_async(&mut conn)
            .await?;
        Ok(raw)
    }

    pub async fn read_json_string(&self, full_key: &str, path: &str) -> RedisResult<Option<String>> {
        let raw = self.json_get_scalar(full_key, path).await?;
        Ok(raw
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
            .and_then(|v| v.as_str().map(str::to_owned)))
    }

    pub async fn read_json_u64(&self, full_key: &str, path: &str) -> RedisResult<Option<u64>> {
        let raw = self.json_get_scalar(full_key, path).await?;
        Ok(raw
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
            .and_then(|v| v.as_u64()))
    }

    pub(crate) fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

/// Verify that no slot in a multi-result pipeline reply is a `None`/error —
/// mirrors the Python `_validate_results` check against partial-failure
/// replies from managed RedisJSON deployments.
pub fn validate_results(results: &[Value]) -> bool {
    results.iter().all(|r| !matches!(r, Value::Nil))
}
