//! Per-collection MARC Upload Session state, stored as one JSON document
//! under a key derived from the collection id. Holds the in-progress S3
//! multipart upload bookkeeping (`uploads`: map of s3-key → buffer/upload
//! id/parts) plus the CAS `update_number` and a coarse `state` label.
//!
//! Every mutating method here re-validates the fencing token and
//! `update_number` inside a single `WATCH`/`MULTI`/`EXEC` round trip (see
//! [`crate::lease`]), so two workers racing for the same collection can
//! never silently interleave writes.

use std::collections::HashMap;

use redis::{RedisResult, Value};
use serde::{Deserialize, Serialize};

use crate::error::MarcFileUploadSessionError;
use crate::escape::{escape_path, unescape_path};
use crate::lease::{validate_results, Lease, LockStore};

pub const LOCK_TIMEOUT_MS: u64 = 20 * 60 * 1000;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultipartUploadPart {
    pub part_number: i32,
    pub e_tag: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MarcFileUpload {
    #[serde(default)]
    pub buffer: String,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub parts: Vec<MultipartUploadPart>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarcFileUploadState {
    Initial,
    Queued,
    Uploading,
}

fn upload_path(upload_key: &str) -> String {
    format!("$.uploads[\"{}\"]", escape_path(upload_key))
}

fn buffer_path(upload_key: &str) -> String {
    format!("{}.buffer", upload_path(upload_key))
}

fn upload_id_path(upload_key: &str) -> String {
    format!("{}.upload_id", upload_path(upload_key))
}

fn parts_path(upload_key: &str) -> String {
    format!("{}.parts", upload_path(upload_key))
}

/// A leased handle to one collection's MARC upload session state.
pub struct MarcUploadSession {
    store: LockStore,
    lease: Lease,
    update_number: u64,
}

impl MarcUploadSession {
    /// Acquire the per-collection lease, creating the backing document
    /// (`{"uploads": {}, "update_number": 0, "state": "initial"}`) if this
    /// is the first export for the collection.
    pub async fn acquire(store: LockStore, collection_id: &str) -> RedisResult<Option<Self>> {
        let key = format!("marc_upload_session:{collection_id}");
        let initial = serde_json::json!({
            "uploads": {},
            "update_number": 0,
            "state": MarcFileUploadState::Initial,
            "cursor": null,
        });
        let lease = store.acquire(&key, LOCK_TIMEOUT_MS, &initial).await?;
        Ok(lease.map(|lease| Self {
            store,
            lease,
            update_number: 0,
        }))
    }

    pub fn update_number(&self) -> u64 {
        self.update_number
    }

    fn upload_path(&self, upload_key: &str) -> String {
        upload_path(upload_key)
    }

    fn buffer_path(&self, upload_key: &str) -> String {
        buffer_path(upload_key)
    }

    fn upload_id_path(&self, upload_key: &str) -> String {
        upload_id_path(upload_key)
    }

    fn parts_path(&self, upload_key: &str) -> String {
        parts_path(upload_key)
    }

    /// Re-read `lock`/`update_number`, fail fast on mismatch, then run
    /// `commands` inside MULTI/EXEC, incrementing `update_number` by
    /// `increments` and refreshing the lease TTL atomically with it.
    async fn cas_execute(
        &mut self,
        state: MarcFileUploadState,
        increments: i64,
        mut build: impl FnMut(&mut redis::Pipeline, &Self),
    ) -> Result<Vec<Value>, MarcFileUploadSessionError> {
        let mut conn = self.store.conn();
        let key = self.lease.key.clone();

        redis::cmd("WATCH")
            .arg(&key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(crate::error::LockError::from)?;

        let remote_lock = self.store.read_json_string(&key, "$.lock").await.map_err(crate::error::LockError::from)?;
        if remote_lock.as_deref() != Some(self.lease.fencing_token.as_str()) {
            return Err(crate::error::LockError::FencingMismatch {
                expected: self.lease.fencing_token.clone(),
                got: remote_lock,
            }
            .into());
        }
        let remote_update_number = self.store.read_json_u64(&key, "$.update_number").await.map_err(crate::error::LockError::from)?;
        if remote_update_number != Some(self.update_number) {
            return Err(crate::error::LockError::UpdateNumberMismatch {
                expected: self.update_number,
                got: remote_update_number,
            }
            .into());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        build(&mut pipe, self);
        pipe.cmd("JSON.SET")
            .arg(&key)
            .arg("$.state")
            .arg(serde_json::to_string(&state).unwrap());
        pipe.cmd("JSON.NUMINCRBY")
            .arg(&key)
            .arg("$.update_number")
            .arg(increments);
        pipe.cmd("PEXPIRE").arg(&key).arg(LOCK_TIMEOUT_MS);

        let results: Option<Vec<Value>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(crate::error::LockError::from)?;

        let results = results.ok_or(crate::error::LockError::WatchConflict)?;
        if !validate_results(&results) {
            return Err(MarcFileUploadSessionError::PipelineValidation(
                "one or more commands in the session pipeline failed".to_string(),
            ));
        }

        self.update_number += increments.max(0) as u64;
        Ok(results)
    }

    /// Atomically either appends to an existing buffer or creates a new
    /// upload entry, for every `(key, bytes)` pair in `updates`. Returns
    /// the resulting buffer length for each key.
    pub async fn append_buffers(
        &mut self,
        updates: &HashMap<String, String>,
    ) -> Result<HashMap<String, usize>, MarcFileUploadSessionError> {
        if updates.is_empty() {
            return Ok(HashMap::new());
        }
        let updates = updates.clone();
        let lengths: HashMap<String, usize> = updates.iter().map(|(k, v)| (k.clone(), v.len())).collect();

        let existing = self.known_upload_keys().await?;

        self.cas_execute(MarcFileUploadState::Uploading, updates.len() as i64, |pipe, this| {
            for (key, value) in &updates {
                if value.is_empty() {
                    continue;
                }
                if existing.contains(key) {
                    pipe.cmd("JSON.STRAPPEND")
                        .arg(&this.lease.key)
                        .arg(this.buffer_path(key))
                        .arg(serde_json::to_string(value).unwrap());
                } else {
                    let initial = MarcFileUpload {
                        buffer: value.clone(),
                        upload_id: None,
                        parts: Vec::new(),
                    };
                    pipe.cmd("JSON.SET")
                        .arg(&this.lease.key)
                        .arg(this.upload_path(key))
                        .arg(serde_json::to_string(&initial).unwrap());
                }
            }
        })
        .await?;

        Ok(lengths)
    }

    /// Append a completed part descriptor and empty the buffer for `key`.
    pub async fn add_part_and_clear_buffer(
        &mut self,
        key: &str,
        part: MultipartUploadPart,
    ) -> Result<(), MarcFileUploadSessionError> {
        let key = key.to_string();
        self.cas_execute(MarcFileUploadState::Uploading, 1, |pipe, this| {
            pipe.cmd("JSON.ARRAPPEND")
                .arg(&this.lease.key)
                .arg(this.parts_path(&key))
                .arg(serde_json::to_string(&part).unwrap());
            pipe.cmd("JSON.SET")
                .arg(&this.lease.key)
                .arg(this.buffer_path(&key))
                .arg("\"\"");
        })
        .await?;
        Ok(())
    }

    /// Set the multipart upload id for `key`, but only if absent.
    pub async fn set_upload_id(&mut self, key: &str, upload_id: &str) -> Result<(), MarcFileUploadSessionError> {
        let key = key.to_string();
        let upload_id = upload_id.to_string();
        self.cas_execute(MarcFileUploadState::Uploading, 1, |pipe, this| {
            pipe.cmd("JSON.SET")
                .arg(&this.lease.key)
                .arg(this.upload_id_path(&key))
                .arg(serde_json::to_string(&upload_id).unwrap())
                .arg("NX");
        })
        .await?;
        Ok(())
    }

    pub async fn clear_uploads(&mut self) -> Result<(), MarcFileUploadSessionError> {
        self.cas_execute(MarcFileUploadState::Initial, 1, |pipe, this| {
            pipe.cmd("JSON.CLEAR").arg(&this.lease.key).arg("$.uploads");
        })
        .await?;
        Ok(())
    }

    /// The s3-keys this session already has buffer/upload state for —
    /// either from earlier in this run or from a prior attempt whose
    /// lease expired mid-export. A new owner uses this to decide whether
    /// to reuse a library/artifact's existing key or mint a fresh one.
    pub async fn known_keys(&self) -> Result<Vec<String>, MarcFileUploadSessionError> {
        self.known_upload_keys().await
    }

    async fn known_upload_keys(&self) -> Result<Vec<String>, MarcFileUploadSessionError> {
        let mut conn = self.store.conn();
        let raw: Option<String> = redis::cmd("JSON.OBJKEYS")
            .arg(&self.lease.key)
            .arg("$.uploads")
            .query_async(&mut conn)
            .await
            .map_err(crate::error::LockError::from)?;
        let Some(raw) = raw else { return Ok(Vec::new()) };
        let keys: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
        keys.into_iter().map(|k| unescape_path(&k).map_err(Into::into)).collect()
    }

    /// Fetch the current buffer and uploaded-part count for `key` — used
    /// after a lease hand-off to resume a partially-completed export.
    pub async fn part_count_and_buffer(&self, key: &str) -> Result<(usize, String), MarcFileUploadSessionError> {
        let mut conn = self.store.conn();
        let mut pipe = redis::pipe();
        pipe.cmd("JSON.GET").arg(&self.lease.key).arg(self.buffer_path(key));
        pipe.cmd("JSON.ARRLEN").arg(&self.lease.key).arg(self.parts_path(key));
        let (buffer, count): (Option<String>, Option<i64>) = pipe
            .query_async(&mut conn)
            .await
            .map_err(crate::error::LockError::from)?;

        let buffer = buffer
            .and_then(|s| serde_json::from_str::<String>(&s).ok())
            .unwrap_or_default();
        Ok((count.unwrap_or(0).max(0) as usize, buffer))
    }

    pub async fn get_upload_ids(&self, keys: &[String]) -> Result<HashMap<String, String>, MarcFileUploadSessionError> {
        let mut conn = self.store.conn();
        let mut out = HashMap::new();
        for key in keys {
            let raw: Option<String> = redis::cmd("JSON.GET")
                .arg(&self.lease.key)
                .arg(self.upload_id_path(key))
                .query_async(&mut conn)
                .await
                .map_err(crate::error::LockError::from)?;
            if let Some(raw) = raw {
                if let Ok(id) = serde_json::from_str::<String>(&raw) {
                    out.insert(key.clone(), id);
                }
            }
        }
        Ok(out)
    }

    /// Persist the id of the last work whose MARC bytes were fully folded
    /// into an uploaded (or buffered) part, so a new lease holder resuming
    /// this attempt knows where to restart `query_works` from (§4.7
    /// Failure and resumption) rather than re-streaming works already
    /// accounted for in the session's buffers.
    pub async fn set_cursor(&mut self, work_id: &str) -> Result<(), MarcFileUploadSessionError> {
        let work_id = work_id.to_string();
        self.cas_execute(MarcFileUploadState::Uploading, 1, |pipe, this| {
            pipe.cmd("JSON.SET")
                .arg(&this.lease.key)
                .arg("$.cursor")
                .arg(serde_json::to_string(&work_id).unwrap());
        })
        .await?;
        Ok(())
    }

    pub async fn cursor(&self) -> Result<Option<String>, MarcFileUploadSessionError> {
        self.store
            .read_json_string(&self.lease.key, "$.cursor")
            .await
            .map_err(|e| crate::error::LockError::from(e).into())
    }

    pub async fn release(self) -> RedisResult<()> {
        self.store.release(&self.lease).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_paths_escape_reserved_characters() {
        assert_eq!(
            buffer_path("library/full.mrc"),
            "$.uploads[\"library`sfull.mrc\"].buffer"
        );
        assert_eq!(
            upload_id_path("a"),
            "$.uploads[\"a\"].upload_id"
        );
        assert_eq!(parts_path("a"), "$.uploads[\"a\"].parts");
    }
}
