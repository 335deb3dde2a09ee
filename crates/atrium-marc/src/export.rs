//! The MARC Export Engine (§4.7): per (library, collection) pair, stream a
//! full MARC file and — once a prior full export exists — a delta file
//! covering only works updated since that full's creation, buffering
//! generated bytes and flushing them to S3 multipart parts under the
//! per-collection upload-session lease from `atrium-lockstore`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use atrium_core::catalog::Collection;
use atrium_lockstore::{LockStore, MarcUploadSession, MultipartUploadPart};

use crate::annotator::{library_marc_record, marc_record};
use crate::error::MarcError;
use crate::s3::{MarcObjectStore, MULTIPART_MIN_PART_SIZE};
use crate::store::{LibraryExportConfig, MarcCatalogStore, MarcFileRecord};

const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Artifact {
    Full,
    Delta,
}

impl Artifact {
    fn revised(self) -> bool {
        matches!(self, Artifact::Delta)
    }
}

/// One (library, artifact) target this export attempt is writing to.
struct Target {
    library: LibraryExportConfig,
    artifact: Artifact,
    key: String,
    since: Option<DateTime<Utc>>,
}

pub struct MarcExportEngine {
    lock_store: LockStore,
    object_store: Arc<dyn MarcObjectStore>,
    catalog: Arc<dyn MarcCatalogStore>,
    bucket: String,
    batch_size: usize,
}

impl MarcExportEngine {
    pub fn new(lock_store: LockStore, object_store: Arc<dyn MarcObjectStore>, catalog: Arc<dyn MarcCatalogStore>, bucket: impl Into<String>) -> Self {
        Self {
            lock_store,
            object_store,
            catalog,
            bucket: bucket.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Export one collection's enabled libraries, returning one
    /// `MarcFileRecord` per artifact uploaded. Acquires the per-collection
    /// lease for the duration of the run; returns `LeaseUnavailable` if
    /// another worker already holds it.
    pub async fn export_collection(&self, collection_id: &str) -> Result<Vec<MarcFileRecord>, MarcError> {
        let pairs = self.catalog.enabled_collections_and_libraries(Some(collection_id)).await?;
        let Some((collection, _)) = pairs.first().cloned() else {
            return Ok(Vec::new());
        };
        let libraries: Vec<LibraryExportConfig> = pairs.into_iter().map(|(_, lib)| lib).collect();

        let mut session = MarcUploadSession::acquire(self.lock_store.clone(), collection_id)
            .await
            .map_err(|e| MarcError::Lock(e.into()))?
            .ok_or_else(|| MarcError::LeaseUnavailable { collection_id: collection_id.to_string() })?;

        let result = self.run_export(&mut session, &collection, libraries).await;

        match &result {
            Ok(_) => {
                if let Err(err) = session.clear_uploads().await {
                    warn!(collection_id, error = %err, "failed to clear MARC upload session after a successful export");
                }
            }
            Err(err) => warn!(collection_id, error = %err, "MARC export aborted; session state left intact for the next attempt"),
        }

        if let Err(err) = session.release().await {
            warn!(collection_id, error = %err, "failed to release MARC export lease");
        }

        result
    }

    /// Build the S3 key for one (library, artifact) target, reusing an
    /// already-known key from a prior (crashed) attempt at this same run
    /// when one exists, so resumption finds its buffer/part state.
    fn reuse_or_mint_key(known_keys: &[String], library_short_name: &str, collection_name: &str, artifact_label: &str) -> String {
        let prefix = format!("marc/{library_short_name}/{collection_name}.{artifact_label}.");
        if let Some(existing) = known_keys.iter().find(|k| k.starts_with(&prefix)) {
            return existing.clone();
        }
        format!("{prefix}{}.mrc", Uuid::new_v4())
    }

    async fn run_export(&self, session: &mut MarcUploadSession, collection: &Collection, libraries: Vec<LibraryExportConfig>) -> Result<Vec<MarcFileRecord>, MarcError> {
        let today = Utc::now();
        let date_stamp = today.format("%Y-%m-%d").to_string();
        let known_keys = session.known_keys().await.map_err(MarcError::Session)?;

        let mut last_exports = HashMap::new();
        for library in &libraries {
            let last = self.catalog.last_export_time(&library.library_id, &collection.id).await?;
            last_exports.insert(library.library_id.clone(), last);
        }

        let full_label = format!("full.{date_stamp}");
        let mut targets = Vec::new();
        for library in &libraries {
            let full_key = Self::reuse_or_mint_key(&known_keys, &library.library_short_name, &collection.name, &full_label);
            targets.push(Target { library: library.clone(), artifact: Artifact::Full, key: full_key, since: None });

            if let Some(Some(since)) = last_exports.get(&library.library_id) {
                let artifact_label = format!("delta.{}.{date_stamp}", since.format("%Y-%m-%d"));
                let delta_key = Self::reuse_or_mint_key(&known_keys, &library.library_short_name, &collection.name, &artifact_label);
                targets.push(Target { library: library.clone(), artifact: Artifact::Delta, key: delta_key, since: Some(*since) });
            }
        }

        let mut local_buffers: HashMap<String, String> = HashMap::new();
        let mut upload_ids: HashMap<String, String> = HashMap::new();
        let mut parts: HashMap<String, Vec<MultipartUploadPart>> = HashMap::new();
        for target in &targets {
            let (part_count, buffer) = session.part_count_and_buffer(&target.key).await.map_err(MarcError::Session)?;
            local_buffers.insert(target.key.clone(), buffer);
            parts.entry(target.key.clone()).or_default();
            if part_count > 0 {
                if let Some(id) = session.get_upload_ids(&[target.key.clone()]).await.map_err(MarcError::Session)?.get(&target.key) {
                    upload_ids.insert(target.key.clone(), id.clone());
                }
            }
        }

        let mut cursor = session.cursor().await.map_err(MarcError::Session)?;

        loop {
            let batch = self.catalog.query_works(&collection.id, cursor.as_deref(), self.batch_size).await?;
            if batch.is_empty() {
                break;
            }

            for (work, pool) in &batch {
                let base = marc_record(work, pool);
                let identifier_urn = pool.identifier.urn();

                let mut appends: HashMap<String, String> = HashMap::new();
                for target in &targets {
                    if let (Artifact::Delta, Some(since)) = (target.artifact, target.since) {
                        let updated = work.last_update_time.unwrap_or(since);
                        if updated < since {
                            continue;
                        }
                    }

                    let mut record = library_marc_record(
                        &base,
                        &identifier_urn,
                        &target.library.opds_base_url,
                        &target.library.library_short_name,
                        &target.library.web_client_urls,
                        target.library.organization_code.as_deref(),
                        target.library.include_summary,
                        target.library.include_genres,
                    );
                    record.set_revised(target.artifact.revised());

                    let bytes = record.as_marc();
                    let text = String::from_utf8(bytes).map_err(|e| MarcError::Store(e.to_string()))?;
                    appends.insert(target.key.clone(), text);
                }

                if !appends.is_empty() {
                    session.append_buffers(&appends).await.map_err(MarcError::Session)?;
                    for (key, text) in appends {
                        local_buffers.entry(key).or_default().push_str(&text);
                    }
                }

                for target in &targets {
                    self.flush_if_over_threshold(session, target, &mut local_buffers, &mut upload_ids, &mut parts).await?;
                }

                session.set_cursor(&work.id).await.map_err(MarcError::Session)?;
                cursor = Some(work.id.clone());
            }
        }

        let mut manifests = Vec::new();
        for target in &targets {
            let record = self
                .finalize_target(session, target, &collection.id, &mut local_buffers, &mut upload_ids, &mut parts, today)
                .await?;
            if let Some(record) = record {
                manifests.push(record);
            }
        }

        Ok(manifests)
    }

    async fn flush_if_over_threshold(
        &self,
        session: &mut MarcUploadSession,
        target: &Target,
        local_buffers: &mut HashMap<String, String>,
        upload_ids: &mut HashMap<String, String>,
        parts: &mut HashMap<String, Vec<MultipartUploadPart>>,
    ) -> Result<(), MarcError> {
        let buffer_len = local_buffers.get(&target.key).map(|b| b.len()).unwrap_or(0);
        if buffer_len < MULTIPART_MIN_PART_SIZE {
            return Ok(());
        }
        self.upload_part(session, target, local_buffers, upload_ids, parts).await
    }

    async fn upload_part(
        &self,
        session: &mut MarcUploadSession,
        target: &Target,
        local_buffers: &mut HashMap<String, String>,
        upload_ids: &mut HashMap<String, String>,
        parts: &mut HashMap<String, Vec<MultipartUploadPart>>,
    ) -> Result<(), MarcError> {
        let buffer = local_buffers.get(&target.key).cloned().unwrap_or_default();
        if buffer.is_empty() {
            return Ok(());
        }

        let upload_id = match upload_ids.get(&target.key) {
            Some(id) => id.clone(),
            None => {
                let id = self.object_store.create_multipart_upload(&self.bucket, &target.key).await?;
                session.set_upload_id(&target.key, &id).await.map_err(MarcError::Session)?;
                upload_ids.insert(target.key.clone(), id.clone());
                id
            }
        };

        let part_number = parts.get(&target.key).map(|p| p.len()).unwrap_or(0) as i32 + 1;
        let part = self
            .object_store
            .upload_part(&self.bucket, &target.key, &upload_id, part_number, buffer.into_bytes())
            .await?;

        session.add_part_and_clear_buffer(&target.key, part.clone()).await.map_err(MarcError::Session)?;
        parts.entry(target.key.clone()).or_default().push(part);
        local_buffers.insert(target.key.clone(), String::new());
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn finalize_target(
        &self,
        session: &mut MarcUploadSession,
        target: &Target,
        collection_id: &str,
        local_buffers: &mut HashMap<String, String>,
        upload_ids: &mut HashMap<String, String>,
        parts: &mut HashMap<String, Vec<MultipartUploadPart>>,
        created: DateTime<Utc>,
    ) -> Result<Option<MarcFileRecord>, MarcError> {
        let remaining = local_buffers.get(&target.key).map(|b| !b.is_empty()).unwrap_or(false);
        if remaining {
            // Final part carries no size minimum (§8 boundary property).
            self.upload_part(session, target, local_buffers, upload_ids, parts).await?;
        }

        let Some(upload_id) = upload_ids.get(&target.key).cloned() else {
            // Nothing was ever buffered for this target (e.g. an empty delta).
            return Ok(None);
        };
        let collected_parts = parts.remove(&target.key).unwrap_or_default();
        if collected_parts.is_empty() {
            return Ok(None);
        }

        self.object_store.complete_multipart_upload(&self.bucket, &target.key, &upload_id, collected_parts).await?;

        let record = MarcFileRecord {
            id: Uuid::new_v4().to_string(),
            library_id: target.library.library_id.clone(),
            collection_id: collection_id.to_string(),
            created,
            since: target.since,
            key: target.key.clone(),
        };
        self.catalog.record_marc_file(record.clone()).await?;
        info!(key = %target.key, library = %target.library.library_short_name, "MARC file uploaded");
        Ok(Some(record))
    }
}

/// Enumerate `MarcFile` rows eligible for deletion (§4.7 Retention): any
/// file for a collection/library pair no longer eligible for export, all
/// but the most recent full file per pair, and all but the 12 most recent
/// delta files per pair.
pub async fn files_to_retire(catalog: &dyn MarcCatalogStore) -> Result<Vec<MarcFileRecord>, MarcError> {
    let eligible_pairs: std::collections::HashSet<(String, String)> = catalog
        .enabled_collections_and_libraries(None)
        .await?
        .into_iter()
        .map(|(collection, library)| (library.library_id, collection.id))
        .collect();

    let all = catalog.all_marc_files().await?;
    let mut by_pair: HashMap<(String, String), Vec<MarcFileRecord>> = HashMap::new();
    for file in all {
        by_pair.entry((file.library_id.clone(), file.collection_id.clone())).or_default().push(file);
    }

    let mut to_retire = Vec::new();
    for (pair, mut files) in by_pair {
        if !eligible_pairs.contains(&pair) {
            to_retire.extend(files);
            continue;
        }

        files.sort_by(|a, b| b.created.cmp(&a.created));
        let (deltas, fulls): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| f.since.is_some());

        to_retire.extend(fulls.into_iter().skip(1));
        to_retire.extend(deltas.into_iter().skip(12));
    }

    Ok(to_retire)
}

/// Run the retention pass, deleting every file `files_to_retire` yields.
pub async fn run_retention(catalog: &dyn MarcCatalogStore) -> Result<usize, MarcError> {
    let to_retire = files_to_retire(catalog).await?;
    let count = to_retire.len();
    for file in to_retire {
        catalog.delete_marc_file(&file.id).await?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use atrium_core::catalog::Work;

    #[derive(Default)]
    struct FakeCatalog {
        enabled: Vec<(Collection, LibraryExportConfig)>,
        files: Mutex<Vec<MarcFileRecord>>,
    }

    impl MarcCatalogStore for FakeCatalog {
        fn enabled_collections_and_libraries(&self, collection_id: Option<&str>) -> crate::store::StoreFuture<'_, Vec<(Collection, LibraryExportConfig)>> {
            let collection_id = collection_id.map(str::to_string);
            Box::pin(async move {
                Ok(self
                    .enabled
                    .iter()
                    .filter(|(c, _)| collection_id.as_deref().map(|id| id == c.id).unwrap_or(true))
                    .cloned()
                    .collect())
            })
        }

        fn last_export_time(&self, _library_id: &str, _collection_id: &str) -> crate::store::StoreFuture<'_, Option<DateTime<Utc>>> {
            Box::pin(async { Ok(None) })
        }

        fn query_works(&self, _collection_id: &str, _work_id_offset: Option<&str>, _batch_size: usize) -> crate::store::StoreFuture<'_, Vec<(Work, atrium_core::catalog::LicensePool)>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn record_marc_file(&self, record: MarcFileRecord) -> crate::store::StoreFuture<'_, ()> {
            Box::pin(async move {
                self.files.lock().unwrap().push(record);
                Ok(())
            })
        }

        fn all_marc_files(&self) -> crate::store::StoreFuture<'_, Vec<MarcFileRecord>> {
            Box::pin(async { Ok(self.files.lock().unwrap().clone()) })
        }

        fn delete_marc_file(&self, id: &str) -> crate::store::StoreFuture<'_, ()> {
            let id = id.to_string();
            Box::pin(async move {
                self.files.lock().unwrap().retain(|f| f.id != id);
                Ok(())
            })
        }
    }

    fn file(id: &str, library_id: &str, collection_id: &str, created: DateTime<Utc>, since: Option<DateTime<Utc>>) -> MarcFileRecord {
        MarcFileRecord {
            id: id.to_string(),
            library_id: library_id.to_string(),
            collection_id: collection_id.to_string(),
            created,
            since,
            key: format!("marc/test/{id}.mrc"),
        }
    }

    #[tokio::test]
    async fn retention_keeps_newest_full_and_twelve_deltas_per_pair() {
        let base = Utc::now();
        let mut files = Vec::new();
        files.push(file("full-old", "lib", "coll", base - chrono::Duration::days(60), None));
        files.push(file("full-new", "lib", "coll", base - chrono::Duration::days(1), None));
        for i in 0..15 {
            files.push(file(&format!("delta-{i}"), "lib", "coll", base - chrono::Duration::days(i), Some(base - chrono::Duration::days(30))));
        }

        let catalog = FakeCatalog {
            enabled: vec![(
                Collection { id: "coll".to_string(), name: "Coll".to_string(), protocol: atrium_core::catalog::ProtocolTag::Opds2Odl, external_account_id: None, skipped_license_formats: vec![], last_imported_watermark: None },
                LibraryExportConfig { library_id: "lib".to_string(), library_short_name: "lib".to_string(), opds_base_url: "https://example.org".to_string(), organization_code: None, include_summary: true, include_genres: true, web_client_urls: vec![] },
            )],
            files: Mutex::new(files),
        };

        let to_retire = files_to_retire(&catalog).await.unwrap();
        assert!(to_retire.iter().any(|f| f.id == "full-old"));
        assert!(!to_retire.iter().any(|f| f.id == "full-new"));
        // 15 deltas, keep the 12 most recent -> 3 retired.
        assert_eq!(to_retire.iter().filter(|f| f.since.is_some()).count(), 3);
    }

    #[tokio::test]
    async fn retention_drops_entire_pair_once_no_longer_eligible() {
        let base = Utc::now();
        let files = vec![file("stale-full", "gone-lib", "coll", base, None)];
        let catalog = FakeCatalog { enabled: vec![], files: Mutex::new(files) };

        let to_retire = files_to_retire(&catalog).await.unwrap();
        assert_eq!(to_retire.len(), 1);
    }
}
