//! An ephemeral, in-process stand-in for the circulation manager's real
//! catalog database. `atrium-marc` and `atrium-playtime` treat persistence
//! as a collaborator's trait boundary (§9 "Session-wide mutable ORM caches
//! → explicit repositories") rather than a concern of their own; this is
//! the fallback the worker binary reaches for when no real store is wired
//! in, mirroring the upstream node's ephemeral-genesis-keys fallback —
//! fine for local development, lost on every restart, never for production.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use atrium_core::catalog::{Collection, LicensePool, Work};
use atrium_marc::store::{MarcCatalogStore, StoreFuture as MarcStoreFuture};
use atrium_marc::{LibraryExportConfig, MarcFileRecord};
use atrium_playtime::entry::{PlaytimeEntry, PlaytimeGroupKey};
use atrium_playtime::store::{PlaytimeStore, ReportLoanCountRow, ReportSecondsRow, StoreFuture as PlaytimeStoreFuture};
use atrium_playtime::{PlaytimeError, PlaytimeSummary};

pub struct InMemoryCatalog {
    collections: Vec<(Collection, Vec<LibraryExportConfig>)>,
    works: Mutex<HashMap<String, HashMap<String, (Work, LicensePool)>>>,
    digests: Mutex<HashMap<String, [u8; 32]>>,
    marc_files: Mutex<Vec<MarcFileRecord>>,
    playtime_entries: Mutex<Vec<PlaytimeEntry>>,
    playtime_summaries: Mutex<HashMap<String, PlaytimeSummary>>,
}

impl InMemoryCatalog {
    pub fn new(collections: Vec<(Collection, Vec<LibraryExportConfig>)>) -> Self {
        Self {
            collections,
            works: Mutex::new(HashMap::new()),
            digests: Mutex::new(HashMap::new()),
            marc_files: Mutex::new(Vec::new()),
            playtime_entries: Mutex::new(Vec::new()),
            playtime_summaries: Mutex::new(HashMap::new()),
        }
    }

    pub fn collection_ids(&self) -> Vec<String> {
        self.collections.iter().map(|(c, _)| c.id.clone()).collect()
    }

    pub fn find_collection(&self, collection_id: &str) -> Option<&Collection> {
        self.collections.iter().find(|(c, _)| c.id == collection_id).map(|(c, _)| c)
    }

    /// The digest stored for `identifier_urn`, if this identifier has ever
    /// been imported (§4.4 `has_changed`).
    pub fn stored_digest(&self, identifier_urn: &str) -> Option<[u8; 32]> {
        self.digests.lock().unwrap().get(identifier_urn).copied()
    }

    pub fn store_digest(&self, identifier_urn: &str, digest: [u8; 32]) {
        self.digests.lock().unwrap().insert(identifier_urn.to_string(), digest);
    }

    pub fn upsert_work(&self, collection_id: &str, identifier_urn: &str, work: Work, pool: LicensePool) {
        self.works.lock().unwrap().entry(collection_id.to_string()).or_default().insert(identifier_urn.to_string(), (work, pool));
    }

    pub fn update_circulation(&self, collection_id: &str, identifier_urn: &str, apply: impl FnOnce(&mut LicensePool)) {
        if let Some(collection) = self.works.lock().unwrap().get_mut(collection_id) {
            if let Some((_, pool)) = collection.get_mut(identifier_urn) {
                apply(pool);
            }
        }
    }

    pub fn record_playtime_entry(&self, entry: PlaytimeEntry) {
        self.playtime_entries.lock().unwrap().push(entry);
    }
}

impl MarcCatalogStore for InMemoryCatalog {
    fn enabled_collections_and_libraries(&self, collection_id: Option<&str>) -> MarcStoreFuture<'_, Vec<(Collection, LibraryExportConfig)>> {
        let collection_id = collection_id.map(str::to_string);
        Box::pin(async move {
            Ok(self
                .collections
                .iter()
                .filter(|(c, _)| collection_id.as_deref().map(|id| id == c.id).unwrap_or(true))
                .flat_map(|(c, libraries)| libraries.iter().map(move |l| (c.clone(), l.clone())))
                .collect())
        })
    }

    fn last_export_time(&self, library_id: &str, collection_id: &str) -> MarcStoreFuture<'_, Option<DateTime<Utc>>> {
        let library_id = library_id.to_string();
        let collection_id = collection_id.to_string();
        Box::pin(async move {
            Ok(self
                .marc_files
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.library_id == library_id && f.collection_id == collection_id)
                .map(|f| f.created)
                .max())
        })
    }

    fn query_works(&self, collection_id: &str, work_id_offset: Option<&str>, batch_size: usize) -> MarcStoreFuture<'_, Vec<(Work, LicensePool)>> {
        let collection_id = collection_id.to_string();
        let work_id_offset = work_id_offset.map(str::to_string);
        Box::pin(async move {
            let works = self.works.lock().unwrap();
            let mut entries: Vec<&(Work, LicensePool)> = works.get(&collection_id).map(|m| m.values().collect()).unwrap_or_default();
            entries.sort_by(|a, b| a.0.id.cmp(&b.0.id));
            let start = match &work_id_offset {
                None => 0,
                Some(offset) => entries.iter().position(|(w, _)| &w.id > offset).unwrap_or(entries.len()),
            };
            Ok(entries.into_iter().skip(start).take(batch_size).map(|(w, p)| (w.clone(), p.clone())).collect())
        })
    }

    fn record_marc_file(&self, record: MarcFileRecord) -> MarcStoreFuture<'_, ()> {
        Box::pin(async move {
            self.marc_files.lock().unwrap().push(record);
            Ok(())
        })
    }

    fn all_marc_files(&self) -> MarcStoreFuture<'_, Vec<MarcFileRecord>> {
        Box::pin(async { Ok(self.marc_files.lock().unwrap().clone()) })
    }

    fn delete_marc_file(&self, id: &str) -> MarcStoreFuture<'_, ()> {
        let id = id.to_string();
        Box::pin(async move {
            self.marc_files.lock().unwrap().retain(|f| f.id != id);
            Ok(())
        })
    }
}

fn summary_bucket_key(k: &PlaytimeGroupKey) -> String {
    format!("{}|{}|{}|{}|{}", k.timestamp, k.identifier_str, k.collection_name, k.library_name, k.loan_identifier)
}

impl PlaytimeStore for InMemoryCatalog {
    fn delete_processed_older_than(&self, cutoff: DateTime<Utc>) -> PlaytimeStoreFuture<'_, usize> {
        Box::pin(async move {
            let mut entries = self.playtime_entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|e| !(e.processed && e.timestamp < cutoff));
            Ok(before - entries.len())
        })
    }

    fn unprocessed_before(&self, cutoff: DateTime<Utc>) -> PlaytimeStoreFuture<'_, Vec<PlaytimeEntry>> {
        Box::pin(async move { Ok(self.playtime_entries.lock().unwrap().iter().filter(|e| !e.processed && e.timestamp <= cutoff).cloned().collect()) })
    }

    fn mark_processed(&self, ids: &[String]) -> PlaytimeStoreFuture<'_, ()> {
        let ids = ids.to_vec();
        Box::pin(async move {
            let mut entries = self.playtime_entries.lock().unwrap();
            for entry in entries.iter_mut() {
                if ids.contains(&entry.id) {
                    entry.processed = true;
                }
            }
            Ok(())
        })
    }

    fn upsert_summary(&self, key: PlaytimeGroupKey, seconds: u64) -> PlaytimeStoreFuture<'_, PlaytimeSummary> {
        Box::pin(async move {
            let id = summary_bucket_key(&key);
            let mut summaries = self.playtime_summaries.lock().unwrap();
            let summary = summaries.entry(id.clone()).or_insert_with(|| PlaytimeSummary {
                id,
                timestamp: key.timestamp,
                identifier: key.identifier.clone(),
                collection: key.collection.clone(),
                library: key.library.clone(),
                identifier_str: key.identifier_str.clone(),
                identifier_id: key.identifier.clone(),
                collection_name: key.collection_name.clone(),
                library_name: key.library_name.clone(),
                loan_identifier: key.loan_identifier.clone(),
                data_source_name: key.data_source_name.clone(),
                isbn: None,
                title: None,
                total_seconds_played: 0,
            });
            summary.total_seconds_played += seconds;
            Ok(summary.clone())
        })
    }

    fn eligible_data_source_names(&self) -> PlaytimeStoreFuture<'_, Vec<String>> {
        Box::pin(async move {
            let mut names: Vec<String> = self.playtime_summaries.lock().unwrap().values().map(|s| s.data_source_name.clone()).collect();
            names.sort();
            names.dedup();
            Ok(names)
        })
    }

    fn report_seconds_rows(&self, start: DateTime<Utc>, until: DateTime<Utc>, data_source_name: &str) -> PlaytimeStoreFuture<'_, Vec<ReportSecondsRow>> {
        let data_source_name = data_source_name.to_string();
        Box::pin(async move {
            let mut totals: HashMap<(String, String, String, String, String), u64> = HashMap::new();
            for summary in self.playtime_summaries.lock().unwrap().values() {
                if summary.data_source_name != data_source_name || summary.timestamp < start || summary.timestamp >= until {
                    continue;
                }
                let key = (
                    summary.identifier_str.clone(),
                    summary.collection_name.clone(),
                    summary.library_name.clone(),
                    summary.isbn.clone().unwrap_or_default(),
                    summary.title.clone().unwrap_or_default(),
                );
                *totals.entry(key).or_insert(0) += summary.total_seconds_played;
            }
            Ok(totals
                .into_iter()
                .map(|((identifier_str, collection_name, library_name, isbn, title), total_seconds_played)| ReportSecondsRow {
                    identifier_str,
                    collection_name,
                    library_name,
                    isbn,
                    title,
                    total_seconds_played,
                })
                .collect())
        })
    }

    fn report_loan_count_rows(&self, start: DateTime<Utc>, until: DateTime<Utc>, data_source_name: &str) -> PlaytimeStoreFuture<'_, Vec<ReportLoanCountRow>> {
        let data_source_name = data_source_name.to_string();
        Box::pin(async move {
            let mut loans: HashMap<(String, String, String, String), std::collections::HashSet<String>> = HashMap::new();
            let mut isbn_title: HashMap<(String, String, String, String), (String, String)> = HashMap::new();
            for summary in self.playtime_summaries.lock().unwrap().values() {
                if summary.data_source_name != data_source_name || summary.timestamp < start || summary.timestamp >= until {
                    continue;
                }
                let identifier_id = summary.identifier_id.clone().unwrap_or_default();
                let key = (summary.identifier_str.clone(), summary.collection_name.clone(), summary.library_name.clone(), identifier_id);
                loans.entry(key.clone()).or_default().insert(summary.loan_identifier.clone());
                let entry = isbn_title.entry(key).or_insert_with(|| (String::new(), String::new()));
                if let Some(isbn) = &summary.isbn {
                    if !isbn.is_empty() {
                        entry.0 = isbn.clone();
                    }
                }
                if let Some(title) = &summary.title {
                    if !title.is_empty() {
                        entry.1 = title.clone();
                    }
                }
            }
            Ok(loans
                .into_iter()
                .map(|((identifier_str, collection_name, library_name, _identifier_id), loan_identifiers)| {
                    let (isbn, title) = isbn_title.get(&(identifier_str.clone(), collection_name.clone(), library_name.clone(), _identifier_id)).cloned().unwrap_or_default();
                    ReportLoanCountRow { identifier_str, collection_name, library_name, isbn, title, loan_count: loan_identifiers.len() as u64 }
                })
                .collect())
        })
    }
}

/// Real persistence would assign a work id on first insert and keep it
/// stable across re-imports; this fallback has no durable identity to key
/// off beyond the identifier string itself, so it reuses the urn directly.
pub fn work_id_for(identifier_urn: &str) -> String {
    identifier_urn.to_string()
}
