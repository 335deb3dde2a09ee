//! The catalog-facing boundary this crate queries through. Persistence
//! itself is out of scope here; a collaborator implements
//! [`MarcCatalogStore`] against whatever database backs the circulation
//! manager's works/collections/libraries — a thin service layer over an
//! async, swappable backend rather than a concrete embedded store.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use atrium_core::catalog::{Collection, LicensePool, Work};

use crate::error::MarcError;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MarcError>> + Send + 'a>>;

/// Per-library settings that drive one export pass for one collection
/// (§4.7), the counterpart of the upstream exporter's `LibraryInfo` minus
/// the S3-key bookkeeping this crate computes itself.
#[derive(Clone, Debug)]
pub struct LibraryExportConfig {
    pub library_id: String,
    pub library_short_name: String,
    /// This library's own acquisition-feed base URL, used to build the
    /// per-work link that 856 web-client URLs wrap (§4.7).
    pub opds_base_url: String,
    pub organization_code: Option<String>,
    pub include_summary: bool,
    pub include_genres: bool,
    pub web_client_urls: Vec<String>,
}

/// A persisted record of one completed MARC export (`MarcFile`).
#[derive(Clone, Debug)]
pub struct MarcFileRecord {
    pub id: String,
    pub library_id: String,
    pub collection_id: String,
    pub created: DateTime<Utc>,
    pub since: Option<DateTime<Utc>>,
    pub key: String,
}

pub trait MarcCatalogStore: Send + Sync {
    /// Collections with MARC export enabled, paired with every library
    /// that has opted in, optionally narrowed to one collection.
    fn enabled_collections_and_libraries(&self, collection_id: Option<&str>) -> StoreFuture<'_, Vec<(Collection, LibraryExportConfig)>>;

    /// The creation time of the most recent `MarcFile` for this
    /// (library, collection) pair, if any export has ever completed.
    fn last_export_time(&self, library_id: &str, collection_id: &str) -> StoreFuture<'_, Option<DateTime<Utc>>>;

    /// One batch of works licensed through `collection_id`, ordered by
    /// work id ascending, starting after `work_id_offset`.
    fn query_works(&self, collection_id: &str, work_id_offset: Option<&str>, batch_size: usize) -> StoreFuture<'_, Vec<(Work, LicensePool)>>;

    fn record_marc_file(&self, record: MarcFileRecord) -> StoreFuture<'_, ()>;

    fn all_marc_files(&self) -> StoreFuture<'_, Vec<MarcFileRecord>>;

    fn delete_marc_file(&self, id: &str) -> StoreFuture<'_, ()>;
}
