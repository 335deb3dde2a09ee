//! The persistence boundary this crate reads and writes through. Mirrors
//! `atrium_marc::store`'s shape: a trait over async, boxed futures so a
//! collaborator can back it with whatever database holds entries and
//! summaries, and tests can swap in an in-memory fake.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::entry::{PlaytimeEntry, PlaytimeGroupKey};
use crate::error::PlaytimeError;
use crate::summary::PlaytimeSummary;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PlaytimeError>> + Send + 'a>>;

/// One summary row a report groups seconds by, the counterpart of the
/// upstream `seconds_query` projection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportSecondsRow {
    pub identifier_str: String,
    pub collection_name: String,
    pub library_name: String,
    pub isbn: String,
    pub title: String,
    pub total_seconds_played: u64,
}

/// One loan-count row a report outer-joins against `ReportSecondsRow`, the
/// counterpart of the upstream `loan_count_query` projection. `isbn`/`title`
/// here are the max-non-empty values across the grouping (§4.8 step, loan
/// count query comment), used only as join keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLoanCountRow {
    pub identifier_str: String,
    pub collection_name: String,
    pub library_name: String,
    pub isbn: String,
    pub title: String,
    pub loan_count: u64,
}

pub trait PlaytimeStore: Send + Sync {
    /// Deletes already-processed entries with `timestamp < cutoff`,
    /// returning the number removed.
    fn delete_processed_older_than(&self, cutoff: DateTime<Utc>) -> StoreFuture<'_, usize>;

    /// Unprocessed entries with `timestamp <= cutoff`, the aggregation
    /// pass's input batch (§4.8 step 2).
    fn unprocessed_before(&self, cutoff: DateTime<Utc>) -> StoreFuture<'_, Vec<PlaytimeEntry>>;

    fn mark_processed(&self, ids: &[String]) -> StoreFuture<'_, ()>;

    /// Adds `seconds` to the summary row at `key`'s bucket, creating it if
    /// absent, and returns the row's new total.
    fn upsert_summary(&self, key: PlaytimeGroupKey, seconds: u64) -> StoreFuture<'_, PlaytimeSummary>;

    /// Distinct `data_source_name`s eligible for a usage report: collections
    /// on an eligible protocol, unioned with data sources already present in
    /// `PlaytimeSummary` (upstream `_fetch_distinct_eligible_data_source_names`).
    fn eligible_data_source_names(&self) -> StoreFuture<'_, Vec<String>>;

    fn report_seconds_rows(&self, start: DateTime<Utc>, until: DateTime<Utc>, data_source_name: &str) -> StoreFuture<'_, Vec<ReportSecondsRow>>;

    fn report_loan_count_rows(&self, start: DateTime<Utc>, until: DateTime<Utc>, data_source_name: &str) -> StoreFuture<'_, Vec<ReportLoanCountRow>>;
}
