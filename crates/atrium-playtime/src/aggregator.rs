use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::entry::PlaytimeGroupKey;
use crate::error::PlaytimeError;
use crate::store::PlaytimeStore;
use crate::summary::PlaytimeSummary;

/// Processed entries older than this survive only long enough to be safe
/// from double-counting, then are reaped (§4.8 step 1).
pub fn processed_retention() -> Duration {
    Duration::days(30)
}

/// Entries newer than this are still in flux and excluded from a pass
/// (§4.8 step 2).
pub fn stability_window() -> Duration {
    Duration::hours(1)
}

/// Outcome of one aggregation pass, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub entries_reaped: usize,
    pub entries_aggregated: usize,
    pub groups_updated: usize,
}

/// Runs one pass of the periodic aggregation job (§4.8): reaps stale
/// processed entries, sums unprocessed entries older than the stability
/// window into `PlaytimeSummary` buckets, and marks their sources processed.
pub async fn run_aggregation(store: &dyn PlaytimeStore, now: DateTime<Utc>) -> Result<AggregationReport, PlaytimeError> {
    let entries_reaped = store.delete_processed_older_than(now - processed_retention()).await?;
    info!(entries_reaped, "reaped processed playtime entries");

    let cut_off = now - stability_window();
    let unprocessed = store.unprocessed_before(cut_off).await?;

    let mut by_group: HashMap<PlaytimeGroupKey, u64> = HashMap::new();
    for entry in &unprocessed {
        *by_group.entry(entry.group_key()).or_insert(0) += entry.seconds_played as u64;
    }

    let groups_updated = by_group.len();
    let mut summaries: Vec<PlaytimeSummary> = Vec::with_capacity(groups_updated);
    for (key, seconds) in by_group {
        let summary = store.upsert_summary(key.clone(), seconds).await?;
        info!(
            identifier_str = %key.identifier_str,
            collection_name = %key.collection_name,
            library_name = %key.library_name,
            loan_identifier = %key.loan_identifier,
            added = seconds,
            new_total = summary.total_seconds_played,
            "updated playtime summary"
        );
        summaries.push(summary);
    }

    let processed_ids: Vec<String> = unprocessed.iter().map(|e| e.id.clone()).collect();
    let entries_aggregated = processed_ids.len();
    if !processed_ids.is_empty() {
        store.mark_processed(&processed_ids).await?;
    }

    Ok(AggregationReport { entries_reaped, entries_aggregated, groups_updated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PlaytimeEntry;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        entries: Mutex<Vec<PlaytimeEntry>>,
        summaries: Mutex<HashMap<String, PlaytimeSummary>>,
        processed_calls: Mutex<Vec<Vec<String>>>,
    }

    fn summary_key(k: &PlaytimeGroupKey) -> String {
        format!("{}|{}|{}|{}|{}", k.timestamp, k.identifier_str, k.collection_name, k.library_name, k.loan_identifier)
    }

    impl PlaytimeStore for FakeStore {
        fn delete_processed_older_than(&self, cutoff: DateTime<Utc>) -> crate::store::StoreFuture<'_, usize> {
            Box::pin(async move {
                let mut entries = self.entries.lock().unwrap();
                let before = entries.len();
                entries.retain(|e| !(e.processed && e.timestamp < cutoff));
                Ok(before - entries.len())
            })
        }

        fn unprocessed_before(&self, cutoff: DateTime<Utc>) -> crate::store::StoreFuture<'_, Vec<PlaytimeEntry>> {
            Box::pin(async move { Ok(self.entries.lock().unwrap().iter().filter(|e| !e.processed && e.timestamp <= cutoff).cloned().collect()) })
        }

        fn mark_processed(&self, ids: &[String]) -> crate::store::StoreFuture<'_, ()> {
            let ids = ids.to_vec();
            Box::pin(async move {
                self.processed_calls.lock().unwrap().push(ids.clone());
                let mut entries = self.entries.lock().unwrap();
                for e in entries.iter_mut() {
                    if ids.contains(&e.id) {
                        e.processed = true;
                    }
                }
                Ok(())
            })
        }

        fn upsert_summary(&self, key: PlaytimeGroupKey, seconds: u64) -> crate::store::StoreFuture<'_, PlaytimeSummary> {
            Box::pin(async move {
                let id = summary_key(&key);
                let mut summaries = self.summaries.lock().unwrap();
                let entry = summaries.entry(id.clone()).or_insert_with(|| PlaytimeSummary {
                    id,
                    timestamp: key.timestamp,
                    identifier: key.identifier.clone(),
                    collection: key.collection.clone(),
                    library: key.library.clone(),
                    identifier_str: key.identifier_str.clone(),
                    identifier_id: None,
                    collection_name: key.collection_name.clone(),
                    library_name: key.library_name.clone(),
                    loan_identifier: key.loan_identifier.clone(),
                    data_source_name: key.data_source_name.clone(),
                    isbn: None,
                    title: None,
                    total_seconds_played: 0,
                });
                entry.total_seconds_played += seconds;
                Ok(entry.clone())
            })
        }

        fn eligible_data_source_names(&self) -> crate::store::StoreFuture<'_, Vec<String>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn report_seconds_rows(&self, _start: DateTime<Utc>, _until: DateTime<Utc>, _data_source_name: &str) -> crate::store::StoreFuture<'_, Vec<crate::store::ReportSecondsRow>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn report_loan_count_rows(&self, _start: DateTime<Utc>, _until: DateTime<Utc>, _data_source_name: &str) -> crate::store::StoreFuture<'_, Vec<crate::store::ReportLoanCountRow>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn entry(id: &str, minute: i64, loan: &str, processed: bool, seconds: u32, now: DateTime<Utc>) -> PlaytimeEntry {
        PlaytimeEntry {
            id: id.to_string(),
            timestamp: now - Duration::hours(2) + Duration::minutes(minute),
            identifier: Some("urn:isbn:123".to_string()),
            collection: Some("coll-1".to_string()),
            library: Some("lib-1".to_string()),
            identifier_str: "urn:isbn:123".to_string(),
            collection_name: "Collection One".to_string(),
            library_name: "Library One".to_string(),
            loan_identifier: loan.to_string(),
            data_source_name: "Overdrive".to_string(),
            seconds_played: seconds,
            processed,
        }
    }

    #[tokio::test]
    async fn sums_unprocessed_entries_into_one_bucket_per_group() {
        let now = Utc::now();
        let store = FakeStore {
            entries: Mutex::new(vec![
                entry("a", 0, "loan-1", false, 30, now),
                entry("b", 0, "loan-1", false, 45, now),
                entry("c", 0, "loan-2", false, 10, now),
            ]),
            ..Default::default()
        };

        let report = run_aggregation(&store, now).await.unwrap();
        assert_eq!(report.entries_aggregated, 3);
        assert_eq!(report.groups_updated, 2);

        let summaries = store.summaries.lock().unwrap();
        let loan1 = summaries.values().find(|s| s.loan_identifier == "loan-1").unwrap();
        assert_eq!(loan1.total_seconds_played, 75);

        assert!(store.entries.lock().unwrap().iter().all(|e| e.processed));
    }

    #[tokio::test]
    async fn excludes_entries_inside_the_stability_window() {
        let now = Utc::now();
        let store = FakeStore {
            entries: Mutex::new(vec![entry("fresh", 119, "loan-1", false, 30, now)]),
            ..Default::default()
        };

        let report = run_aggregation(&store, now).await.unwrap();
        assert_eq!(report.entries_aggregated, 0);
        assert!(!store.entries.lock().unwrap()[0].processed);
    }

    #[tokio::test]
    async fn reaps_processed_entries_past_the_retention_window() {
        let now = Utc::now();
        let mut stale = entry("stale", 0, "loan-1", true, 10, now);
        stale.timestamp = now - Duration::days(45);
        let store = FakeStore { entries: Mutex::new(vec![stale]), ..Default::default() };

        let report = run_aggregation(&store, now).await.unwrap();
        assert_eq!(report.entries_reaped, 1);
        assert!(store.entries.lock().unwrap().is_empty());
    }
}
