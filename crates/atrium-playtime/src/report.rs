use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, Utc};

use crate::error::PlaytimeError;
use crate::store::{PlaytimeStore, ReportLoanCountRow, ReportSecondsRow};

/// Format used for the `date` column's range label, e.g. `06-01-2026 - 07-01-2026`.
pub const REPORT_DATE_FORMAT: &str = "%m-%d-%Y";

const HEADER: [&str; 8] = ["date", "urn", "isbn", "collection", "library", "title", "total seconds", "loan count"];

/// The join key `ReportSecondsRow` and `ReportLoanCountRow` are matched on
/// (upstream `_fetch_report_records`'s outer join).
#[derive(PartialEq, Eq, Hash, Clone)]
struct JoinKey {
    identifier_str: String,
    collection_name: String,
    library_name: String,
    isbn: String,
    title: String,
}

impl From<&ReportSecondsRow> for JoinKey {
    fn from(r: &ReportSecondsRow) -> Self {
        JoinKey { identifier_str: r.identifier_str.clone(), collection_name: r.collection_name.clone(), library_name: r.library_name.clone(), isbn: r.isbn.clone(), title: r.title.clone() }
    }
}

impl From<&ReportLoanCountRow> for JoinKey {
    fn from(r: &ReportLoanCountRow) -> Self {
        JoinKey { identifier_str: r.identifier_str.clone(), collection_name: r.collection_name.clone(), library_name: r.library_name.clone(), isbn: r.isbn.clone(), title: r.title.clone() }
    }
}

/// One finished report row, after the outer join and before CSV rendering.
struct ReportRow {
    identifier_str: String,
    collection_name: String,
    library_name: String,
    isbn: String,
    title: String,
    total_seconds_played: u64,
    loan_count: u64,
}

/// Builds the outer-joined, ordered row set for one data source's usage
/// report over `[start, until)` (§4.8 report step).
async fn report_rows(store: &dyn PlaytimeStore, start: DateTime<Utc>, until: DateTime<Utc>, data_source_name: &str) -> Result<Vec<ReportRow>, PlaytimeError> {
    let seconds_rows = store.report_seconds_rows(start, until, data_source_name).await?;
    let loan_count_rows = store.report_loan_count_rows(start, until, data_source_name).await?;

    let mut loan_counts: HashMap<JoinKey, u64> = HashMap::new();
    for row in &loan_count_rows {
        loan_counts.insert(JoinKey::from(row), row.loan_count);
    }

    let mut rows: Vec<ReportRow> = Vec::with_capacity(seconds_rows.len());
    let mut seen: std::collections::HashSet<JoinKey> = std::collections::HashSet::new();
    for row in seconds_rows {
        let key = JoinKey::from(&row);
        let loan_count = loan_counts.get(&key).copied().unwrap_or(0);
        seen.insert(key);
        rows.push(ReportRow {
            identifier_str: row.identifier_str,
            collection_name: row.collection_name,
            library_name: row.library_name,
            isbn: row.isbn,
            title: row.title,
            total_seconds_played: row.total_seconds_played,
            loan_count,
        });
    }

    // Full outer join: a key present only on the loan-count side (seconds
    // rolled up to zero for the window, loans still recorded) still gets a
    // row, with total_seconds_played = 0.
    for row in loan_count_rows {
        let key = JoinKey::from(&row);
        if seen.contains(&key) {
            continue;
        }
        rows.push(ReportRow {
            identifier_str: row.identifier_str,
            collection_name: row.collection_name,
            library_name: row.library_name,
            isbn: row.isbn,
            title: row.title,
            total_seconds_played: 0,
            loan_count: row.loan_count,
        });
    }

    rows.sort_by(|a, b| (&a.collection_name, &a.library_name, &a.identifier_str, &a.title).cmp(&(&b.collection_name, &b.library_name, &b.identifier_str, &b.title)));
    Ok(rows)
}

/// Writes a usage-report CSV for one data source over `[start, until)` to
/// `sink`, labelling every row with `date_label` (§4.8 report step).
pub async fn write_report<W: Write>(store: &dyn PlaytimeStore, sink: W, date_label: &str, start: DateTime<Utc>, until: DateTime<Utc>, data_source_name: &str) -> Result<(), PlaytimeError> {
    let rows = report_rows(store, start, until, data_source_name).await?;

    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record(&[
            date_label.to_string(),
            row.identifier_str,
            empty_as_blank(&row.isbn),
            row.collection_name,
            row.library_name,
            empty_as_blank(&row.title),
            row.total_seconds_played.to_string(),
            row.loan_count.to_string(),
        ])?;
    }
    writer.flush().map_err(|e| PlaytimeError::Store(e.to_string()))?;
    Ok(())
}

fn empty_as_blank(s: &str) -> String {
    s.to_string()
}

/// The `[start, until)` data sources a report run covers, one per distinct
/// eligible data source name (§4.8 report step).
pub async fn eligible_data_source_names(store: &dyn PlaytimeStore) -> Result<Vec<String>, PlaytimeError> {
    let mut names = store.eligible_data_source_names().await?;
    names.sort();
    names.dedup();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[derive(Default)]
    struct FakeStore {
        seconds_rows: Vec<ReportSecondsRow>,
        loan_count_rows: Vec<ReportLoanCountRow>,
    }

    impl PlaytimeStore for FakeStore {
        fn delete_processed_older_than(&self, _cutoff: DateTime<Utc>) -> crate::store::StoreFuture<'_, usize> {
            Box::pin(async { Ok(0) })
        }
        fn unprocessed_before(&self, _cutoff: DateTime<Utc>) -> crate::store::StoreFuture<'_, Vec<crate::entry::PlaytimeEntry>> {
            Box::pin(async { Ok(Vec::new()) })
        }
        fn mark_processed(&self, _ids: &[String]) -> crate::store::StoreFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
        fn upsert_summary(&self, _key: crate::entry::PlaytimeGroupKey, _seconds: u64) -> crate::store::StoreFuture<'_, crate::summary::PlaytimeSummary> {
            unreachable!("not exercised by report tests")
        }
        fn eligible_data_source_names(&self) -> crate::store::StoreFuture<'_, Vec<String>> {
            Box::pin(async { Ok(vec!["Overdrive".to_string()]) })
        }
        fn report_seconds_rows(&self, _start: DateTime<Utc>, _until: DateTime<Utc>, _data_source_name: &str) -> crate::store::StoreFuture<'_, Vec<ReportSecondsRow>> {
            let rows = self.seconds_rows.clone();
            Box::pin(async move { Ok(rows) })
        }
        fn report_loan_count_rows(&self, _start: DateTime<Utc>, _until: DateTime<Utc>, _data_source_name: &str) -> crate::store::StoreFuture<'_, Vec<ReportLoanCountRow>> {
            let rows = self.loan_count_rows.clone();
            Box::pin(async move { Ok(rows) })
        }
    }

    #[tokio::test]
    async fn joins_seconds_with_loan_counts_and_sorts_rows() {
        let store = FakeStore {
            seconds_rows: vec![
                ReportSecondsRow { identifier_str: "urn:b".into(), collection_name: "Z Collection".into(), library_name: "Lib".into(), isbn: "".into(), title: "".into(), total_seconds_played: 100 },
                ReportSecondsRow { identifier_str: "urn:a".into(), collection_name: "A Collection".into(), library_name: "Lib".into(), isbn: "9780000000000".into(), title: "Book A".into(), total_seconds_played: 50 },
            ],
            loan_count_rows: vec![ReportLoanCountRow { identifier_str: "urn:a".into(), collection_name: "A Collection".into(), library_name: "Lib".into(), isbn: "9780000000000".into(), title: "Book A".into(), loan_count: 3 }],
        };

        let now = Utc::now();
        let mut buf = Vec::new();
        write_report(&store, &mut buf, "06-01-2026 - 07-01-2026", now - Duration::days(30), now, "Overdrive").await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "date,urn,isbn,collection,library,title,total seconds,loan count");
        // "A Collection" sorts before "Z Collection".
        assert!(lines.next().unwrap().contains("urn:a"));
        let row_a = text.lines().find(|l| l.contains("urn:a")).unwrap();
        assert!(row_a.ends_with("50,3"));
        let row_b = text.lines().find(|l| l.contains("urn:b")).unwrap();
        assert!(row_b.ends_with("100,0"));
    }

    #[tokio::test]
    async fn loan_count_only_key_still_produces_a_row() {
        let store = FakeStore {
            seconds_rows: vec![],
            loan_count_rows: vec![ReportLoanCountRow {
                identifier_str: "urn:c".into(),
                collection_name: "C Collection".into(),
                library_name: "Lib".into(),
                isbn: "".into(),
                title: "Book C".into(),
                loan_count: 2,
            }],
        };

        let now = Utc::now();
        let rows = report_rows(&store, now - Duration::days(30), now, "Overdrive").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_seconds_played, 0);
        assert_eq!(rows[0].loan_count, 2);
    }
}
