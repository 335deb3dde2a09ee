use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A minute-bucket rollup a [`PlaytimeEntry`](crate::entry::PlaytimeEntry)
/// group is folded into. `isbn`/`title` are denormalized from the work's
/// current bibliographic state at the time of the upsert, matching the
/// upstream model's `PlaytimeSummary.isbn`/`title` columns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaytimeSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub identifier: Option<String>,
    pub collection: Option<String>,
    pub library: Option<String>,
    pub identifier_str: String,
    pub identifier_id: Option<String>,
    pub collection_name: String,
    pub library_name: String,
    pub loan_identifier: String,
    pub data_source_name: String,
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub total_seconds_played: u64,
}
