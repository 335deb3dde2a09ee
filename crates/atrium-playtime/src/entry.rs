use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw playback event, appended by the fulfillment path as playback
/// happens. `identifier`/`collection`/`library` carry the foreign keys when
/// known; the `_str`/`_name` fields are label fallbacks recorded at write
/// time so aggregation survives a later delete of the referenced row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaytimeEntry {
    pub id: String,
    /// Always truncated to a minute boundary by the caller.
    pub timestamp: DateTime<Utc>,
    pub identifier: Option<String>,
    pub collection: Option<String>,
    pub library: Option<String>,
    pub identifier_str: String,
    pub collection_name: String,
    pub library_name: String,
    pub loan_identifier: String,
    pub data_source_name: String,
    pub seconds_played: u32,
    pub processed: bool,
}

/// The key a batch of entries is grouped and summed under (§4.8 step 3).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlaytimeGroupKey {
    pub timestamp: DateTime<Utc>,
    pub identifier: Option<String>,
    pub collection: Option<String>,
    pub library: Option<String>,
    pub identifier_str: String,
    pub collection_name: String,
    pub library_name: String,
    pub loan_identifier: String,
    pub data_source_name: String,
}

impl PlaytimeEntry {
    pub fn group_key(&self) -> PlaytimeGroupKey {
        PlaytimeGroupKey {
            timestamp: self.timestamp,
            identifier: self.identifier.clone(),
            collection: self.collection.clone(),
            library: self.library.clone(),
            identifier_str: self.identifier_str.clone(),
            collection_name: self.collection_name.clone(),
            library_name: self.library_name.clone(),
            loan_identifier: self.loan_identifier.clone(),
            data_source_name: self.data_source_name.clone(),
        }
    }
}
