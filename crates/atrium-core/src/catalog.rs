use crate::identifier::Identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocols a `Collection` may speak to its upstream. Drives which
/// Extractor and Importer pipeline handles a given feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolTag {
    Opds1,
    Opds2Odl,
    Overdrive,
}

/// A named acquisition source owned by zero or more libraries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub protocol: ProtocolTag,
    pub external_account_id: Option<String>,
    pub skipped_license_formats: Vec<String>,
    pub last_imported_watermark: Option<DateTime<Utc>>,
}

/// An ordered, role-tagged contributor to an `Edition`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    pub role: String,
    pub sort_name: Option<String>,
}

/// Bibliographic facts for one manifestation. Immutable beyond metadata
/// refresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edition {
    pub primary_identifier: Identifier,
    pub title: String,
    pub subtitle: Option<String>,
    pub sort_title: Option<String>,
    pub language: Option<String>,
    pub medium: Option<String>,
    pub publisher: Option<String>,
    pub issued: Option<DateTime<Utc>>,
    pub contributors: Vec<Contributor>,
    pub series: Option<String>,
}

/// A (content-type, DRM-scheme, rights-URI) triple describing how a
/// `LicensePool`'s content may be fulfilled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMechanism {
    pub content_type: String,
    pub drm_scheme: Option<String>,
    pub rights_uri: Option<String>,
}

/// Per-grant ODL record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Available,
    Unavailable,
    Preordered,
    Expired,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct License {
    pub identifier: String,
    pub checkout_url: Option<String>,
    pub status_url: Option<String>,
    pub status: LicenseStatus,
    pub checkouts_left: Option<u32>,
    pub checkouts_available: Option<u32>,
    pub expires: Option<DateTime<Utc>>,
    pub concurrency: Option<u32>,
    pub content_types: Vec<String>,
}

/// The fact that a `Collection` holds rights for an `Identifier`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LicensePool {
    pub collection_id: String,
    pub identifier: Identifier,
    pub licenses_owned: u32,
    pub licenses_available: u32,
    pub licenses_reserved: u32,
    pub patrons_in_hold_queue: u32,
    pub unlimited_access: bool,
    pub open_access: bool,
    pub suppressed: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub delivery_mechanisms: Vec<DeliveryMechanism>,
    pub licenses: Vec<License>,
    /// Name of the integration that supplied this pool's licenses (e.g. the
    /// collection's protocol-specific distributor name) — surfaced in MARC
    /// 264 second indicator 2 ($b).
    pub data_source_name: String,
}

impl LicensePool {
    /// Invariant (1): `licenses_available <= licenses_owned` unless the
    /// pool is unlimited.
    pub fn is_consistent(&self) -> bool {
        self.unlimited_access || self.licenses_available <= self.licenses_owned
    }
}

/// A presentation unit aggregating one or more editions of the same
/// intellectual content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Work {
    pub id: String,
    pub presentation_edition: Edition,
    pub audience: Option<String>,
    pub fiction: Option<bool>,
    pub target_age_min: Option<u32>,
    pub target_age_max: Option<u32>,
    pub genres: Vec<String>,
    pub summary_text: Option<String>,
    /// Last time this work's metadata or circulation state changed,
    /// compared against a library's last MARC export to decide delta
    /// inclusion (§4.7).
    pub last_update_time: Option<DateTime<Utc>>,
}
