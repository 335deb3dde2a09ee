//! The License Info Document: what sits at an ODL license's `self` link,
//! the source of truth re-checked against the feed's own claim for every
//! license before it is trusted (see [`crate::reconcile`]).

use atrium_core::LicenseStatus;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const LICENSE_INFO_MEDIA_TYPE: &str = "application/vnd.odl.info+json";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LicenseInfoCheckouts {
    pub left: Option<u32>,
    #[serde(default)]
    pub available: u32,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LicenseInfoTerms {
    pub expires: Option<DateTime<Utc>>,
    pub concurrency: Option<u32>,
}

/// The document's `format` key may be a single string or a list — both
/// forms appear in the wild.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LicenseInfo {
    pub identifier: String,
    pub status: LicenseStatus,
    #[serde(default)]
    pub checkouts: LicenseInfoCheckouts,
    #[serde(default)]
    pub terms: LicenseInfoTerms,
    #[serde(default)]
    pub format: Option<OneOrMany<String>>,
}

impl LicenseInfo {
    pub fn formats(&self) -> Vec<String> {
        self.format.clone().map(OneOrMany::into_vec).unwrap_or_default()
    }

    pub fn content_type() -> &'static str {
        LICENSE_INFO_MEDIA_TYPE
    }

    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_format_string() {
        let doc = LicenseInfo::parse(
            br#"{"identifier":"lic-1","status":"available","checkouts":{"available":5},"terms":{"concurrency":1},"format":"application/epub+zip"}"#,
        )
        .unwrap();
        assert_eq!(doc.formats(), vec!["application/epub+zip".to_string()]);
        assert_eq!(doc.status, LicenseStatus::Available);
    }

    #[test]
    fn accepts_format_array() {
        let doc = LicenseInfo::parse(
            br#"{"identifier":"lic-1","status":"unavailable","checkouts":{"available":0},"terms":{},"format":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(doc.formats(), vec!["a".to_string(), "b".to_string()]);
    }
}
