//! The extractor's output shape: one canonical snapshot of everything
//! known about a publication after a single import pass. `has_changed`
//! compares this snapshot, minus volatile fields, against whatever digest
//! was stored at the end of the previous import.

use atrium_core::{Contributor, Identifier, License};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A (content-type, DRM-scheme, rights-URI) triple as seen in a feed,
/// before it becomes a persisted `DeliveryMechanism`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatData {
    pub content_type: String,
    pub drm_scheme: Option<String>,
    pub rights_uri: Option<String>,
    /// The acquisition link relation this format was derived from, if any —
    /// carried through so later passes (BEARER_TOKEN synthesis) can tell a
    /// generic OPDS acquisition link apart from e.g. an open-access one.
    pub acquisition_rel: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CirculationData {
    pub formats: Vec<FormatData>,
    pub licenses: Vec<License>,
    pub licenses_owned: Option<u32>,
    pub licenses_available: Option<u32>,
    pub licenses_reserved: Option<u32>,
    pub patrons_in_hold_queue: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BibliographicData {
    pub identifier: Identifier,
    pub title: String,
    pub subtitle: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub medium: Option<String>,
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    pub circulation: Option<CirculationData>,

    /// When this snapshot was produced. Volatile: excluded from the
    /// change-detection digest so a re-import with identical facts but a
    /// later wall-clock time still compares equal.
    #[serde(skip)]
    pub last_checked: Option<DateTime<Utc>>,
}

impl BibliographicData {
    /// A blake3 digest of the canonical-JSON form of every field except
    /// `last_checked`. `serde_json::Value::Object` sorts its keys (the
    /// `preserve_order` feature is not enabled anywhere in this workspace),
    /// so routing the struct through `to_value` before hashing makes the
    /// digest stable across field-declaration-order changes and process
    /// restarts alike.
    pub fn snapshot_digest(&self) -> [u8; 32] {
        let value = serde_json::to_value(self).expect("BibliographicData is always serializable");
        let canonical = serde_json::to_vec(&value).expect("Value serialization cannot fail");
        *blake3::hash(&canonical).as_bytes()
    }

    /// Compare against a previously stored digest. `None` means this
    /// identifier has never been imported before, which always counts as
    /// changed.
    pub fn has_changed(&self, stored_digest: Option<&[u8; 32]>) -> bool {
        match stored_digest {
            None => true,
            Some(stored) => &self.snapshot_digest() != stored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::IdentifierType;

    fn sample() -> BibliographicData {
        BibliographicData {
            identifier: Identifier::new(IdentifierType::Isbn, "9780000000000"),
            title: "Example".to_string(),
            subtitle: None,
            language: Some("en".to_string()),
            publisher: None,
            medium: None,
            contributors: Vec::new(),
            circulation: None,
            last_checked: None,
        }
    }

    #[test]
    fn digest_ignores_last_checked() {
        let mut a = sample();
        let mut b = sample();
        a.last_checked = Some(Utc::now());
        b.last_checked = Some(Utc::now() - chrono::Duration::days(3));
        assert_eq!(a.snapshot_digest(), b.snapshot_digest());
    }

    #[test]
    fn digest_changes_with_title() {
        let a = sample();
        let mut b = sample();
        b.title = "Different".to_string();
        assert_ne!(a.snapshot_digest(), b.snapshot_digest());
    }

    #[test]
    fn has_changed_with_no_stored_digest_is_true() {
        assert!(sample().has_changed(None));
    }

    #[test]
    fn has_changed_with_matching_digest_is_false() {
        let bib = sample();
        let digest = bib.snapshot_digest();
        assert!(!bib.has_changed(Some(&digest)));
    }
}
