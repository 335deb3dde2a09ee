//! ODL-specific reconciliation: cross-checking a fetched License Info
//! Document against what the feed itself claimed, and expanding a
//! license's declared formats (including the DeMarque/Feedbooks
//! content-type/DRM split) into `FormatData`.

use std::collections::HashSet;

use atrium_core::{License, LicenseStatus};
use chrono::{DateTime, Utc};

use crate::bibliographic::FormatData;
use crate::license_info::LicenseInfo;
use crate::opds2::OdlLicense;

/// DeMarque serves audiobooks with the DRM scheme embedded in the content
/// type rather than as a separate `protection` entry.
pub const FEEDBOOKS_AUDIO_CONTENT_TYPE: &str =
    "application/audiobook+json; protection=http://www.feedbooks.com/audiobooks/access-restriction";
pub const FEEDBOOKS_AUDIOBOOK_DRM: &str = "http://www.feedbooks.com/audiobooks/access-restriction";
pub const AUDIOBOOK_MANIFEST_MEDIA_TYPE: &str = "application/audiobook+json";
pub const BEARER_TOKEN_DRM: &str = "bearer-token";
pub const IN_COPYRIGHT_RIGHTS_URI: &str = "http://www.librarysimplified.org/terms/rights/in-copyright";

/// A License Info Document was fetched and must be cross-checked against
/// the feed's own claim before it is trusted. An identifier mismatch drops
/// the license entirely (logged, not raised); an expiry or concurrency
/// mismatch is treated as a sign the feed and license server have drifted
/// and the license is forced `unavailable` rather than dropped.
pub fn reconcile_fetched_license(
    info: LicenseInfo,
    checkout_url: Option<String>,
    status_url: String,
    feed_license_identifier: &str,
    feed_expires: Option<DateTime<Utc>>,
    feed_concurrency: Option<u32>,
) -> Option<License> {
    if info.identifier != feed_license_identifier {
        tracing::error!(
            feed_identifier = feed_license_identifier,
            document_identifier = %info.identifier,
            "license identifier mismatch between feed and license info document; dropping license completely"
        );
        return None;
    }

    let mut status = info.status.clone();
    if info.terms.expires != feed_expires {
        tracing::error!(
            license_identifier = feed_license_identifier,
            "license expiry mismatch between feed and license info document; forcing unavailable"
        );
        status = LicenseStatus::Unavailable;
    }
    if info.terms.concurrency != feed_concurrency {
        tracing::error!(
            license_identifier = feed_license_identifier,
            "license concurrency mismatch between feed and license info document; forcing unavailable"
        );
        status = LicenseStatus::Unavailable;
    }

    Some(License {
        identifier: info.identifier,
        checkout_url,
        status_url: Some(status_url),
        status,
        checkouts_left: info.checkouts.left,
        checkouts_available: Some(info.checkouts.available),
        expires: info.terms.expires,
        concurrency: info.terms.concurrency,
        content_types: info.formats(),
    })
}

/// A license whose own availability flag (or the publication's) was
/// already false — no fetch is attempted; it's recorded unavailable
/// outright.
pub fn unavailable_license(identifier: &str, status_url: String) -> License {
    License {
        identifier: identifier.to_string(),
        checkout_url: None,
        status_url: Some(status_url),
        status: LicenseStatus::Unavailable,
        checkouts_left: None,
        checkouts_available: Some(0),
        expires: None,
        concurrency: None,
        content_types: Vec::new(),
    }
}

/// Expand one ODL license's declared formats into `FormatData`, skipping
/// any format the collection is configured to ignore and splitting out
/// the DeMarque/Feedbooks audiobook special case.
pub fn expand_license_formats(license: &OdlLicense, skipped_license_formats: &HashSet<String>) -> Vec<FormatData> {
    let mut formats = Vec::new();
    let declared: HashSet<&String> = license.metadata.formats.iter().collect();

    for format in declared {
        if skipped_license_formats.contains(format) {
            continue;
        }

        let (content_type, drm_schemes): (String, Vec<Option<String>>) = if format == FEEDBOOKS_AUDIO_CONTENT_TYPE {
            (
                AUDIOBOOK_MANIFEST_MEDIA_TYPE.to_string(),
                vec![Some(FEEDBOOKS_AUDIOBOOK_DRM.to_string())],
            )
        } else {
            let protection_formats = license
                .metadata
                .protection
                .as_ref()
                .map(|p| p.formats.clone())
                .unwrap_or_default();
            let schemes = if protection_formats.is_empty() {
                vec![None]
            } else {
                protection_formats.into_iter().map(Some).collect()
            };
            (format.clone(), schemes)
        };

        for drm_scheme in drm_schemes {
            formats.push(FormatData {
                content_type: content_type.clone(),
                drm_scheme,
                rights_uri: Some(IN_COPYRIGHT_RIGHTS_URI.to_string()),
                acquisition_rel: None,
            });
        }
    }

    formats
}

/// For OAuth-protected feeds, a generic-acquisition-rel format with no DRM
/// scheme is otherwise unreachable without a bearer token — mark it so
/// indirect fulfillment can select it.
pub fn synthesize_bearer_token_formats(formats: &mut [FormatData], supported_media_types: &HashSet<String>) {
    for format in formats.iter_mut() {
        if format.drm_scheme.is_none()
            && supported_media_types.contains(&format.content_type)
            && format.acquisition_rel.as_deref() == Some(crate::opds2::GENERIC_ACQUISITION_REL)
        {
            format.drm_scheme = Some(BEARER_TOKEN_DRM.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_info::{LicenseInfoCheckouts, LicenseInfoTerms};

    fn info(identifier: &str, expires: Option<DateTime<Utc>>, concurrency: Option<u32>) -> LicenseInfo {
        LicenseInfo {
            identifier: identifier.to_string(),
            status: LicenseStatus::Available,
            checkouts: LicenseInfoCheckouts { left: None, available: 3 },
            terms: LicenseInfoTerms { expires, concurrency },
            format: None,
        }
    }

    #[test]
    fn identifier_mismatch_drops_license() {
        let result = reconcile_fetched_license(
            info("lic-B", None, Some(1)),
            None,
            "https://example.com/status".to_string(),
            "lic-A",
            None,
            Some(1),
        );
        assert!(result.is_none());
    }

    #[test]
    fn concurrency_mismatch_forces_unavailable() {
        let result = reconcile_fetched_license(
            info("lic-A", None, Some(5)),
            None,
            "https://example.com/status".to_string(),
            "lic-A",
            None,
            Some(1),
        )
        .unwrap();
        assert_eq!(result.status, LicenseStatus::Unavailable);
    }

    #[test]
    fn matching_terms_preserve_document_status() {
        let result = reconcile_fetched_license(
            info("lic-A", None, Some(1)),
            Some("https://example.com/borrow".to_string()),
            "https://example.com/status".to_string(),
            "lic-A",
            None,
            Some(1),
        )
        .unwrap();
        assert_eq!(result.status, LicenseStatus::Available);
        assert_eq!(result.checkout_url.as_deref(), Some("https://example.com/borrow"));
    }
}
