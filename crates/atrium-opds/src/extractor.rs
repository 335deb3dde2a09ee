//! Turns a parsed feed publication into a `BibliographicData` snapshot.
//! One function per protocol variant; both share the same output shape so
//! the importer's reconciliation step (§ has_changed) is protocol-agnostic.

use std::collections::HashSet;

use atrium_core::{Contributor, Identifier};

use crate::atom::{identifier_from_urn, AtomEntry};
use crate::bibliographic::{BibliographicData, CirculationData, FormatData};
use crate::license_info::LicenseInfo;
use crate::opds2::{self, OdlLicense, Publication};
use crate::reconcile;

/// Publications whose identifier couldn't be determined, or whose
/// bibliographic extraction failed, are reported here rather than
/// propagated — the feed task as a whole still succeeds.
#[derive(Clone, Debug)]
pub struct FailedPublication {
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub error_message: String,
}

pub fn atom_publication_identifier(entry: &AtomEntry) -> Result<Identifier, String> {
    identifier_from_urn(&entry.id)
}

pub fn atom_publication_bibliographic(identifier: &Identifier, entry: &AtomEntry) -> BibliographicData {
    let contributors = entry
        .authors
        .iter()
        .filter_map(|author| author.name.clone())
        .map(|name| Contributor {
            name,
            role: "author".to_string(),
            sort_name: None,
        })
        .collect();

    BibliographicData {
        identifier: identifier.clone(),
        title: entry.title.clone().unwrap_or_default(),
        subtitle: None,
        language: entry.language.clone(),
        publisher: entry.publisher.clone(),
        medium: None,
        contributors,
        circulation: None,
        last_checked: None,
    }
}

pub fn opds2_publication_identifier(publication: &Publication) -> Result<Identifier, String> {
    identifier_from_urn(&publication.metadata.identifier)
}

/// Build the bibliographic snapshot for one OPDS2(+ODL) publication.
/// `license_info_documents` maps a license's own identifier to the parsed
/// License Info Document fetched for it during the importer's concurrent
/// fetch phase (absent entries mean the fetch failed or was skipped).
pub fn opds2_publication_bibliographic(
    identifier: &Identifier,
    publication: &Publication,
    license_info_documents: &std::collections::HashMap<String, LicenseInfo>,
    skipped_license_formats: &HashSet<String>,
    oauth_protected: bool,
    bearer_token_media_types: &HashSet<String>,
) -> BibliographicData {
    let mut formats = Vec::new();
    let mut licenses = Vec::new();
    let publication_available = publication.metadata.availability.available;

    for license in &publication.licenses {
        if let Some(license_record) = build_license(license, license_info_documents, publication_available) {
            licenses.push(license_record);
        }
        formats.extend(reconcile::expand_license_formats(license, skipped_license_formats));
    }

    if !publication.is_odl() && oauth_protected {
        formats = publication
            .acquisition_links()
            .map(|link| FormatData {
                content_type: link.media_type.clone().unwrap_or_default(),
                drm_scheme: None,
                rights_uri: None,
                acquisition_rel: link.rel.clone(),
            })
            .collect();
        reconcile::synthesize_bearer_token_formats(&mut formats, bearer_token_media_types);
    }

    let circulation = CirculationData {
        formats,
        licenses,
        licenses_owned: None,
        licenses_available: None,
        licenses_reserved: None,
        patrons_in_hold_queue: None,
    };

    BibliographicData {
        identifier: identifier.clone(),
        title: publication.metadata.title.clone(),
        subtitle: publication.metadata.subtitle.clone(),
        language: publication.metadata.language.clone(),
        publisher: publication.metadata.publisher.as_ref().map(|p| p.name.clone()),
        medium: None,
        contributors: Vec::new(),
        circulation: Some(circulation),
        last_checked: None,
    }
}

fn build_license(
    license: &OdlLicense,
    license_info_documents: &std::collections::HashMap<String, LicenseInfo>,
    publication_available: bool,
) -> Option<atrium_core::License> {
    let feed_identifier = license.metadata.identifier.clone();
    let status_url = license.self_link().map(|link| link.href.clone())?;

    if !license.metadata.availability.available || !publication_available {
        return Some(reconcile::unavailable_license(&feed_identifier, status_url));
    }

    let info = license_info_documents.get(&feed_identifier)?.clone();
    let checkout_url = license.borrow_link().map(|link| link.href.clone());
    reconcile::reconcile_fetched_license(
        info,
        checkout_url,
        status_url,
        &feed_identifier,
        license.metadata.terms.expires,
        license.metadata.terms.concurrency,
    )
}

/// `publication`'s set of `{license identifier -> status-document URL}`
/// for every license whose own availability flag is true, for the
/// importer's concurrent fetch phase. An unavailable license, or one
/// belonging to an unavailable publication, never needs a fetch.
pub fn odl_license_fetch_targets(publication: &Publication) -> Vec<(String, String)> {
    if !publication.metadata.availability.available {
        return Vec::new();
    }
    publication
        .licenses
        .iter()
        .filter(|license| license.metadata.availability.available)
        .filter_map(|license| {
            license
                .self_link()
                .map(|link| (license.metadata.identifier.clone(), link.href.clone()))
        })
        .collect()
}

pub fn failure_from_identifier_error(title: Option<String>, error: String) -> FailedPublication {
    FailedPublication {
        identifier: None,
        title,
        error_message: error,
    }
}

pub const fn opds1_accept_header() -> &'static str {
    crate::atom::ACCEPT_HEADER
}

pub const fn opds2_accept_header() -> &'static str {
    opds2::ACCEPT_HEADER
}
