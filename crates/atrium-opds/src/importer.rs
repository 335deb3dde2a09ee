//! The import pipeline itself: fetch a feed page, extract each
//! publication's bibliographic snapshot (concurrently fetching ODL license
//! documents along the way), reconcile against previously stored state,
//! and hand the result to the caller's apply callbacks.
//!
//! This crate never touches persistence directly — `stored_digest` and
//! the two `apply_*` callbacks are the only seams into the rest of the
//! system, matching the trait-boundary discipline the Apply Dispatcher
//! (`atrium-dispatch`) owns on the other side.

use std::collections::{HashMap, HashSet};

use atrium_core::{Collection, Identifier, IdentifierType};
use atrium_http::{CodeMatcher, RequestOptions};
use futures::stream::{self, StreamExt};
use reqwest::Method;

use crate::atom::{self, AtomFeed};
use crate::bibliographic::{BibliographicData, CirculationData};
use crate::error::OpdsError;
use crate::extractor::{self, FailedPublication};
use crate::license_info::LicenseInfo;
use crate::opds2::{self, Feed as Opds2Feed, Publication};

/// The connection pool's default concurrent-connection cap (§4.1,
/// `DEFAULT_LIMITS`) — also the default bound on in-flight ODL
/// license-document fetches within one feed page.
pub const DEFAULT_LICENSE_FETCH_CONCURRENCY: usize = 10;

#[derive(Clone, Debug)]
pub struct PublicationImportResult {
    pub bibliographic: BibliographicData,
    pub changed: bool,
    pub called_bibliographic_apply: bool,
    pub called_circulation_apply: bool,
}

#[derive(Debug, Default)]
pub struct FeedImportResult {
    pub next_url: Option<String>,
    pub results: HashMap<Identifier, PublicationImportResult>,
    pub failures: Vec<FailedPublication>,
}

impl FeedImportResult {
    /// True if at least one publication in this page was already
    /// up-to-date and therefore not (re-)applied.
    pub fn found_unchanged_publication(&self) -> bool {
        self.results.values().any(|result| !result.changed)
    }
}

fn absolute_url(base: &str, url: Option<&str>) -> String {
    match url {
        None => base.to_string(),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.to_string(),
        Some(relative) => match url::Url::parse(base).and_then(|base| base.join(relative)) {
            Ok(joined) => joined.to_string(),
            Err(_) => relative.to_string(),
        },
    }
}

fn feed_base_url(collection: &Collection) -> String {
    collection.external_account_id.clone().unwrap_or_default()
}

/// Reconcile one extracted publication against the caller's stored digest
/// and invoke the appropriate apply callback. `force_changed` implements
/// the ODL `force_reimport` flag, which short-circuits `has_changed` to
/// always report true.
fn reconcile_and_apply(
    bibliographic: BibliographicData,
    stored_digest: &dyn Fn(&Identifier) -> Option<[u8; 32]>,
    import_even_if_unchanged: bool,
    force_changed: bool,
    apply_bibliographic: &mut dyn FnMut(&BibliographicData),
    apply_circulation: &mut dyn FnMut(&CirculationData),
) -> PublicationImportResult {
    let digest = stored_digest(&bibliographic.identifier);
    let has_changed = force_changed || bibliographic.has_changed(digest.as_ref());

    let mut called_bibliographic_apply = false;
    let mut called_circulation_apply = false;

    if import_even_if_unchanged || has_changed {
        apply_bibliographic(&bibliographic);
        called_bibliographic_apply = true;
    } else if let Some(circulation) = &bibliographic.circulation {
        apply_circulation(circulation);
        called_circulation_apply = true;
    }

    PublicationImportResult {
        bibliographic,
        changed: has_changed,
        called_bibliographic_apply,
        called_circulation_apply,
    }
}

/// Import one page of an OPDS 1.x (Atom) feed. There is no ODL license
/// fetch phase for this protocol — the extractor runs purely against the
/// parsed feed.
pub async fn import_atom_feed(
    client: &atrium_http::Client,
    collection: &Collection,
    url: Option<&str>,
    ignored_identifier_types: &HashSet<IdentifierType>,
    stored_digest: impl Fn(&Identifier) -> Option<[u8; 32]>,
    mut apply_bibliographic: impl FnMut(&BibliographicData),
    import_even_if_unchanged: bool,
) -> Result<FeedImportResult, OpdsError> {
    let feed_url = absolute_url(&feed_base_url(collection), url);

    let options = RequestOptions::for_worker().with_allowed_response_codes(vec![CodeMatcher::series(2)]);
    let response = client
        .request_with(Method::GET, &feed_url, options, |b| b.header("Accept", atom::ACCEPT_HEADER))
        .await
        .map_err(|source| OpdsError::Fetch { url: feed_url.clone(), source })?;

    let body = response
        .bytes()
        .await
        .map_err(|err| OpdsError::Parse { url: feed_url.clone(), message: err.to_string() })?;

    let feed = AtomFeed::parse(&body).map_err(|err| OpdsError::Parse { url: feed_url.clone(), message: err.to_string() })?;

    let mut results = HashMap::new();
    let mut failures = Vec::new();
    let mut apply_circulation = |_: &CirculationData| {};

    for entry in &feed.entries {
        let identifier = match extractor::atom_publication_identifier(entry) {
            Ok(identifier) => identifier,
            Err(error) => {
                failures.push(extractor::failure_from_identifier_error(entry.title.clone(), error));
                continue;
            }
        };

        if ignored_identifier_types.contains(&identifier.kind) {
            tracing::warn!(%identifier, "publication not imported: identifier type is not allowed");
            continue;
        }

        let bibliographic = extractor::atom_publication_bibliographic(&identifier, entry);
        let result = reconcile_and_apply(
            bibliographic,
            &stored_digest,
            import_even_if_unchanged,
            false,
            &mut apply_bibliographic,
            &mut apply_circulation,
        );
        results.insert(identifier, result);
    }

    Ok(FeedImportResult {
        next_url: feed.next_url().map(|next| absolute_url(&feed_url, Some(next.as_str()))),
        results,
        failures,
    })
}

/// Import one page of an OPDS 2.x + ODL feed, including the concurrent
/// per-license status-document fetch phase.
#[allow(clippy::too_many_arguments)]
pub async fn import_odl_feed(
    client: &atrium_http::Client,
    collection: &Collection,
    url: Option<&str>,
    ignored_identifier_types: &HashSet<IdentifierType>,
    license_fetch_concurrency: usize,
    oauth_protected: bool,
    bearer_token_media_types: &HashSet<String>,
    force_reimport: bool,
    stored_digest: impl Fn(&Identifier) -> Option<[u8; 32]>,
    mut apply_bibliographic: impl FnMut(&BibliographicData),
    mut apply_circulation: impl FnMut(&CirculationData),
) -> Result<FeedImportResult, OpdsError> {
    let feed_url = absolute_url(&feed_base_url(collection), url);

    let options = RequestOptions::for_worker().with_allowed_response_codes(vec![CodeMatcher::series(2)]);
    let response = client
        .request_with(Method::GET, &feed_url, options, |b| b.header("Accept", opds2::ACCEPT_HEADER))
        .await
        .map_err(|source| OpdsError::Fetch { url: feed_url.clone(), source })?;

    let body = response
        .bytes()
        .await
        .map_err(|err| OpdsError::Parse { url: feed_url.clone(), message: err.to_string() })?;

    let feed = Opds2Feed::parse(&body).map_err(|err| OpdsError::Parse { url: feed_url.clone(), message: err.to_string() })?;

    let skipped_license_formats: HashSet<String> = collection.skipped_license_formats.iter().cloned().collect();

    // Phase 1: validate + filter, collecting each publication's license
    // fetch targets.
    let mut valid: Vec<(Identifier, &Publication)> = Vec::new();
    let mut failures = Vec::new();
    for publication in &feed.publications {
        let identifier = match extractor::opds2_publication_identifier(publication) {
            Ok(identifier) => identifier,
            Err(error) => {
                failures.push(extractor::failure_from_identifier_error(Some(publication.metadata.title.clone()), error));
                continue;
            }
        };
        if ignored_identifier_types.contains(&identifier.kind) {
            tracing::warn!(%identifier, "publication not imported: identifier type is not allowed");
            continue;
        }
        valid.push((identifier, publication));
    }

    // Phase 2: concurrent license-document fetch, bounded by the
    // connection pool limit.
    let fetch_tasks = valid.iter().flat_map(|(_, publication)| {
        extractor::odl_license_fetch_targets(publication)
            .into_iter()
            .map(|(license_identifier, status_url)| fetch_license_document(client, license_identifier, status_url))
    });

    let fetched: Vec<Option<(String, LicenseInfo)>> = stream::iter(fetch_tasks)
        .buffer_unordered(license_fetch_concurrency.max(1))
        .collect()
        .await;

    let license_info_documents: HashMap<String, LicenseInfo> = fetched.into_iter().flatten().collect();

    // Phase 3: extract + reconcile.
    let mut results = HashMap::new();
    for (identifier, publication) in valid {
        let bibliographic = extractor::opds2_publication_bibliographic(
            &identifier,
            publication,
            &license_info_documents,
            &skipped_license_formats,
            oauth_protected,
            bearer_token_media_types,
        );
        let result = reconcile_and_apply(
            bibliographic,
            &stored_digest,
            false,
            force_reimport,
            &mut apply_bibliographic,
            &mut apply_circulation,
        );
        results.insert(identifier, result);
    }

    if !failures.is_empty() {
        tracing::error!(count = failures.len(), %feed_url, "failed to import some publications");
    }

    Ok(FeedImportResult {
        next_url: feed.next_url().map(|next| absolute_url(&feed_url, Some(next.as_str()))),
        results,
        failures,
    })
}

async fn fetch_license_document(
    client: &atrium_http::Client,
    license_identifier: String,
    status_url: String,
) -> Option<(String, LicenseInfo)> {
    let options = RequestOptions::for_worker().with_allowed_response_codes(vec![CodeMatcher::series(2)]);
    let response = match client.get_with(&status_url, options).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%status_url, error = %err, "license info document is not available");
            return None;
        }
    };
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(%status_url, error = %err, "could not read license info document body");
            return None;
        }
    };
    match LicenseInfo::parse(&body) {
        Ok(info) => Some((license_identifier, info)),
        Err(err) => {
            tracing::error!(%status_url, error = %err, "license info document is not valid");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_url_passes_through_full_urls() {
        assert_eq!(
            absolute_url("https://example.com/feed", Some("https://other.com/feed2")),
            "https://other.com/feed2"
        );
    }

    #[test]
    fn absolute_url_joins_relative_paths() {
        assert_eq!(
            absolute_url("https://example.com/catalog/feed", Some("feed2?after=5")),
            "https://example.com/catalog/feed2?after=5"
        );
    }

    #[test]
    fn absolute_url_defaults_to_base_when_none() {
        assert_eq!(absolute_url("https://example.com/feed", None), "https://example.com/feed");
    }
}
