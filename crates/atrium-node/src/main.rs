//! atrium-node — the circulation worker binary.
//!
//! Startup sequence:
//!   1. Load configuration from the environment
//!   2. Connect to Redis (lock store) and S3 (MARC object store)
//!   3. Build the ephemeral in-memory catalog fallback and the apply dispatcher
//!   4. Run the scheduler loop: import → apply → MARC export → retention → playtime aggregation

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use redis::aio::ConnectionManager;
use tracing::{info, warn};

use atrium_config::{collection_from_env, Environment, LockStoreConfig, MarcLibraryConfig, S3Config};
use atrium_core::catalog::{Collection, ProtocolTag};
use atrium_dispatch::{ApplyKind, ApplyMessage, Dispatcher};
use atrium_lockstore::LockStore;
use atrium_marc::{AwsS3MultipartStore, MarcExportEngine};

mod apply;
mod catalog;

use apply::{BibliographicApplyHandler, BibliographicPayload, CirculationApplyHandler, CirculationPayload};
use catalog::InMemoryCatalog;

#[derive(Parser, Debug)]
#[command(name = "atrium-node", version, about = "Atrium circulation worker — import, export, and playtime aggregation")]
struct Args {
    /// How often the scheduler runs one full cycle.
    #[arg(long, default_value_t = 300)]
    tick_interval_secs: u64,

    /// Comma-separated list of collection suffixes, each resolved via
    /// `COLLECTION_<SUFFIX>_*` environment variables.
    #[arg(long, value_delimiter = ',')]
    collections: Vec<String>,

    /// Comma-separated `<collection_suffix>:<library_suffix>` pairs enabling
    /// MARC export for a (collection, library) combination.
    #[arg(long, value_delimiter = ',')]
    marc_libraries: Vec<String>,

    /// Optional path written with a readiness marker once the first cycle
    /// completes, for container healthchecks.
    #[arg(long)]
    ready_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,atrium=debug".parse().unwrap()))
        .init();

    let args = Args::parse();
    info!("atrium-node starting");

    let environment = Environment::from_env().context("loading process-wide environment")?;
    let lockstore_config = LockStoreConfig::from_env().context("loading lock store configuration")?;
    let s3_config = S3Config::from_env().context("loading S3 configuration")?;

    let collections = load_collections(&args.collections).context("loading collection configuration")?;
    let library_configs = load_library_configs(&args.marc_libraries).context("loading MARC library configuration")?;

    let redis_client = redis::Client::open(lockstore_config.redis_url.clone()).context("opening redis client")?;
    let redis_conn = ConnectionManager::new(redis_client).await.context("connecting to redis")?;
    let lock_store = LockStore::new(redis_conn, lockstore_config.installation_prefix.clone());

    let aws_config = build_aws_config(&s3_config).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let object_store = Arc::new(AwsS3MultipartStore::new(s3_client));

    let catalog_collections: Vec<(Collection, Vec<_>)> = collections
        .iter()
        .map(|(collection, suffix)| {
            let libraries = library_configs
                .iter()
                .filter(|(collection_suffix, _, _)| collection_suffix == suffix)
                .map(|(_, _, export_config)| export_config.clone())
                .collect();
            (collection.clone(), libraries)
        })
        .collect();
    let catalog = Arc::new(InMemoryCatalog::new(catalog_collections));

    let dispatcher = Arc::new(
        Dispatcher::builder()
            .register("apply_bibliographic", Arc::new(BibliographicApplyHandler { catalog: catalog.clone() }))
            .register("apply_circulation", Arc::new(CirculationApplyHandler { catalog: catalog.clone() }))
            .build(),
    );

    let export_engine = Arc::new(MarcExportEngine::new(lock_store, object_store, catalog.clone(), s3_config.bucket.clone()));

    let http_client = atrium_http::Client::for_worker();
    let update_numbers = Arc::new(UpdateNumbers::default());

    info!(collections = collections.len(), sirsi_dynix_app_id = %environment.sirsi_dynix_app_id, "configuration loaded");

    let mut interval = tokio::time::interval(Duration::from_secs(args.tick_interval_secs.max(1)));
    let mut first_tick = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(error) = run_cycle(&http_client, &dispatcher, &export_engine, &catalog, &collections, &update_numbers).await {
                    warn!(%error, "scheduler cycle failed");
                }
                if first_tick {
                    first_tick = false;
                    if let Some(path) = &args.ready_file {
                        if let Err(error) = std::fs::write(path, b"ready") {
                            warn!(%error, path = %path.display(), "failed to write readiness marker");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

#[derive(Default)]
struct UpdateNumbers {
    counter: AtomicU64,
}

impl UpdateNumbers {
    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

async fn run_cycle(
    http_client: &atrium_http::Client,
    dispatcher: &Dispatcher,
    export_engine: &MarcExportEngine,
    catalog: &InMemoryCatalog,
    collections: &[(Collection, String)],
    update_numbers: &UpdateNumbers,
) -> anyhow::Result<()> {
    for (collection, _suffix) in collections {
        if let Err(error) = import_collection(http_client, dispatcher, catalog, collection, update_numbers).await {
            warn!(collection_id = %collection.id, %error, "import cycle failed for collection");
        }

        match export_engine.export_collection(&collection.id).await {
            Ok(files) if !files.is_empty() => info!(collection_id = %collection.id, count = files.len(), "MARC export produced new files"),
            Ok(_) => {}
            Err(error) => warn!(collection_id = %collection.id, %error, "MARC export failed for collection"),
        }
    }

    match atrium_marc::run_retention(catalog).await {
        Ok(retired) if retired > 0 => info!(retired, "MARC retention retired stale files"),
        Ok(_) => {}
        Err(error) => warn!(%error, "MARC retention failed"),
    }

    match atrium_playtime::run_aggregation(catalog, chrono::Utc::now()).await {
        Ok(report) => info!(
            entries_reaped = report.entries_reaped,
            entries_aggregated = report.entries_aggregated,
            groups_updated = report.groups_updated,
            "playtime aggregation complete"
        ),
        Err(error) => warn!(%error, "playtime aggregation failed"),
    }

    Ok(())
}

async fn import_collection(
    http_client: &atrium_http::Client,
    dispatcher: &Dispatcher,
    catalog: &InMemoryCatalog,
    collection: &Collection,
    update_numbers: &UpdateNumbers,
) -> anyhow::Result<()> {
    let ignored_identifier_types = HashSet::new();
    let mut messages: Vec<ApplyMessage> = Vec::new();

    let stored_digest = |identifier: &atrium_core::Identifier| -> Option<[u8; 32]> { catalog.stored_digest(&identifier.urn()) };

    match collection.protocol {
        ProtocolTag::Opds1 => {
            let collection_id = collection.id.clone();
            let apply_bibliographic = |bibliographic: &atrium_opds::BibliographicData| {
                messages.push(bibliographic_message(&collection_id, bibliographic, update_numbers));
            };
            atrium_opds::import_atom_feed(http_client, collection, None, &ignored_identifier_types, stored_digest, apply_bibliographic, false)
                .await
                .context("importing OPDS 1.x feed")?;
        }
        ProtocolTag::Opds2Odl => {
            let collection_id = collection.id.clone();
            let bearer_token_media_types = HashSet::new();
            let apply_bibliographic = |bibliographic: &atrium_opds::BibliographicData| {
                messages.push(bibliographic_message(&collection_id, bibliographic, update_numbers));
            };
            // Circulation-only updates (unchanged bibliographic data) carry no
            // identifier into this callback — built from `result.results`
            // below instead, where each entry still has its full BibliographicData.
            let apply_circulation = |_circulation: &atrium_opds::CirculationData| {};
            let result = atrium_opds::import_odl_feed(
                http_client,
                collection,
                None,
                &ignored_identifier_types,
                atrium_opds::DEFAULT_LICENSE_FETCH_CONCURRENCY,
                false,
                &bearer_token_media_types,
                false,
                stored_digest,
                apply_bibliographic,
                apply_circulation,
            )
            .await
            .context("importing OPDS 2.0 + ODL feed")?;

            for publication in result.results.values() {
                if publication.called_circulation_apply {
                    if let Some(circulation) = &publication.bibliographic.circulation {
                        messages.push(circulation_message(&collection.id, &publication.bibliographic.identifier.urn(), circulation, update_numbers));
                    }
                }
            }
        }
        ProtocolTag::Overdrive => {
            warn!(collection_id = %collection.id, "Overdrive import is not implemented by this worker");
        }
    }

    for message in messages {
        dispatcher.dispatch(message).await.context("dispatching apply message")?;
    }

    Ok(())
}

fn bibliographic_message(collection_id: &str, bibliographic: &atrium_opds::BibliographicData, update_numbers: &UpdateNumbers) -> ApplyMessage {
    let identifier_urn = bibliographic.identifier.urn();
    let payload = BibliographicPayload {
        collection_id: collection_id.to_string(),
        data_source_name: collection_id.to_string(),
        bibliographic: bibliographic.clone(),
    };
    ApplyMessage::new(
        identifier_urn.clone(),
        ApplyKind::Bibliographic,
        update_numbers.next(),
        serde_json::to_value(&payload).expect("BibliographicPayload is always serializable"),
    )
}

fn circulation_message(collection_id: &str, identifier_urn: &str, circulation: &atrium_opds::CirculationData, update_numbers: &UpdateNumbers) -> ApplyMessage {
    let payload = CirculationPayload {
        collection_id: collection_id.to_string(),
        identifier_urn: identifier_urn.to_string(),
        circulation: circulation.clone(),
    };
    ApplyMessage::new(
        identifier_urn.to_string(),
        ApplyKind::Circulation,
        update_numbers.next(),
        serde_json::to_value(&payload).expect("CirculationPayload is always serializable"),
    )
}

fn load_collections(suffixes: &[String]) -> anyhow::Result<Vec<(Collection, String)>> {
    suffixes
        .iter()
        .map(|suffix| Ok((collection_from_env(suffix).with_context(|| format!("collection '{suffix}'"))?, suffix.clone())))
        .collect()
}

fn load_library_configs(pairs: &[String]) -> anyhow::Result<Vec<(String, String, atrium_marc::LibraryExportConfig)>> {
    pairs
        .iter()
        .map(|pair| {
            let (collection_suffix, library_suffix) = pair
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("malformed --marc-libraries entry '{pair}', expected <collection_suffix>:<library_suffix>"))?;
            let config = MarcLibraryConfig::from_env(library_suffix).with_context(|| format!("MARC library '{library_suffix}'"))?;
            Ok((
                collection_suffix.to_string(),
                library_suffix.to_string(),
                atrium_marc::LibraryExportConfig {
                    library_id: config.library_id,
                    library_short_name: config.library_short_name,
                    opds_base_url: config.opds_base_url,
                    organization_code: Some(config.organization_code),
                    include_summary: config.include_summary,
                    include_genres: config.include_genres,
                    web_client_urls: config.web_client_urls,
                },
            ))
        })
        .collect()
}

async fn build_aws_config(s3_config: &S3Config) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_config::Region::new(s3_config.region.clone()));
    if let Some(endpoint) = &s3_config.endpoint_url {
        loader = loader.endpoint_url(endpoint.clone());
    }
    loader.load().await
}
