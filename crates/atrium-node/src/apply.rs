//! Wires the Apply Dispatcher's routing table (§4.9) to the in-memory
//! catalog fallback. Each handler's payload shape is this binary's own
//! convention — the dispatcher itself treats `payload` as opaque JSON.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use atrium_core::catalog::{LicensePool, Work};
use atrium_dispatch::{ApplyHandler, DispatchError, DispatchFuture};
use atrium_opds::{BibliographicData, CirculationData};

use crate::catalog::{work_id_for, InMemoryCatalog};

#[derive(Serialize, Deserialize)]
pub struct BibliographicPayload {
    pub collection_id: String,
    pub data_source_name: String,
    pub bibliographic: BibliographicData,
}

#[derive(Serialize, Deserialize)]
pub struct CirculationPayload {
    pub collection_id: String,
    pub identifier_urn: String,
    pub circulation: CirculationData,
}

pub struct BibliographicApplyHandler {
    pub catalog: Arc<InMemoryCatalog>,
}

impl ApplyHandler for BibliographicApplyHandler {
    fn apply(&self, message: &atrium_dispatch::ApplyMessage) -> DispatchFuture<'_> {
        let payload: Result<BibliographicPayload, _> = serde_json::from_value(message.payload.clone());
        Box::pin(async move {
            let payload = payload.map_err(|e| DispatchError::UnknownKind(format!("malformed bibliographic payload: {e}")))?;
            let identifier_urn = payload.bibliographic.identifier.urn();
            let circulation = payload.bibliographic.circulation.clone();

            let work = Work {
                id: work_id_for(&identifier_urn),
                presentation_edition: atrium_core::catalog::Edition {
                    primary_identifier: payload.bibliographic.identifier.clone(),
                    title: payload.bibliographic.title.clone(),
                    subtitle: payload.bibliographic.subtitle.clone(),
                    sort_title: None,
                    language: payload.bibliographic.language.clone(),
                    medium: payload.bibliographic.medium.clone(),
                    publisher: payload.bibliographic.publisher.clone(),
                    issued: None,
                    contributors: payload.bibliographic.contributors.clone(),
                    series: None,
                },
                audience: None,
                fiction: None,
                target_age_min: None,
                target_age_max: None,
                genres: Vec::new(),
                summary_text: None,
                last_update_time: Some(chrono::Utc::now()),
            };

            let pool = circulation_to_pool(&payload.collection_id, &payload.data_source_name, circulation.as_ref());
            self.catalog.upsert_work(&payload.collection_id, &identifier_urn, work, pool);
            self.catalog.store_digest(&identifier_urn, payload.bibliographic.snapshot_digest());
            info!(identifier = %identifier_urn, collection_id = %payload.collection_id, "applied bibliographic update");
            Ok(())
        })
    }
}

pub struct CirculationApplyHandler {
    pub catalog: Arc<InMemoryCatalog>,
}

impl ApplyHandler for CirculationApplyHandler {
    fn apply(&self, message: &atrium_dispatch::ApplyMessage) -> DispatchFuture<'_> {
        let payload: Result<CirculationPayload, _> = serde_json::from_value(message.payload.clone());
        Box::pin(async move {
            let payload = payload.map_err(|e| DispatchError::UnknownKind(format!("malformed circulation payload: {e}")))?;
            self.catalog.update_circulation(&payload.collection_id, &payload.identifier_urn, |pool| {
                apply_circulation_to_pool(pool, &payload.circulation);
            });
            info!(identifier = %payload.identifier_urn, collection_id = %payload.collection_id, "applied circulation update");
            Ok(())
        })
    }
}

fn circulation_to_pool(collection_id: &str, data_source_name: &str, circulation: Option<&CirculationData>) -> LicensePool {
    let mut pool = LicensePool {
        collection_id: collection_id.to_string(),
        identifier: atrium_core::Identifier::new(atrium_core::IdentifierType::Other("unset".to_string()), ""),
        licenses_owned: 0,
        licenses_available: 0,
        licenses_reserved: 0,
        patrons_in_hold_queue: 0,
        unlimited_access: false,
        open_access: false,
        suppressed: false,
        last_checked: Some(chrono::Utc::now()),
        delivery_mechanisms: Vec::new(),
        licenses: Vec::new(),
        data_source_name: data_source_name.to_string(),
    };
    if let Some(circulation) = circulation {
        apply_circulation_to_pool(&mut pool, circulation);
    }
    pool
}

fn apply_circulation_to_pool(pool: &mut LicensePool, circulation: &CirculationData) {
    pool.licenses = circulation.licenses.clone();
    pool.delivery_mechanisms = circulation
        .formats
        .iter()
        .map(|f| atrium_core::catalog::DeliveryMechanism {
            content_type: f.content_type.clone(),
            drm_scheme: f.drm_scheme.clone(),
            rights_uri: f.rights_uri.clone(),
        })
        .collect();
    if let Some(owned) = circulation.licenses_owned {
        pool.licenses_owned = owned;
    }
    if let Some(available) = circulation.licenses_available {
        pool.licenses_available = available;
    }
    if let Some(reserved) = circulation.licenses_reserved {
        pool.licenses_reserved = reserved;
    }
    if let Some(queue) = circulation.patrons_in_hold_queue {
        pool.patrons_in_hold_queue = queue;
    }
    pool.last_checked = Some(chrono::Utc::now());
}
