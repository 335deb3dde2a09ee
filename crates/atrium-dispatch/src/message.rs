use serde::{Deserialize, Serialize};

/// Which side of a publication's state a message updates. Bibliographic
/// messages must be dispatched before circulation messages for the same
/// identifier within one import task (§5 ordering guarantee).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyKind {
    Bibliographic,
    Circulation,
}

impl ApplyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bibliographic => "apply_bibliographic",
            Self::Circulation => "apply_circulation",
        }
    }
}

/// One idempotent apply message produced by the importer (§4.4) and routed
/// by the [`crate::Dispatcher`] to a persistence-layer handler. `payload` is
/// left as opaque JSON — the dispatcher has no opinion on a handler's
/// argument shape, only on ordering and delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyMessage {
    pub identifier: String,
    pub kind: ApplyKind,
    /// Strictly increasing per identifier at the producer. Used for
    /// last-write-wins resolution across tasks, not for gap detection —
    /// the dispatcher does not reject non-contiguous values.
    pub update_number: u64,
    pub payload: serde_json::Value,
}

impl ApplyMessage {
    pub fn new(identifier: impl Into<String>, kind: ApplyKind, update_number: u64, payload: serde_json::Value) -> Self {
        Self { identifier: identifier.into(), kind, update_number, payload }
    }
}
