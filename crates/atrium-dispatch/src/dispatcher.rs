use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::handler::ApplyHandler;
use crate::message::ApplyMessage;

/// Builds a [`Dispatcher`]'s routing table once at startup. Mirrors the
/// "no import-time side effects, no implicit registration" design note
/// (§9): handlers are registered explicitly by the caller, never discovered.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<&'static str, Arc<dyn ApplyHandler>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: &'static str, handler: Arc<dyn ApplyHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: self.handlers,
            last_applied: Mutex::new(HashMap::new()),
        }
    }
}

/// Routes `ApplyMessage`s to the handler registered for their kind,
/// dropping stale redeliveries via last-write-wins on `update_number`.
///
/// Dispatch is serialized globally rather than per-identifier: this keeps
/// per-identifier submission order intact (the guarantee in §5) at the cost
/// of not parallelizing across unrelated identifiers. The importer's own
/// concurrency (license-document fetch) is unaffected since it happens
/// upstream of message construction.
pub struct Dispatcher {
    handlers: HashMap<&'static str, Arc<dyn ApplyHandler>>,
    last_applied: Mutex<HashMap<String, u64>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub async fn dispatch(&self, message: ApplyMessage) -> Result<(), DispatchError> {
        let kind = message.kind.as_str();
        let handler = self
            .handlers
            .get(kind)
            .ok_or_else(|| DispatchError::UnknownKind(kind.to_string()))?
            .clone();

        let mut last_applied = self.last_applied.lock().await;
        let previous = last_applied.get(&message.identifier).copied().unwrap_or(0);
        if message.update_number <= previous {
            debug!(identifier = %message.identifier, kind, update_number = message.update_number, previous, "dropping stale apply message");
            return Ok(());
        }

        handler.apply(&message).await.map_err(|e| {
            warn!(identifier = %message.identifier, kind, error = %e, "apply handler failed");
            e
        })?;

        last_applied.insert(message.identifier.clone(), message.update_number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::handler::DispatchFuture;
    use crate::message::ApplyKind;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    impl ApplyHandler for CountingHandler {
        fn apply(&self, _message: &ApplyMessage) -> DispatchFuture<'_> {
            let calls = self.calls.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    fn message(identifier: &str, update_number: u64) -> ApplyMessage {
        ApplyMessage::new(identifier, ApplyKind::Bibliographic, update_number, serde_json::json!({}))
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected() {
        let dispatcher = Dispatcher::builder().build();
        let err = dispatcher.dispatch(message("urn:1", 1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownKind(_)));
    }

    #[tokio::test]
    async fn applies_in_increasing_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::builder()
            .register("apply_bibliographic", Arc::new(CountingHandler { calls: calls.clone() }))
            .build();

        dispatcher.dispatch(message("urn:1", 1)).await.unwrap();
        dispatcher.dispatch(message("urn:1", 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_redelivery_is_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::builder()
            .register("apply_bibliographic", Arc::new(CountingHandler { calls: calls.clone() }))
            .build();

        dispatcher.dispatch(message("urn:1", 5)).await.unwrap();
        dispatcher.dispatch(message("urn:1", 3)).await.unwrap();
        dispatcher.dispatch(message("urn:1", 5)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_identifiers_are_independent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::builder()
            .register("apply_bibliographic", Arc::new(CountingHandler { calls: calls.clone() }))
            .build();

        dispatcher.dispatch(message("urn:1", 1)).await.unwrap();
        dispatcher.dispatch(message("urn:2", 1)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
