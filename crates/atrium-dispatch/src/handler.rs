use std::future::Future;
use std::pin::Pin;

use crate::error::DispatchError;
use crate::message::ApplyMessage;

pub type DispatchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + 'a>>;

/// The persistence-repository trait boundary (§4.9) a message kind is
/// routed to. Implementations must be safe under at-least-once redelivery —
/// the dispatcher deduplicates only by ordering, never by message identity.
pub trait ApplyHandler: Send + Sync {
    fn apply(&self, message: &ApplyMessage) -> DispatchFuture<'_>;
}
