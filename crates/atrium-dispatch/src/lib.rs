//! atrium-dispatch
//!
//! Apply Dispatcher (§4.9): routes `apply_bibliographic` and
//! `apply_circulation` messages produced by the OPDS/ODL importer to
//! persistence-layer handlers, preserving per-identifier submission order
//! and resolving redeliveries/out-of-order arrivals with last-write-wins
//! on each message's `update_number`.

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::DispatchError;
pub use handler::{ApplyHandler, DispatchFuture};
pub use message::{ApplyKind, ApplyMessage};
