use thiserror::Error;

/// Failure modes of dispatching a single `ApplyMessage`. None of these are
/// retried by the dispatcher itself — a handler that wants at-least-once
/// redelivery to actually retry must signal that through its own return
/// value to the worker-queue layer, which is out of scope here.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for message kind '{0}'")]
    UnknownKind(String),

    #[error("handler for '{kind}' failed on identifier {identifier}: {message}")]
    HandlerFailed {
        kind: String,
        identifier: String,
        message: String,
    },
}
