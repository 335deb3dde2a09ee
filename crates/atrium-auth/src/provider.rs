//! The polymorphic authentication interface every upstream protocol
//! implements. `remote_authenticate` validates credentials; a `None` result
//! means the patron is unknown (not an error). `remote_patron_lookup`
//! enriches an already-validated session with personal data and block
//! status — it never validates credentials itself.

use std::future::Future;
use std::pin::Pin;

use atrium_core::PatronData;

use crate::error::AuthError;

pub type AuthFuture<T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + Send>>;

pub trait AuthenticationProvider: Send + Sync {
    /// Validate `username`/`password` against the upstream. A patron unknown
    /// to the upstream is `Ok(None)`, never an error.
    fn remote_authenticate(&self, username: Option<String>, password: Option<String>) -> AuthFuture<Option<PatronData>>;

    /// Enrich a previously authenticated `PatronData` with personal name,
    /// fines, expiry, and block reason.
    fn remote_patron_lookup(&self, patron: PatronData) -> AuthFuture<Option<PatronData>>;
}
