//! atrium-auth
//!
//! Patron-authentication providers sharing one polymorphic interface (§4.5):
//! SIP2, SirsiDynix Horizon, and a local basic provider for fixtures and
//! small deployments. Every provider maps its own failure modes onto the
//! shared `PatronData`/`BlockReason` vocabulary from `atrium-core`.

pub mod basic;
pub mod error;
pub mod provider;
pub mod sip2;
pub mod sirsidynix;

pub use basic::{BasicLocalProvider, LocalCredential};
pub use error::AuthError;
pub use provider::{AuthFuture, AuthenticationProvider};
