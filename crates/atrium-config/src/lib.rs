//! atrium-config
//!
//! Typed, environment-driven configuration for every provider and subsystem
//! (§2a): one struct per concern, loaded with `std::env::var` plus explicit
//! parsing and defaults, mirroring the worker-service `Config::from_env()`
//! convention. Every malformed variable is its own `ConfigError` variant so
//! an operator can fix the one setting at fault.

pub mod admin;
pub mod collections;
pub mod environment;
pub mod error;
pub mod lockstore;
pub mod marc;
pub mod oidc;
pub mod s3;
pub mod sip2;
pub mod sirsidynix;

pub use collections::collection_from_env;
pub use environment::Environment;
pub use error::ConfigError;
pub use lockstore::LockStoreConfig;
pub use marc::{MarcExportSchedule, MarcLibraryConfig};
pub use oidc::{OidcProviderSettings, TokenEndpointAuthMethod};
pub use s3::S3Config;
pub use sip2::sip2_settings_from_env;
pub use sirsidynix::sirsidynix_settings_from_env;
