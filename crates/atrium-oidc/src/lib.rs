//! atrium-oidc
//!
//! Authorization Code + PKCE identity-provider integration (§4.6): discovery
//! document and JWKS fetch/caching, PKCE and nonce generation, signed state
//! tokens, token exchange/refresh, ID-token and back-channel logout-token
//! validation, and patron-id claim extraction, composed behind
//! [`OidcFlowManager`].

pub mod discovery;
pub mod error;
pub mod flow;
pub mod jwks;
pub mod patron_id;
pub mod pkce;
pub mod state;
pub mod token;

pub use discovery::{discover, DiscoveryDocument};
pub use error::OidcError;
pub use flow::{OidcFlowManager, OidcSettings};
pub use jwks::{fetch_jwks, Jwk, JwksDocument};
pub use patron_id::extract_patron_id;
pub use pkce::{generate_nonce, generate_pkce, Pkce};
pub use state::{sign_state, verify_state};
pub use token::{exchange_authorization_code, refresh_access_token, validate_claims, Claims, RefreshResponse, TokenEndpointAuthMethod, TokenResponse};
