use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// PKCE verifier/challenge pair (§4.6): a random 96-byte verifier, base64url
/// encoded with no padding, and its SHA-256 digest similarly encoded as the
/// challenge sent in the authorization request.
#[derive(Clone, Debug)]
pub struct Pkce {
    pub code_verifier: String,
    pub code_challenge: String,
}

pub fn generate_pkce() -> Pkce {
    let mut bytes = [0u8; 96];
    rand::thread_rng().fill_bytes(&mut bytes);
    let code_verifier = URL_SAFE_NO_PAD.encode(bytes);

    let digest = Sha256::digest(code_verifier.as_bytes());
    let code_challenge = URL_SAFE_NO_PAD.encode(digest);

    Pkce { code_verifier, code_challenge }
}

/// A random 32-byte nonce, base64url encoded, bound into the ID token and
/// checked on callback.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_is_sha256_of_verifier() {
        let pkce = generate_pkce();
        let digest = Sha256::digest(pkce.code_verifier.as_bytes());
        assert_eq!(pkce.code_challenge, URL_SAFE_NO_PAD.encode(digest));
    }

    #[test]
    fn nonces_are_not_repeated() {
        assert_ne!(generate_nonce(), generate_nonce());
    }
}
