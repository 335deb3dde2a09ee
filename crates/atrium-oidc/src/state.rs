use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::OidcError;

type HmacSha256 = Hmac<Sha256>;

/// Sign `data` (an arbitrary JSON payload, typically the code verifier plus
/// caller-supplied context) into a one-shot state token: `state =
/// base64url(HMAC_SHA256(secret, data)) + "." + base64url(data)`, with a
/// `timestamp` field stamped into `data` so [`verify_state`] can enforce a
/// maximum age (§4.6).
pub fn sign_state(secret: &[u8], mut data: serde_json::Value) -> String {
    if let serde_json::Value::Object(ref mut map) = data {
        map.insert("timestamp".to_string(), serde_json::json!(Utc::now().timestamp()));
    }
    let data_bytes = serde_json::to_vec(&data).expect("state payload always serializes");
    let data_b64 = URL_SAFE_NO_PAD.encode(&data_bytes);

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(data_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

    format!("{sig_b64}.{data_b64}")
}

/// Verify a state token's signature and freshness, returning the embedded
/// JSON payload. Rejects tokens whose timestamp is older than `max_age_secs`
/// or that claim to be from the future (clock skew beyond a few seconds
/// suggests tampering, not drift, for a value this crate itself stamped).
pub fn verify_state(secret: &[u8], token: &str, max_age_secs: i64) -> Result<serde_json::Value, OidcError> {
    let (sig_b64, data_b64) = token.split_once('.').ok_or(OidcError::InvalidState)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(data_b64.as_bytes());
    let expected = mac.finalize().into_bytes();

    let provided = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| OidcError::InvalidState)?;
    if provided.len() != expected.len() || provided.ct_eq(&expected).unwrap_u8() != 1 {
        return Err(OidcError::InvalidState);
    }

    let data_bytes = URL_SAFE_NO_PAD.decode(data_b64).map_err(|_| OidcError::InvalidState)?;
    let data: serde_json::Value = serde_json::from_slice(&data_bytes).map_err(|_| OidcError::InvalidState)?;

    let timestamp = data.get("timestamp").and_then(|v| v.as_i64()).ok_or(OidcError::InvalidState)?;
    let now = Utc::now().timestamp();
    if timestamp > now + 5 {
        return Err(OidcError::InvalidState);
    }
    if now - timestamp > max_age_secs {
        return Err(OidcError::InvalidState);
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_valid_state() {
        let secret = b"signing-secret";
        let token = sign_state(secret, serde_json::json!({"code_verifier": "abc"}));
        let data = verify_state(secret, &token, 600).unwrap();
        assert_eq!(data["code_verifier"], "abc");
    }

    #[test]
    fn rejects_tampered_signature() {
        let secret = b"signing-secret";
        let token = sign_state(secret, serde_json::json!({"code_verifier": "abc"}));
        let mut tampered = token.clone();
        tampered.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });
        assert!(verify_state(secret, &tampered, 600).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sign_state(b"secret-one", serde_json::json!({}));
        assert!(verify_state(b"secret-two", &token, 600).is_err());
    }

    #[test]
    fn rejects_expired_state() {
        let secret = b"signing-secret";
        let mut payload = serde_json::json!({});
        payload["timestamp"] = serde_json::json!(Utc::now().timestamp() - 1000);
        let data_bytes = serde_json::to_vec(&payload).unwrap();
        let data_b64 = URL_SAFE_NO_PAD.encode(&data_bytes);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(data_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        let token = format!("{sig_b64}.{data_b64}");

        assert!(verify_state(secret, &token, 600).is_err());
    }
}
