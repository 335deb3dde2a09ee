use regex::Regex;

use crate::error::OidcError;

/// Extract the patron identifier from a claim value (§4.6). With no
/// pattern configured, the claim value is used verbatim. With one
/// configured, it must contain a named group `patron_id`; an empty capture
/// is rejected the same as a non-match.
pub fn extract_patron_id(claim_value: &str, pattern: Option<&str>) -> Result<String, OidcError> {
    let Some(pattern) = pattern else {
        if claim_value.is_empty() {
            return Err(OidcError::PatronIdExtraction("claim value is empty".to_string()));
        }
        return Ok(claim_value.to_string());
    };

    let regex = Regex::new(pattern).map_err(|e| OidcError::PatronIdExtraction(format!("invalid pattern: {e}")))?;
    let captures = regex
        .captures(claim_value)
        .ok_or_else(|| OidcError::PatronIdExtraction(format!("pattern did not match claim value '{claim_value}'")))?;
    let matched = captures
        .name("patron_id")
        .ok_or_else(|| OidcError::PatronIdExtraction("pattern has no 'patron_id' group".to_string()))?
        .as_str();

    if matched.is_empty() {
        return Err(OidcError::PatronIdExtraction("captured patron_id is empty".to_string()));
    }
    Ok(matched.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pattern_uses_claim_verbatim() {
        assert_eq!(extract_patron_id("patron-42", None).unwrap(), "patron-42");
    }

    #[test]
    fn pattern_extracts_named_group() {
        let id = extract_patron_id("urn:patron:42", Some(r"^urn:patron:(?P<patron_id>\d+)$")).unwrap();
        assert_eq!(id, "42");
    }

    #[test]
    fn empty_capture_is_rejected() {
        let result = extract_patron_id("urn:patron:", Some(r"^urn:patron:(?P<patron_id>\d*)$"));
        assert!(result.is_err());
    }

    #[test]
    fn non_matching_pattern_is_rejected() {
        let result = extract_patron_id("nope", Some(r"^urn:patron:(?P<patron_id>\d+)$"));
        assert!(result.is_err());
    }
}
