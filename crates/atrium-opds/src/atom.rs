//! OPDS 1.x feed parsing — plain Atom, no ODL licensing extension. An
//! entry's `<id>` is its identifier; pagination comes from `<link
//! rel="next">`.

use atrium_core::{Identifier, IdentifierType};
use serde::Deserialize;

pub const ACCEPT_HEADER: &str = "application/atom+xml;profile=opds-catalog";

#[derive(Clone, Debug, Deserialize)]
pub struct AtomLink {
    #[serde(rename = "@rel")]
    pub rel: Option<String>,
    #[serde(rename = "@href")]
    pub href: Option<String>,
    #[serde(rename = "@type")]
    pub media_type: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AtomAuthor {
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AtomEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "author", default)]
    pub authors: Vec<AtomAuthor>,
    #[serde(rename = "link", default)]
    pub links: Vec<AtomLink>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(rename = "dcterms:language", default)]
    pub language: Option<String>,
    #[serde(rename = "dcterms:publisher", default)]
    pub publisher: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename = "feed")]
pub struct AtomFeed {
    #[serde(rename = "link", default)]
    pub links: Vec<AtomLink>,
    #[serde(rename = "entry", default)]
    pub entries: Vec<AtomEntry>,
}

impl AtomFeed {
    pub fn parse(body: &[u8]) -> Result<Self, quick_xml::de::DeError> {
        quick_xml::de::from_str(std::str::from_utf8(body).unwrap_or_default())
    }

    pub fn next_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|link| link.rel.as_deref() == Some("next"))
            .and_then(|link| link.href.clone())
    }
}

/// Parse an Atom `<id>` (or any bare identifier string) into an
/// `Identifier`. Recognizes the `urn:isbn:`/`urn:overdrive:`/`urn:gutenberg:`
/// namespaces explicitly; any other `urn:<type>:<value>` becomes
/// `IdentifierType::Other(type)`; a bare `http(s)://` string becomes a URI;
/// anything else is rejected, mirroring upstream's `ValueError` on an
/// unparseable identifier.
pub fn identifier_from_urn(urn: &str) -> Result<Identifier, String> {
    if let Some(rest) = urn.strip_prefix("urn:isbn:") {
        return Ok(Identifier::new(IdentifierType::Isbn, rest));
    }
    if let Some(rest) = urn.strip_prefix("urn:overdrive:") {
        return Ok(Identifier::new(IdentifierType::Overdrive, rest));
    }
    if let Some(rest) = urn.strip_prefix("urn:gutenberg:") {
        return Ok(Identifier::new(IdentifierType::Gutenberg, rest));
    }
    if let Some(rest) = urn.strip_prefix("urn:") {
        let mut parts = rest.splitn(2, ':');
        let kind = parts.next();
        let value = parts.next();
        return match (kind, value) {
            (Some(kind), Some(value)) if !value.is_empty() => {
                Ok(Identifier::new(IdentifierType::Other(kind.to_string()), value))
            }
            _ => Ok(Identifier::new(IdentifierType::Urn, urn)),
        };
    }
    if urn.starts_with("http://") || urn.starts_with("https://") {
        return Ok(Identifier::new(IdentifierType::Uri, urn));
    }
    Err(format!("could not determine identifier type for '{urn}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_isbn_urn() {
        let id = identifier_from_urn("urn:isbn:9780000000000").unwrap();
        assert_eq!(id.kind, IdentifierType::Isbn);
        assert_eq!(id.value, "9780000000000");
    }

    #[test]
    fn parses_generic_namespaced_urn() {
        let id = identifier_from_urn("urn:bibliotheca:12345").unwrap();
        assert_eq!(id.kind, IdentifierType::Other("bibliotheca".to_string()));
    }

    #[test]
    fn rejects_bare_string() {
        assert!(identifier_from_urn("not-an-identifier").is_err());
    }

    #[test]
    fn feed_next_url_reads_rel_next_link() {
        let feed = AtomFeed {
            links: vec![AtomLink {
                rel: Some("next".to_string()),
                href: Some("https://example.com/page2".to_string()),
                media_type: None,
            }],
            entries: vec![],
        };
        assert_eq!(feed.next_url(), Some("https://example.com/page2".to_string()));
    }
}
