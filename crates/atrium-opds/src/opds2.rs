//! OPDS 2.x + ODL feed parsing. Publications without a `licenses` array
//! are plain OPDS2 (generic or unlimited-access); publications carrying
//! one are ODL and get the extra per-copy license reconciliation in
//! [`crate::extractor`].

use serde::Deserialize;

pub const ACCEPT_HEADER: &str = "application/opds+json";
pub const BORROW_REL: &str = "http://opds-spec.org/acquisition/borrow";
pub const GENERIC_ACQUISITION_REL: &str = "http://opds-spec.org/acquisition";
pub const SELF_REL: &str = "self";

#[derive(Clone, Debug, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub rel: Option<String>,
    pub href: String,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Availability {
    #[serde(default)]
    pub available: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PublicationMetadata {
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub publisher: Option<PublisherName>,
    #[serde(default)]
    pub availability: Availability,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PublisherName {
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OdlLicenseTerms {
    pub expires: Option<chrono::DateTime<chrono::Utc>>,
    pub concurrency: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OdlLicenseProtection {
    #[serde(default)]
    pub formats: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OdlLicenseMetadata {
    pub identifier: String,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub terms: OdlLicenseTerms,
    #[serde(default)]
    pub protection: Option<OdlLicenseProtection>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OdlLicense {
    pub metadata: OdlLicenseMetadata,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl OdlLicense {
    pub fn self_link(&self) -> Option<&Link> {
        self.links.iter().find(|link| {
            link.rel.as_deref() == Some(SELF_REL)
                && link.media_type.as_deref() == Some(crate::license_info::LICENSE_INFO_MEDIA_TYPE)
        })
    }

    pub fn borrow_link(&self) -> Option<&Link> {
        self.links
            .iter()
            .find(|link| link.rel.as_deref() == Some(BORROW_REL))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Publication {
    pub metadata: PublicationMetadata,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub licenses: Vec<OdlLicense>,
}

impl Publication {
    pub fn is_odl(&self) -> bool {
        !self.licenses.is_empty()
    }

    /// The publication's own acquisition links, used for the unlimited
    /// access (OAuth, no ODL licenses) BEARER_TOKEN synthesis path.
    pub fn acquisition_links(&self) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(|link| link.rel.as_deref() == Some(GENERIC_ACQUISITION_REL))
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Feed {
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Feed {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn next_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|link| link.rel.as_deref() == Some("next"))
            .map(|link| link.href.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "publications": [{
            "metadata": {"identifier": "urn:isbn:1", "title": "Example", "availability": {"available": true}},
            "links": [],
            "licenses": [{
                "metadata": {
                    "identifier": "lic-1",
                    "formats": ["application/epub+zip"],
                    "availability": {"available": true},
                    "terms": {"concurrency": 1}
                },
                "links": [
                    {"rel": "self", "href": "https://example.com/license/lic-1", "type": "application/vnd.odl.info+json"},
                    {"rel": "http://opds-spec.org/acquisition/borrow", "href": "https://example.com/borrow/lic-1", "type": "application/vnd.readium.lcp.license.v1.0+json"}
                ]
            }]
        }],
        "links": [{"rel": "next", "href": "https://example.com/page2"}]
    }"#;

    #[test]
    fn parses_odl_publication_with_license_links() {
        let feed = Feed::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(feed.next_url(), Some("https://example.com/page2".to_string()));
        let publication = &feed.publications[0];
        assert!(publication.is_odl());
        let license = &publication.licenses[0];
        assert_eq!(license.self_link().unwrap().href, "https://example.com/license/lic-1");
        assert_eq!(license.borrow_link().unwrap().href, "https://example.com/borrow/lic-1");
    }
}
