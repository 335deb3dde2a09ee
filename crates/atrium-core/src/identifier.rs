use serde::{Deserialize, Serialize};
use std::fmt;

/// The identifier namespaces recognized across upstream providers. Open
/// namespaces (a new ILS vendor scheme) are represented by `Other` rather
/// than requiring a crate release.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentifierType {
    Urn,
    Isbn,
    Overdrive,
    Gutenberg,
    Uri,
    Other(String),
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Urn => write!(f, "URN"),
            Self::Isbn => write!(f, "ISBN"),
            Self::Overdrive => write!(f, "Overdrive"),
            Self::Gutenberg => write!(f, "Gutenberg"),
            Self::Uri => write!(f, "URI"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A typed opaque string, globally unique by (type, value). Equivalence
/// edges between identifiers are a persistence-layer concern and not
/// modeled here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: IdentifierType,
    pub value: String,
}

impl Identifier {
    pub fn new(kind: IdentifierType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// The `urn:...` form used as a MARC 001 field and as the canonical
    /// cross-provider key.
    pub fn urn(&self) -> String {
        match &self.kind {
            IdentifierType::Urn => self.value.clone(),
            IdentifierType::Isbn => format!("urn:isbn:{}", self.value),
            IdentifierType::Overdrive => format!("urn:overdrive:{}", self.value),
            IdentifierType::Gutenberg => format!("urn:gutenberg:{}", self.value),
            IdentifierType::Uri => self.value.clone(),
            IdentifierType::Other(name) => format!("urn:{name}:{}", self.value),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.urn())
    }
}
