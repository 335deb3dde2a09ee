/// Some ILSes deviate from plain SIP2 in small, dialect-specific ways (field
/// presence, summary semantics). `GenericIls` is the plain-protocol default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sip2Dialect {
    GenericIls,
    Polaris,
}

impl Sip2Dialect {
    pub const fn preferred() -> Self {
        Self::GenericIls
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::GenericIls => "Generic ILS",
            Self::Polaris => "Polaris",
        }
    }
}

/// Character encoding SIP2 servers use for outgoing data. CP850 is the
/// historical SIP2 default; some ILSes allow UTF-8.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sip2Encoding {
    Utf8,
    Cp850,
}
