use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A library member identified by one or more of authorization identifier,
/// username, or external identifier, tied to exactly one library.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patron {
    pub library_id: String,
    pub authorization_identifier: Option<String>,
    pub username: Option<String>,
    pub external_identifier: Option<String>,
}

/// The closed taxonomy of reasons a provider may refuse to let a patron
/// borrow. `Unknown` ("matched a provider signal but not a known one") is
/// distinct from `NoValue` ("no signal at all") — collapsing the two would
/// silently discard information a provider did report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    NoValue,
    CardReportedLost,
    ExcessiveFines,
    ExcessiveFees,
    TooManyItemsOut,
    TooManyOverdue,
    TooManyLost,
    TooManyRenewals,
    RecallOverdue,
    NoBorrowingPrivileges,
    Unknown,
    Expired,
    NotApproved,
}

impl Default for BlockReason {
    fn default() -> Self {
        Self::NoValue
    }
}

impl BlockReason {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Self::NoValue)
    }
}

/// Authentication-time snapshot returned by an `AuthenticationProvider`.
/// Never partially populated: `complete = false` means a second
/// `remote_patron_lookup` round-trip is required before the remaining
/// fields can be trusted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatronData {
    pub permanent_id: String,
    pub authorization_identifier: Option<String>,
    pub personal_name: Option<String>,
    pub email: Option<String>,
    pub fines: Option<f64>,
    pub patron_type: Option<String>,
    pub authorization_expires: Option<DateTime<Utc>>,
    pub block_reason: BlockReason,
    pub library_identifier: Option<String>,
    pub complete: bool,
}

impl PatronData {
    pub fn new(permanent_id: impl Into<String>) -> Self {
        Self {
            permanent_id: permanent_id.into(),
            authorization_identifier: None,
            personal_name: None,
            email: None,
            fines: None,
            patron_type: None,
            authorization_expires: None,
            block_reason: BlockReason::NoValue,
            library_identifier: None,
            complete: false,
        }
    }
}
