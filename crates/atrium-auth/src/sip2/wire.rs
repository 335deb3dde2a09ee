//! SIP2 message framing: building request strings and parsing the
//! length-prefixed, field-separated responses into typed structures. Pure
//! string manipulation — no I/O.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::HashMap;

use atrium_core::BlockReason;

pub const LOGIN_REQUEST: &str = "93";
pub const LOGIN_RESPONSE: &str = "94";
pub const SC_STATUS_REQUEST: &str = "99";
pub const ACS_STATUS_RESPONSE: &str = "98";
pub const PATRON_INFORMATION_REQUEST: &str = "63";
pub const PATRON_INFORMATION_RESPONSE: &str = "64";
pub const END_SESSION_REQUEST: &str = "35";
pub const END_SESSION_RESPONSE: &str = "36";

/// `YYYYMMDD    HHMMSS` — the 18-char transaction-date field every SIP2
/// request carries. The four middle bytes are a timezone code most ILSes
/// ignore; we always send blanks.
fn transaction_date(now: DateTime<Utc>) -> String {
    format!("{}    {}", now.format("%Y%m%d"), now.format("%H%M%S"))
}

pub fn build_login(separator: char, login_user_id: &str, login_password: &str, location_code: &str) -> String {
    format!(
        "{LOGIN_REQUEST}00CN{login_user_id}{separator}CO{login_password}{separator}CP{location_code}{separator}\r"
    )
}

pub fn build_sc_status(separator: char) -> String {
    format!("{SC_STATUS_REQUEST}0060{separator}\r")
}

pub fn build_patron_information(
    separator: char,
    now: DateTime<Utc>,
    institution_id: &str,
    patron_id: &str,
    patron_password: Option<&str>,
) -> String {
    let mut message = format!(
        "{PATRON_INFORMATION_REQUEST}000{}          AO{institution_id}{separator}AA{patron_id}{separator}",
        transaction_date(now),
    );
    if let Some(password) = patron_password {
        message.push_str(&format!("AD{password}{separator}"));
    }
    message.push('\r');
    message
}

pub fn build_end_session(separator: char, now: DateTime<Utc>, institution_id: &str, patron_id: &str) -> String {
    format!(
        "{END_SESSION_REQUEST}{}AO{institution_id}{separator}AA{patron_id}{separator}\r",
        transaction_date(now),
    )
}

/// Splits a response's variable-length fields (`XXvalue<sep>XXvalue<sep>...`)
/// into a code→value map. The first occurrence of a code wins, matching
/// typical SIP2 field semantics.
pub fn parse_variable_fields(body: &str, separator: char) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for chunk in body.split(separator) {
        let chunk = chunk.trim_end_matches(['\r', '\n']);
        if chunk.len() < 2 {
            continue;
        }
        let (code, value) = chunk.split_at(2);
        fields.entry(code.to_string()).or_insert_with(|| value.to_string());
    }
    fields
}

/// The 14 fixed yes/no flags making up a patron-information response's
/// leading "patron status" block (SIP2 §Patron Status field).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatronStatus {
    pub charge_privileges_denied: bool,
    pub renewal_privileges_denied: bool,
    pub recall_privileges_denied: bool,
    pub hold_privileges_denied: bool,
    pub card_reported_lost: bool,
    pub too_many_items_charged: bool,
    pub too_many_items_overdue: bool,
    pub too_many_renewals: bool,
    pub too_many_claims_of_items_returned: bool,
    pub too_many_items_lost: bool,
    pub excessive_outstanding_fines: bool,
    pub excessive_outstanding_fees: bool,
    pub recall_overdue: bool,
    pub too_many_items_billed: bool,
}

impl PatronStatus {
    /// Parses the leading 14-character fixed field (`Y` or space per
    /// position). Malformed/short input yields all-`false`.
    pub fn parse(raw: &str) -> Self {
        let flag = |i: usize| raw.as_bytes().get(i).copied() == Some(b'Y');
        Self {
            charge_privileges_denied: flag(0),
            renewal_privileges_denied: flag(1),
            recall_privileges_denied: flag(2),
            hold_privileges_denied: flag(3),
            card_reported_lost: flag(4),
            too_many_items_charged: flag(5),
            too_many_items_overdue: flag(6),
            too_many_renewals: flag(7),
            too_many_claims_of_items_returned: flag(8),
            too_many_items_lost: flag(9),
            excessive_outstanding_fines: flag(10),
            excessive_outstanding_fees: flag(11),
            recall_overdue: flag(12),
            too_many_items_billed: flag(13),
        }
    }
}

/// One entry in the configurable "fields that deny borrowing" list, in
/// priority order — the first flag set to `true` wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyField {
    CardReportedLost,
    ExcessiveFines,
    ExcessiveFees,
    TooManyItemsBilled,
    ChargePrivilegesDenied,
    TooManyItemsCharged,
    TooManyItemsOverdue,
    TooManyRenewals,
    TooManyItemsLost,
    RecallOverdue,
}

pub const DEFAULT_DENY_FIELDS: &[DenyField] = &[
    DenyField::CardReportedLost,
    DenyField::ExcessiveFines,
    DenyField::ExcessiveFees,
    DenyField::TooManyItemsBilled,
    DenyField::ChargePrivilegesDenied,
    DenyField::TooManyItemsCharged,
    DenyField::TooManyItemsOverdue,
    DenyField::TooManyRenewals,
    DenyField::TooManyItemsLost,
    DenyField::RecallOverdue,
];

impl DenyField {
    fn is_set(&self, status: &PatronStatus) -> bool {
        match self {
            Self::CardReportedLost => status.card_reported_lost,
            Self::ExcessiveFines => status.excessive_outstanding_fines,
            Self::ExcessiveFees => status.excessive_outstanding_fees,
            Self::TooManyItemsBilled => status.too_many_items_billed,
            Self::ChargePrivilegesDenied => status.charge_privileges_denied,
            Self::TooManyItemsCharged => status.too_many_items_charged,
            Self::TooManyItemsOverdue => status.too_many_items_overdue,
            Self::TooManyRenewals => status.too_many_renewals,
            Self::TooManyItemsLost => status.too_many_items_lost,
            Self::RecallOverdue => status.recall_overdue,
        }
    }

    fn block_reason(&self) -> BlockReason {
        match self {
            Self::CardReportedLost => BlockReason::CardReportedLost,
            Self::ExcessiveFines => BlockReason::ExcessiveFines,
            Self::ExcessiveFees => BlockReason::ExcessiveFees,
            // No closed BlockReason variant corresponds exactly; matched-but-unmapped.
            Self::TooManyItemsBilled => BlockReason::Unknown,
            Self::ChargePrivilegesDenied => BlockReason::NoBorrowingPrivileges,
            Self::TooManyItemsCharged => BlockReason::TooManyItemsOut,
            Self::TooManyItemsOverdue => BlockReason::TooManyOverdue,
            Self::TooManyRenewals => BlockReason::TooManyRenewals,
            Self::TooManyItemsLost => BlockReason::TooManyLost,
            Self::RecallOverdue => BlockReason::RecallOverdue,
        }
    }
}

/// First match wins over `deny_fields`, in the caller's configured order.
pub fn block_reason_from_status(status: &PatronStatus, deny_fields: &[DenyField]) -> BlockReason {
    deny_fields
        .iter()
        .find(|field| field.is_set(status))
        .map(DenyField::block_reason)
        .unwrap_or(BlockReason::NoValue)
}

/// Accepts `YYYYMMDD` (8 chars) or `YYYYMMDD` + 4 ignored timezone bytes +
/// `HHMMSS` (18 chars total) — the three date shapes SIP2 ILSes send in
/// practice collapse to these two once the timezone bytes are ignored.
pub fn parse_sip_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw.get(0..8)?, "%Y%m%d").ok()?;
    let time = if raw.len() >= 18 {
        NaiveTime::parse_from_str(raw.get(12..18)?, "%H%M%S").ok()?
    } else {
        NaiveTime::default()
    };
    Utc.from_local_datetime(&date.and_time(time)).single()
}

/// Parses a monetary amount field (e.g. `BV`, `CC`) as a plain decimal,
/// ignoring any currency code carried alongside it.
pub fn parse_money(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_variable_fields() {
        let fields = parse_variable_fields("AOinst|AApatron123|AEJane Doe|", '|');
        assert_eq!(fields.get("AO").unwrap(), "inst");
        assert_eq!(fields.get("AA").unwrap(), "patron123");
        assert_eq!(fields.get("AE").unwrap(), "Jane Doe");
    }

    #[test]
    fn parses_patron_status_flags() {
        let status = PatronStatus::parse("Y            Y");
        assert!(status.charge_privileges_denied);
        assert!(status.too_many_items_billed);
        assert!(!status.card_reported_lost);
    }

    #[test]
    fn first_deny_field_wins() {
        let mut status = PatronStatus::default();
        status.excessive_outstanding_fines = true;
        status.too_many_items_lost = true;
        assert_eq!(block_reason_from_status(&status, DEFAULT_DENY_FIELDS), BlockReason::ExcessiveFines);
    }

    #[test]
    fn no_deny_field_set_is_no_value() {
        let status = PatronStatus::default();
        assert_eq!(block_reason_from_status(&status, DEFAULT_DENY_FIELDS), BlockReason::NoValue);
    }

    #[test]
    fn parses_date_only_format() {
        let parsed = parse_sip_date("20260115").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2026-01-15");
    }

    #[test]
    fn parses_full_datetime_format() {
        let parsed = parse_sip_date("20260115    235911").unwrap();
        assert_eq!(parsed.format("%H:%M:%S").to_string(), "23:59:11");
    }
}
