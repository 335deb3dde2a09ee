//! SirsiDynix Horizon Web Services patron authentication (§4.5): three JSON
//! calls — `user/patron/login`, `user/patron/key/{id}`,
//! `user/patronStatusInfo/key/{id}` — sharing one session token.

use atrium_core::{BlockReason, PatronData};
use atrium_http::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::AuthError;
use crate::provider::{AuthFuture, AuthenticationProvider};
use crate::sirsidynix::SirsiDynixSettings;

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "sessionToken")]
    session_token: String,
    #[serde(rename = "patronKey")]
    patron_key: String,
}

#[derive(Deserialize)]
struct PatronResponse {
    fields: PatronFields,
}

/// Fields from `user/patron/key/{id}`. `approved`/`standing` are the ILS's
/// approval signal for this patron — checked before any status lookup, per
/// the original's `remote_patron_lookup`.
#[derive(Deserialize)]
struct PatronFields {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    barcode: Option<String>,
    #[serde(rename = "patronType")]
    patron_type: Option<SirsiKeyed>,
    approved: Option<bool>,
    standing: Option<SirsiKeyed>,
}

#[derive(Deserialize)]
struct SirsiKeyed {
    key: String,
}

#[derive(Deserialize)]
struct PatronStatusResponse {
    fields: PatronStatusFields,
}

/// Fields from `user/patronStatusInfo/key/{id}`. The block-reason booleans
/// mirror the ILS's own `hasMax*`/`expired` vocabulary; there is no
/// `totalOverdueItems`/`totalLostItems`/`totalItemsOut` on this payload.
#[derive(Deserialize)]
struct PatronStatusFields {
    expired: Option<bool>,
    #[serde(rename = "hasMaxDaysWithFines")]
    has_max_days_with_fines: Option<bool>,
    #[serde(rename = "hasMaxFines")]
    has_max_fines: Option<bool>,
    #[serde(rename = "hasMaxLostItem")]
    has_max_lost_item: Option<bool>,
    #[serde(rename = "hasMaxOverdueDays")]
    has_max_overdue_days: Option<bool>,
    #[serde(rename = "hasMaxOverdueItem")]
    has_max_overdue_item: Option<bool>,
    #[serde(rename = "hasMaxItemsCheckedOut")]
    has_max_items_checked_out: Option<bool>,
    #[serde(rename = "estimatedFines")]
    estimated_fines: Option<SirsiAmount>,
}

#[derive(Deserialize)]
struct SirsiAmount {
    amount: Option<String>,
}

/// Validates credentials and enriches sessions against a SirsiDynix Horizon
/// WS endpoint. Login establishes a session token that `remote_patron_lookup`
/// reuses for the profile and status calls.
pub struct SirsiDynixAuthenticationProvider {
    settings: SirsiDynixSettings,
    http: Client,
}

impl SirsiDynixAuthenticationProvider {
    pub fn new(settings: SirsiDynixSettings) -> Self {
        Self { settings, http: Client::for_worker() }
    }

    fn url(&self, relative_path: &str) -> Result<String, AuthError> {
        if relative_path.starts_with('/') {
            return Err(AuthError::InvalidPath(relative_path.to_string()));
        }
        Ok(format!("{}{}", self.settings.server_url, relative_path))
    }

    fn base_headers<'a>(&'a self, session_token: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
        let mut headers = vec![
            ("SD-Originating-App-Id", self.settings.sirsi_app_id.as_str()),
            ("SD-Working-LibraryID", self.settings.library_id.as_str()),
            ("x-sirs-clientID", self.settings.client_id.as_str()),
        ];
        if let Some(token) = session_token {
            headers.push(("x-sirs-sessionToken", token));
        }
        headers
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let url = self.url("user/patron/login")?;
        let headers = self.base_headers(None);
        let body = json!({ "login": username, "password": password });

        let response = self
            .http
            .request_with(reqwest::Method::POST, &url, atrium_http::RequestOptions::for_worker(), |b| {
                let mut b = b.json(&body);
                for (name, value) in &headers {
                    b = b.header(*name, *value);
                }
                b
            })
            .await
            .map_err(|e| self.map_http_error(&url, e))?;

        if response.status().as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Protocol {
                server: self.settings.server_url.clone(),
                message: format!("login rejected: {body}"),
            });
        }

        response.json::<LoginResponse>().await.map_err(|e| AuthError::Protocol {
            server: self.settings.server_url.clone(),
            message: format!("malformed login response: {e}"),
        })
    }

    async fn fetch_patron(&self, patron_key: &str, session_token: &str) -> Result<PatronResponse, AuthError> {
        let url = self.url(&format!("user/patron/key/{patron_key}"))?;
        self.get_json(&url, session_token).await
    }

    async fn fetch_status(&self, patron_key: &str, session_token: &str) -> Result<PatronStatusResponse, AuthError> {
        let url = self.url(&format!("user/patronStatusInfo/key/{patron_key}"))?;
        self.get_json(&url, session_token).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, session_token: &str) -> Result<T, AuthError> {
        let headers = self.base_headers(Some(session_token));
        let response = self
            .http
            .request_with(reqwest::Method::GET, url, atrium_http::RequestOptions::for_worker(), |b| {
                let mut b = b;
                for (name, value) in &headers {
                    b = b.header(*name, *value);
                }
                b
            })
            .await
            .map_err(|e| self.map_http_error(url, e))?;

        if response.status().as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Protocol {
                server: self.settings.server_url.clone(),
                message: format!("request to {url} failed: {body}"),
            });
        }

        response.json::<T>().await.map_err(|e| AuthError::Protocol {
            server: self.settings.server_url.clone(),
            message: format!("malformed response from {url}: {e}"),
        })
    }

    fn map_http_error(&self, url: &str, error: atrium_http::HttpError) -> AuthError {
        AuthError::Unreachable { server: url.to_string(), message: error.to_string() }
    }

    /// Block-reason precedence per §4.5: `expired` wins outright; otherwise
    /// fines, lost items, overdue items, and checked-out-item limits are
    /// checked in that order, each matching either of the ILS's two
    /// boolean flags for that condition.
    fn block_reason(&self, status: &PatronStatusFields) -> BlockReason {
        if status.expired.unwrap_or(false) {
            BlockReason::Expired
        } else if status.has_max_days_with_fines.unwrap_or(false) || status.has_max_fines.unwrap_or(false) {
            BlockReason::ExcessiveFines
        } else if status.has_max_lost_item.unwrap_or(false) {
            BlockReason::TooManyLost
        } else if status.has_max_overdue_days.unwrap_or(false) || status.has_max_overdue_item.unwrap_or(false) {
            BlockReason::TooManyOverdue
        } else if status.has_max_items_checked_out.unwrap_or(false) {
            BlockReason::TooManyItemsOut
        } else {
            BlockReason::NoValue
        }
    }

    fn is_approved(&self, patron: &PatronFields) -> bool {
        patron.approved.unwrap_or(false)
            || patron
                .standing
                .as_ref()
                .map(|s| s.key.to_lowercase() == "ok")
                .unwrap_or(false)
    }

    fn restriction_suffix_blocked(&self, patron_type: Option<&str>) -> bool {
        let Some(patron_type) = patron_type else { return false };
        self.settings
            .disallowed_suffixes
            .iter()
            .any(|suffix| patron_type.ends_with(suffix.as_str()))
    }

    /// Login, then enrich: approval and the disallowed-suffix restriction
    /// are both decided from the patron-fields response alone and short-
    /// circuit before `patronStatusInfo` is ever requested, matching the
    /// original's `remote_patron_lookup` — a not-approved or suffix-blocked
    /// patron never incurs that extra round-trip, and never gets fines or
    /// fines-derived fields populated.
    async fn authenticate_and_lookup(&self, username: &str, password: &str) -> Result<Option<PatronData>, AuthError> {
        let login = self.login(username, password).await?;
        let patron = self.fetch_patron(&login.patron_key, &login.session_token).await?;

        let mut data = PatronData::new(login.patron_key.clone());
        data.authorization_identifier = patron.fields.barcode.clone();
        data.personal_name = patron.fields.display_name.clone();
        data.complete = true;

        if !self.is_approved(&patron.fields) {
            data.block_reason = BlockReason::NotApproved;
            return Ok(Some(data));
        }

        let patron_type = patron.fields.patron_type.as_ref().map(|k| k.key.as_str());
        if self.restriction_suffix_blocked(patron_type) {
            data.block_reason = BlockReason::NoBorrowingPrivileges;
            return Ok(Some(data));
        }

        let status = self.fetch_status(&login.patron_key, &login.session_token).await?;
        data.fines = status
            .fields
            .estimated_fines
            .as_ref()
            .and_then(|a| a.amount.as_deref())
            .and_then(|s| s.parse::<f64>().ok());

        let mut block_reason = self.block_reason(&status.fields);
        if !self.settings.patron_status_block && block_reason != BlockReason::Expired {
            block_reason = BlockReason::NoValue;
        }
        data.block_reason = block_reason;

        Ok(Some(data))
    }
}

impl AuthenticationProvider for SirsiDynixAuthenticationProvider {
    fn remote_authenticate(&self, username: Option<String>, password: Option<String>) -> AuthFuture<Option<PatronData>> {
        let settings = self.settings.clone();
        Box::pin(async move {
            let (Some(username), Some(password)) = (username, password) else { return Ok(None) };
            let provider = SirsiDynixAuthenticationProvider::new(settings);
            provider.authenticate_and_lookup(&username, &password).await
        })
    }

    fn remote_patron_lookup(&self, patron: PatronData) -> AuthFuture<Option<PatronData>> {
        // SirsiDynix has no anonymous profile lookup; re-authenticating
        // requires credentials this provider does not retain, so a bare
        // lookup can only hand back what it was given.
        Box::pin(async move { Ok(Some(patron)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SirsiDynixSettings {
        let mut settings = SirsiDynixSettings::new("https://ils.example.org/", "PALACE_CLIENT", "MAIN");
        settings.disallowed_suffixes = vec!["ls".to_string()];
        settings
    }

    #[test]
    fn rejects_absolute_paths() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let err = provider.url("/user/patron/login").unwrap_err();
        assert!(matches!(err, AuthError::InvalidPath(_)));
    }

    fn status(
        expired: bool,
        has_max_days_with_fines: bool,
        has_max_fines: bool,
        has_max_lost_item: bool,
        has_max_overdue_days: bool,
        has_max_overdue_item: bool,
        has_max_items_checked_out: bool,
    ) -> PatronStatusFields {
        PatronStatusFields {
            expired: Some(expired),
            has_max_days_with_fines: Some(has_max_days_with_fines),
            has_max_fines: Some(has_max_fines),
            has_max_lost_item: Some(has_max_lost_item),
            has_max_overdue_days: Some(has_max_overdue_days),
            has_max_overdue_item: Some(has_max_overdue_item),
            has_max_items_checked_out: Some(has_max_items_checked_out),
            estimated_fines: None,
        }
    }

    #[test]
    fn approved_via_approved_flag() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let patron = PatronFields {
            display_name: None,
            barcode: None,
            patron_type: None,
            approved: Some(true),
            standing: None,
        };
        assert!(provider.is_approved(&patron));
    }

    #[test]
    fn approved_via_standing_ok() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let patron = PatronFields {
            display_name: None,
            barcode: None,
            patron_type: None,
            approved: Some(false),
            standing: Some(SirsiKeyed { key: "OK".to_string() }),
        };
        assert!(provider.is_approved(&patron));
    }

    #[test]
    fn disallowed_suffix_blocks() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        assert!(provider.restriction_suffix_blocked(Some("cls")));
        assert!(!provider.restriction_suffix_blocked(Some("reg")));
    }

    #[test]
    fn expired_wins_over_excessive_fines() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let status = status(true, true, true, true, true, true, true);
        assert_eq!(provider.block_reason(&status), BlockReason::Expired);
    }

    #[test]
    fn excessive_fines_precedence_over_lost_and_overdue() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let has_max_fines_only = status(false, false, true, true, true, true, true);
        assert_eq!(provider.block_reason(&has_max_fines_only), BlockReason::ExcessiveFines);
    }

    #[test]
    fn lost_item_wins_over_overdue_and_items_checked_out() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let has_max_lost_item_only = status(false, false, false, true, true, true, true);
        assert_eq!(provider.block_reason(&has_max_lost_item_only), BlockReason::TooManyLost);
    }

    #[test]
    fn overdue_days_or_items_precede_items_checked_out() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let has_max_overdue_item_only = status(false, false, false, false, false, true, true);
        assert_eq!(provider.block_reason(&has_max_overdue_item_only), BlockReason::TooManyOverdue);
    }

    #[test]
    fn items_checked_out_is_the_last_resort() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let has_max_items_checked_out_only = status(false, false, false, false, false, false, true);
        assert_eq!(provider.block_reason(&has_max_items_checked_out_only), BlockReason::TooManyItemsOut);
    }

    #[test]
    fn no_flags_set_is_unblocked() {
        let provider = SirsiDynixAuthenticationProvider::new(settings());
        let clean = status(false, false, false, false, false, false, false);
        assert_eq!(provider.block_reason(&clean), BlockReason::NoValue);
    }
}
