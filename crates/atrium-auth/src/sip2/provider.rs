use chrono::Utc;

use atrium_core::{BlockReason, PatronData};

use crate::error::AuthError;
use crate::provider::{AuthFuture, AuthenticationProvider};
use crate::sip2::client::Sip2Connection;
use crate::sip2::wire::{
    self, block_reason_from_status, parse_money, parse_sip_date, parse_variable_fields, PatronStatus,
    DEFAULT_DENY_FIELDS, LOGIN_RESPONSE, PATRON_INFORMATION_RESPONSE,
};
use crate::sip2::Sip2Settings;

/// SIP2 authenticates by round-tripping `patron_information` with the
/// candidate username/password and checking the ACS accepted it — SIP2 has
/// no separate credential-check message. `remote_patron_lookup` repeats the
/// same call without a password to refresh status for an already-trusted
/// session.
pub struct Sip2AuthenticationProvider {
    settings: Sip2Settings,
}

impl Sip2AuthenticationProvider {
    pub fn new(settings: Sip2Settings) -> Self {
        Self { settings }
    }

    async fn open_session(&self) -> Result<Sip2Connection, AuthError> {
        let mut connection = Sip2Connection::connect(&self.settings.server, self.settings.port, self.settings.timeout_secs).await?;

        let login = wire::build_login(
            self.settings.field_separator,
            &self.settings.login_user_id,
            &self.settings.login_password,
            &self.settings.location_code,
        );
        let response = connection.exchange(&login).await?;
        if !response.starts_with(LOGIN_RESPONSE) || response.get(2..3) != Some("1") {
            return Err(AuthError::Protocol { server: self.settings.server.clone(), message: "login rejected".into() });
        }

        let status = wire::build_sc_status(self.settings.field_separator);
        connection.exchange(&status).await?;

        Ok(connection)
    }

    async fn patron_information(&self, patron_id: &str, patron_password: Option<&str>) -> Result<Option<PatronData>, AuthError> {
        let mut connection = self.open_session().await?;

        let request = wire::build_patron_information(
            self.settings.field_separator,
            Utc::now(),
            &self.settings.institution_id,
            patron_id,
            patron_password,
        );
        let response = connection.exchange(&request).await?;

        let end_session = wire::build_end_session(self.settings.field_separator, Utc::now(), &self.settings.institution_id, patron_id);
        connection.exchange(&end_session).await?;
        connection.disconnect().await;

        self.parse_patron_information(&response, patron_id)
    }

    fn parse_patron_information(&self, response: &str, patron_id: &str) -> Result<Option<PatronData>, AuthError> {
        if !response.starts_with(PATRON_INFORMATION_RESPONSE) {
            return Err(AuthError::Protocol { server: self.settings.server.clone(), message: "unexpected response to patron information".into() });
        }
        let body = &response[2..];
        let status_field = body.get(0..14).ok_or_else(|| AuthError::Protocol {
            server: self.settings.server.clone(),
            message: "truncated patron status field".into(),
        })?;
        let status = PatronStatus::parse(status_field);

        let variable_start = body.find("AO").ok_or_else(|| AuthError::Protocol {
            server: self.settings.server.clone(),
            message: "missing institution id field".into(),
        })?;
        let fields = parse_variable_fields(&body[variable_start..], self.settings.field_separator);

        if fields.get("CQ").map(String::as_str) == Some("N") {
            return Ok(None);
        }

        let mut data = PatronData::new(fields.get("AA").cloned().unwrap_or_else(|| patron_id.to_string()));
        data.authorization_identifier = fields.get("AA").cloned();
        data.personal_name = fields.get("AE").cloned();
        data.email = fields.get("BE").cloned();
        if let Some(expiry) = fields.get("PA").or_else(|| fields.get("PD")) {
            data.authorization_expires = parse_sip_date(expiry);
        }

        let balance = fields.get("BV").and_then(|raw| parse_money(raw));
        data.fines = balance;

        let mut block_reason = if self.settings.patron_status_block {
            block_reason_from_status(&status, DEFAULT_DENY_FIELDS)
        } else {
            BlockReason::NoValue
        };

        if let Some(limit) = self.settings.fee_limit {
            if balance.unwrap_or(0.0) >= limit {
                block_reason = BlockReason::ExcessiveFines;
            }
        }
        data.block_reason = block_reason;
        data.complete = true;

        Ok(Some(data))
    }
}

impl AuthenticationProvider for Sip2AuthenticationProvider {
    fn remote_authenticate(&self, username: Option<String>, password: Option<String>) -> AuthFuture<Option<PatronData>> {
        let settings = self.settings.clone();
        Box::pin(async move {
            let (Some(username), password) = (username, password) else { return Ok(None) };
            let provider = Sip2AuthenticationProvider::new(settings);
            provider.patron_information(&username, password.as_deref()).await
        })
    }

    fn remote_patron_lookup(&self, patron: PatronData) -> AuthFuture<Option<PatronData>> {
        let settings = self.settings.clone();
        let patron_id = patron.authorization_identifier.clone().unwrap_or(patron.permanent_id.clone());
        Box::pin(async move {
            let provider = Sip2AuthenticationProvider::new(settings);
            provider.patron_information(&patron_id, None).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Sip2Settings {
        let mut settings = Sip2Settings::new("sip.example.org", "scuser", "scpass");
        settings.institution_id = "MAIN".to_string();
        settings
    }

    #[test]
    fn parses_active_patron_response() {
        let provider = Sip2AuthenticationProvider::new(settings());
        let response = "64              00120260115    120000AOMAIN|AApatron-9|AEJane Doe|BV0.00|";
        let patron = provider.parse_patron_information(response, "patron-9").unwrap().unwrap();
        assert_eq!(patron.permanent_id, "patron-9");
        assert_eq!(patron.personal_name.as_deref(), Some("Jane Doe"));
        assert_eq!(patron.block_reason, BlockReason::NoValue);
    }

    #[test]
    fn fee_limit_override_forces_excessive_fines() {
        let mut config = settings();
        config.fee_limit = Some(5.0);
        let provider = Sip2AuthenticationProvider::new(config);
        let response = "64              00120260115    120000AOMAIN|AApatron-9|BV12.50|";
        let patron = provider.parse_patron_information(response, "patron-9").unwrap().unwrap();
        assert_eq!(patron.block_reason, BlockReason::ExcessiveFines);
    }

    #[test]
    fn card_reported_lost_flag_wins_over_fines() {
        let provider = Sip2AuthenticationProvider::new(settings());
        let response = "    Y         00120260115    120000AOMAIN|AApatron-9|BV0.00|";
        let patron = provider.parse_patron_information(response, "patron-9").unwrap().unwrap();
        assert_eq!(patron.block_reason, BlockReason::CardReportedLost);
    }

    #[test]
    fn unknown_patron_flag_yields_none() {
        let provider = Sip2AuthenticationProvider::new(settings());
        let response = "64              00120260115    120000AOMAIN|AApatron-9|CQN|";
        let patron = provider.parse_patron_information(response, "patron-9").unwrap();
        assert!(patron.is_none());
    }
}
