pub mod client;
pub mod dialect;
pub mod provider;
pub mod wire;

pub use dialect::{Sip2Dialect, Sip2Encoding};
pub use provider::Sip2AuthenticationProvider;

/// Everything needed to open a SIP2 session with one ACS endpoint. A fresh
/// TCP connection is opened per logical call (authenticate or lookup); SIP2
/// servers do not expect a long-lived session across patron requests.
#[derive(Clone, Debug)]
pub struct Sip2Settings {
    pub server: String,
    pub port: u16,
    pub login_user_id: String,
    pub login_password: String,
    pub location_code: String,
    pub institution_id: String,
    pub encoding: Sip2Encoding,
    pub field_separator: char,
    /// Whether to ask for and apply the patron status block (§fee_limit,
    /// deny-field list) during lookup. Some libraries run SIP2 purely for
    /// identity confirmation and disable this.
    pub patron_status_block: bool,
    pub timeout_secs: u64,
    pub dialect: Sip2Dialect,
    /// Forces `BlockReason::ExcessiveFines` once the patron's outstanding
    /// balance meets or exceeds this amount, regardless of the deny-field
    /// flags the ACS reports.
    pub fee_limit: Option<f64>,
}

impl Sip2Settings {
    pub fn new(server: impl Into<String>, login_user_id: impl Into<String>, login_password: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: 6001,
            login_user_id: login_user_id.into(),
            login_password: login_password.into(),
            location_code: String::new(),
            institution_id: String::new(),
            encoding: Sip2Encoding::Cp850,
            field_separator: '|',
            patron_status_block: true,
            timeout_secs: 10,
            dialect: Sip2Dialect::preferred(),
            fee_limit: None,
        }
    }
}
