//! Admin-UI-facing metadata for the config structs in this crate: label,
//! help text, and (for enum-like fields) the option set a form would offer.
//! This is plain data with no wiring to any admin surface — building that
//! surface is a collaborator's job (§2a) — but it keeps the description of
//! "what an operator sees" next to the struct it describes instead of
//! drifting into a separate UI-only codebase.

/// One field's admin-form description.
pub struct SettingDescription {
    pub key: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub required: bool,
    pub options: &'static [&'static str],
}

pub const SIP2_SETTINGS: &[SettingDescription] = &[
    SettingDescription {
        key: "server",
        label: "Server",
        help_text: "Hostname of the SIP2 server.",
        required: true,
        options: &[],
    },
    SettingDescription {
        key: "port",
        label: "Port",
        help_text: "Port to connect to on the SIP2 server.",
        required: false,
        options: &[],
    },
    SettingDescription {
        key: "dialect",
        label: "Dialect",
        help_text: "Select the SIP2 dialect used by the ILS.",
        required: false,
        options: &["generic", "polaris"],
    },
    SettingDescription {
        key: "encoding",
        label: "Encoding",
        help_text: "Text encoding used by the SIP2 server.",
        required: false,
        options: &["cp850", "utf-8"],
    },
    SettingDescription {
        key: "patron_status_block",
        label: "Use patron status for blocking",
        help_text: "If disabled, block reasons reported by the server are ignored.",
        required: false,
        options: &["true", "false"],
    },
];

pub const SIRSIDYNIX_SETTINGS: &[SettingDescription] = &[
    SettingDescription {
        key: "server_url",
        label: "Server",
        help_text: "Base URL of the SirsiDynix Horizon Web Services endpoint.",
        required: true,
        options: &[],
    },
    SettingDescription {
        key: "client_id",
        label: "Client ID",
        help_text: "Value sent as the x-sirs-clientID header.",
        required: true,
        options: &[],
    },
    SettingDescription {
        key: "disallowed_suffixes",
        label: "Disallowed patron type suffixes",
        help_text: "Comma-separated list of patron type suffixes that should be blocked from borrowing.",
        required: false,
        options: &[],
    },
];

pub const OIDC_SETTINGS: &[SettingDescription] = &[
    SettingDescription {
        key: "client_id",
        label: "Client ID",
        help_text: "OAuth client identifier registered with the identity provider.",
        required: true,
        options: &[],
    },
    SettingDescription {
        key: "client_secret",
        label: "Client secret",
        help_text: "OAuth client secret registered with the identity provider.",
        required: true,
        options: &[],
    },
    SettingDescription {
        key: "issuer_url",
        label: "Issuer URL",
        help_text: "Used for OpenID Connect discovery. Leave blank to configure endpoints manually.",
        required: false,
        options: &[],
    },
    SettingDescription {
        key: "token_endpoint_auth_method",
        label: "Token endpoint authentication method",
        help_text: "How the client authenticates to the token endpoint.",
        required: false,
        options: &["client_secret_post", "client_secret_basic"],
    },
    SettingDescription {
        key: "patron_id_claim",
        label: "Patron ID claim",
        help_text: "Which ID token claim identifies the patron. Defaults to 'sub'.",
        required: false,
        options: &[],
    },
    SettingDescription {
        key: "patron_id_regular_expression",
        label: "Patron ID pattern",
        help_text: "Optional regular expression with a named group 'patron_id' to extract the patron identifier from the claim.",
        required: false,
        options: &[],
    },
];

pub const MARC_LIBRARY_SETTINGS: &[SettingDescription] = &[
    SettingDescription {
        key: "organization_code",
        label: "MARC organization code",
        help_text: "Written into the 003 field of every record exported for this library.",
        required: true,
        options: &[],
    },
    SettingDescription {
        key: "web_client_url",
        label: "Web client base URL",
        help_text: "Used to build the 856 acquisition link for this library's records.",
        required: true,
        options: &[],
    },
    SettingDescription {
        key: "include_summary",
        label: "Include summaries",
        help_text: "Whether to include the 520 summary field in exported records.",
        required: false,
        options: &["true", "false"],
    },
    SettingDescription {
        key: "include_genres",
        label: "Include genres",
        help_text: "Whether to include the 650 genre fields in exported records.",
        required: false,
        options: &["true", "false"],
    },
];
