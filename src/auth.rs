//! Authentication schemes of the vendor APIs.
//!
//! - The central platform takes a static key in the [`API_KEY_HEADER`] header.
//! - Polaris exchanges an access token or an email/password pair for a JWT
//!   ([`PolarisAuth`]).
//! - Black Duck exchanges an API token for a bearer token.
//!
//! Secrets are never logged in full; use [`redact_token`].

/// Header carrying the central platform API key
pub const API_KEY_HEADER: &str = "API-Key";

/// Credentials accepted by the Polaris authenticate endpoint
#[derive(Clone, PartialEq, Eq)]
pub enum PolarisAuth {
    /// Long-lived access token
    AccessToken(String),
    /// Interactive account login
    Login { email: String, password: String },
}

impl PolarisAuth {
    /// Picks the access token when present, else the email/password pair.
    pub fn from_parts(
        token: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Option<Self> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            return Some(Self::AccessToken(token.to_string()));
        }
        match (email, password) {
            (Some(email), Some(password)) if !email.is_empty() => Some(Self::Login {
                email: email.to_string(),
                password: password.to_string(),
            }),
            _ => None,
        }
    }

    /// Form fields for `POST /api/auth/v1/authenticate`
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::AccessToken(token) => vec![("accesstoken", token.as_str())],
            Self::Login { email, password } => {
                vec![("email", email.as_str()), ("password", password.as_str())]
            }
        }
    }
}

impl std::fmt::Debug for PolarisAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessToken(token) => f
                .debug_tuple("AccessToken")
                .field(&redact_token(token))
                .finish(),
            Self::Login { email, .. } => f
                .debug_struct("Login")
                .field("email", email)
                .field("password", &"****")
                .finish(),
        }
    }
}

/// Redact a token for safe logging.
///
/// Shows only the first few characters to help identify which token is in use
/// without exposing the full secret.
pub fn redact_token(token: &str) -> String {
    match token.char_indices().nth(4) {
        Some((end, _)) => format!("{}...", &token[..end]),
        None => "****".to_string(),
    }
}
