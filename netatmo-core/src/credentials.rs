use std::fmt;

pub const ENV_CLIENT_ID: &str = "NETATMO_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "NETATMO_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "NETATMO_REFRESH_TOKEN";
pub const ENV_REDIRECT_URI: &str = "NETATMO_REDIRECT_URI";

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// OAuth2 application credentials plus the current refresh token.
#[derive(Clone, Default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    /// Replaced on every token exchange.
    pub refresh_token: Option<String>,
    pub redirect_uri: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Build credentials from an arbitrary key lookup (environment, map, ...).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            client_id: non_empty(ENV_CLIENT_ID).unwrap_or_default(),
            client_secret: non_empty(ENV_CLIENT_SECRET).unwrap_or_default(),
            refresh_token: non_empty(ENV_REFRESH_TOKEN),
            redirect_uri: non_empty(ENV_REDIRECT_URI)
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        }
    }

    /// True when both client id and secret are present.
    pub fn validate(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}
