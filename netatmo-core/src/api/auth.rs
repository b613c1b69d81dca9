use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    config::ApiConfig,
    credentials::{Credentials, ENV_REFRESH_TOKEN},
    error::ApiError,
    store::EnvFile,
};

use super::{AccessToken, send_json};

const TOKEN_ENDPOINT: &str = "token";
const AUTHORIZE_ENDPOINT: &str = "authorize";

pub const SCOPE: &str = "read_station";
pub const FIXED_STATE: &str = "state";

/// Source of the authorization code during first-time setup.
///
/// The terminal implementation opens a browser and blocks on a prompt; tests
/// hand back a canned code.
#[async_trait]
pub trait AuthCodeSource: Send + Sync {
    async fn authorization_code(&self, authorize_url: &Url) -> anyhow::Result<String>;
}

/// Value sent as the OAuth2 `state` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    /// The literal `"state"`. Offers no CSRF protection.
    #[default]
    Fixed,
    /// A fresh UUID per authorization attempt.
    Random,
}

impl AuthState {
    pub fn from_config(random: bool) -> Self {
        if random { AuthState::Random } else { AuthState::Fixed }
    }

    fn value(&self) -> String {
        match self {
            AuthState::Fixed => FIXED_STATE.to_string(),
            AuthState::Random => Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Runs the authorization-code and refresh-token exchanges.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    token_url: String,
    authorize_url: String,
    token_store: EnvFile,
    state: AuthState,
}

impl AuthClient {
    pub fn new(api: &ApiConfig, token_store: EnvFile) -> Self {
        Self::with_client(Client::new(), api, token_store)
    }

    pub fn with_client(http: Client, api: &ApiConfig, token_store: EnvFile) -> Self {
        Self {
            http,
            token_url: api.token_url.clone(),
            authorize_url: api.authorize_url.clone(),
            token_store,
            state: AuthState::default(),
        }
    }

    pub fn with_state(mut self, state: AuthState) -> Self {
        self.state = state;
        self
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// The rotated refresh token replaces the one in `credentials` and is
    /// written to the settings file before returning.
    pub async fn refresh_access_token(
        &self,
        credentials: &mut Credentials,
    ) -> Result<AccessToken, ApiError> {
        if !credentials.validate() {
            return Err(ApiError::InvalidCredentials);
        }

        let refresh_token = credentials.refresh_token.as_deref().unwrap_or_default();
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        let tokens: TokenResponse =
            send_json(TOKEN_ENDPOINT, self.http.post(&self.token_url).form(&params)).await?;

        let access_token = tokens
            .access_token
            .ok_or(ApiError::MissingField { endpoint: TOKEN_ENDPOINT, field: "access_token" })?;
        let new_refresh_token = tokens
            .refresh_token
            .ok_or(ApiError::MissingField { endpoint: TOKEN_ENDPOINT, field: "refresh_token" })?;

        self.store_refresh_token(credentials, new_refresh_token);
        info!("Access token refreshed");

        Ok(AccessToken::new(access_token))
    }

    /// Authorization URL the operator has to visit.
    pub fn authorize_url(&self, credentials: &Credentials) -> Result<Url, ApiError> {
        let state = self.state.value();
        Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", credentials.client_id.as_str()),
                ("redirect_uri", credentials.redirect_uri.as_str()),
                ("scope", SCOPE),
                ("state", state.as_str()),
                ("response_type", "code"),
            ],
        )
        .map_err(|source| ApiError::InvalidUrl {
            endpoint: AUTHORIZE_ENDPOINT,
            url: self.authorize_url.clone(),
            source,
        })
    }

    /// First-run flow: obtain a refresh token through the operator.
    ///
    /// Credentials are left untouched on any failure.
    pub async fn setup_initial_auth(
        &self,
        credentials: &mut Credentials,
        codes: &dyn AuthCodeSource,
    ) -> Result<(), ApiError> {
        if !credentials.validate() {
            return Err(ApiError::InvalidCredentials);
        }

        let url = self.authorize_url(credentials)?;
        let code = codes.authorization_code(&url).await.map_err(ApiError::Prompt)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(ApiError::Prompt(anyhow::anyhow!("no authorization code entered")));
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", credentials.redirect_uri.as_str()),
        ];

        let tokens: TokenResponse =
            send_json(TOKEN_ENDPOINT, self.http.post(&self.token_url).form(&params)).await?;

        let refresh_token = tokens
            .refresh_token
            .ok_or(ApiError::MissingField { endpoint: TOKEN_ENDPOINT, field: "refresh_token" })?;

        self.store_refresh_token(credentials, refresh_token);
        info!(
            path = %self.token_store.path().display(),
            "Obtained refresh token and updated settings file"
        );

        Ok(())
    }

    fn store_refresh_token(&self, credentials: &mut Credentials, token: String) {
        if let Err(err) = self.token_store.upsert(ENV_REFRESH_TOKEN, &token) {
            warn!(error = %format!("{err:#}"), "Refresh token kept in memory only");
        }
        credentials.refresh_token = Some(token);
    }
}
