//! Clients for the Netatmo OAuth2 and weather-station endpoints.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::fmt;

use crate::error::ApiError;

pub mod auth;
pub mod station;

pub use auth::{AuthClient, AuthCodeSource, AuthState};
pub use station::{StationClient, StationData, parse_weather_readings, parse_weather_readings_at};

/// Short-lived bearer token for one batch of API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Send `request` once and decode a successful JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    endpoint: &'static str,
    request: RequestBuilder,
) -> Result<T, ApiError> {
    let res = request
        .send()
        .await
        .map_err(|source| ApiError::Transport { endpoint, source })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|source| ApiError::Transport { endpoint, source })?;

    if !status.is_success() {
        return Err(ApiError::Status { endpoint, status, body: truncate_body(&body) });
    }

    serde_json::from_str(&body).map_err(|source| ApiError::Decode { endpoint, source })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_bodies_are_truncated_on_char_boundaries() {
        let body = "é".repeat(300);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("abc123");
        assert_eq!(format!("{token:?}"), "AccessToken(<redacted>)");
        assert_eq!(token.secret(), "abc123");
    }
}
