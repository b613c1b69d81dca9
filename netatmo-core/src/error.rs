//! Errors raised while talking to the Netatmo API.

use reqwest::StatusCode;

/// Failure of a credential check or a single remote call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing client_id or client_secret")]
    InvalidCredentials,

    #[error("Invalid {endpoint} url `{url}`: {source}")]
    InvalidUrl {
        endpoint: &'static str,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to parse {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{endpoint} response is missing `{field}`")]
    MissingField {
        endpoint: &'static str,
        field: &'static str,
    },

    #[error("Could not obtain an authorization code: {0:#}")]
    Prompt(anyhow::Error),
}

impl ApiError {
    /// True when the remote side answered with 401/403.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}
