//! Pairing service collaborator.
//!
//! Three endpoints relative to the server URL:
//!
//! | Method | Path                | Request               | Response        |
//! |--------|---------------------|-----------------------|-----------------|
//! | GET    | `/code/get`         |                       | `{code, hash}`  |
//! | POST   | `/code/validate`    | `{code}`              | `{code, hash}`  |
//! | POST   | `/pairing/validate` | `{code, hash, device}`| `{isValid}`     |

use async_trait::async_trait;

use super::{Pairing, PairingError};

/// A code/hash pair issued by the pairing service.
///
/// Either field may be empty when the service reports no match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodeResponse {
    /// Short code.
    pub code: String,
    /// Pair token.
    pub hash: String,
}

impl CodeResponse {
    /// Whether both fields are present.
    pub fn is_complete(&self) -> bool {
        !self.code.is_empty() && !self.hash.is_empty()
    }

    #[cfg(feature = "http")]
    fn from_json(value: &serde_json::Value) -> Self {
        fn field(value: &serde_json::Value, name: &str) -> String {
            match value.get(name) {
                Some(serde_json::Value::String(text)) => text.clone(),
                Some(serde_json::Value::Number(number)) => number.to_string(),
                _ => String::new(),
            }
        }

        Self {
            code: field(value, "code"),
            hash: field(value, "hash"),
        }
    }
}

/// Remote pairing service.
///
/// Errors are [`PairingError::RequestFailed`] for anything that prevented an
/// answer (network, HTTP status, unparseable body).
#[async_trait]
pub trait PairingService: Send + Sync {
    /// Issue a new code/hash pair.
    async fn request_code(&self) -> Result<CodeResponse, PairingError>;

    /// Look up the hash for a short code.
    async fn validate_code(&self, code: &str) -> Result<CodeResponse, PairingError>;

    /// Ask whether a stored pairing is still valid.
    async fn validate_pairing(&self, pairing: &Pairing) -> Result<bool, PairingError>;
}

#[cfg(feature = "http")]
pub use http::HttpPairingService;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use tracing::debug;

    use super::{CodeResponse, PairingService};
    use crate::core::constants::{CODE_GET_PATH, CODE_VALIDATE_PATH, PAIRING_VALIDATE_PATH};
    use crate::pairing::{Pairing, PairingError};

    /// Request timeout for pairing calls.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    #[derive(Debug, Deserialize)]
    struct ValidationResponse {
        #[serde(rename = "isValid", default)]
        is_valid: bool,
    }

    fn request_failed(e: reqwest::Error) -> PairingError {
        PairingError::RequestFailed(e.to_string())
    }

    /// [`PairingService`] over HTTP.
    #[derive(Debug, Clone)]
    pub struct HttpPairingService {
        client: reqwest::Client,
        server_url: String,
    }

    impl HttpPairingService {
        /// Create a service for `server_url` with a default client.
        pub fn new(server_url: impl Into<String>) -> Result<Self, PairingError> {
            let client = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(request_failed)?;
            Ok(Self::with_client(client, server_url))
        }

        /// Create a service using an existing client.
        pub fn with_client(client: reqwest::Client, server_url: impl Into<String>) -> Self {
            let server_url = server_url.into().trim_end_matches('/').to_string();
            Self { client, server_url }
        }

        /// Base URL without a trailing slash.
        pub fn server_url(&self) -> &str {
            &self.server_url
        }

        fn url(&self, path: &str) -> String {
            format!("{}{}", self.server_url, path)
        }
    }

    #[async_trait]
    impl PairingService for HttpPairingService {
        async fn request_code(&self) -> Result<CodeResponse, PairingError> {
            let url = self.url(CODE_GET_PATH);
            debug!(%url, "requesting pairing code");
            let body: serde_json::Value = self
                .client
                .get(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(request_failed)?
                .json()
                .await
                .map_err(request_failed)?;
            Ok(CodeResponse::from_json(&body))
        }

        async fn validate_code(&self, code: &str) -> Result<CodeResponse, PairingError> {
            let url = self.url(CODE_VALIDATE_PATH);
            debug!(%url, "resolving pairing code");
            let body: serde_json::Value = self
                .client
                .post(&url)
                .json(&json!({ "code": code }))
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(request_failed)?
                .json()
                .await
                .map_err(request_failed)?;
            Ok(CodeResponse::from_json(&body))
        }

        async fn validate_pairing(&self, pairing: &Pairing) -> Result<bool, PairingError> {
            let url = self.url(PAIRING_VALIDATE_PATH);
            debug!(%url, "validating stored pairing");
            let body: ValidationResponse = self
                .client
                .post(&url)
                .json(pairing)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(request_failed)?
                .json()
                .await
                .map_err(request_failed)?;
            Ok(body.is_valid)
        }
    }

}
