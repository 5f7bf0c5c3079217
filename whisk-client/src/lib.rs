//! Whisk HTTP Client
//!
//! A thin, type-safe wrapper over the serverless platform's REST API.
//!
//! Every call is a single request/response authenticated with HTTP basic auth
//! against a fixed base URL. The client never retries: retry policy belongs to
//! the caller, which is why status codes are preserved in [`ClientError`].
//!
//! # Example
//!
//! ```no_run
//! use whisk_client::{ActionClient, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ActionClient::new(
//!         "http://localhost:3233/api/v1/namespaces",
//!         Credentials::new("user", "secret"),
//!     );
//!
//!     let detail = client.get_action_detail("nuvolaris", "train").await?;
//!     println!("stored fingerprint: {:?}", detail.stored_fingerprint());
//!     Ok(())
//! }
//! ```

mod actions;
mod activations;
pub mod api;
pub mod error;

// Re-export commonly used types
pub use api::ActionApi;
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt;

/// Basic-auth credentials for the platform API
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP client for the platform's action and activation endpoints
///
/// Endpoints:
/// - `PUT  {base}/{namespace}/actions/{name}?overwrite=true`: deploy
/// - `POST {base}/{namespace}/actions/{name}`: non-blocking trigger
/// - `GET  {base}/{namespace}/actions/{name}`: action detail
/// - `GET  {base}/{namespace}/activations/{id}`: activation detail
#[derive(Debug, Clone)]
pub struct ActionClient {
    /// Base URL including the namespaces prefix (e.g., "http://localhost:3233/api/v1/namespaces")
    base_url: String,
    credentials: Credentials,
    client: Client,
}

impl ActionClient {
    /// Create a new action client
    ///
    /// # Example
    /// ```
    /// use whisk_client::{ActionClient, Credentials};
    ///
    /// let client = ActionClient::new(
    ///     "http://localhost:3233/api/v1/namespaces/",
    ///     Credentials::new("user", "secret"),
    /// );
    /// assert_eq!(client.base_url(), "http://localhost:3233/api/v1/namespaces");
    /// ```
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self::with_client(base_url, credentials, Client::new())
    }

    /// Create a new action client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        credentials: Credentials,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        }
    }

    /// Get the base URL of the platform API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn action_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}/actions/{}", self.base_url, namespace, name)
    }

    pub(crate) fn activation_url(&self, namespace: &str, activation_id: &str) -> String {
        format!("{}/{}/activations/{}", self.base_url, namespace, activation_id)
    }

    /// Attach basic auth to a request
    pub(crate) fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let text = self.handle_text_response(response).await?;

        serde_json::from_str(&text)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response and return the raw body
    ///
    /// Non-success statuses become [`ClientError::ApiError`] carrying the status code.
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response.text().await?)
    }
}
