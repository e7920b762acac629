use reqwest::{Client, Response};

use crate::error::{ClipsageError, Result};

pub const API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Configuration from the process environment. A missing key is only
    /// reported once a remote call is attempted.
    pub fn from_env() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: std::env::var(API_KEY_ENV_VAR)
                .ok()
                .filter(|key| !key.trim().is_empty()),
        }
    }
}

/// Shared HTTP client for the Gemini REST API (files and models).
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_http(Client::new(), config)
    }

    pub fn with_http(http: Client, config: ProviderConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The API key, or the deferred configuration failure.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ClipsageError::MissingApiKey {
                env_var: API_KEY_ENV_VAR.to_string(),
            })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Turn a non-2xx response into `RemoteStatus`, keeping the body for the user.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(ClipsageError::RemoteStatus {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> GeminiClient {
        GeminiClient::new(ProviderConfig {
            base_url: "https://example.test/".to_string(),
            api_key: api_key.map(str::to_string),
        })
    }

    #[test]
    fn missing_key_fails_on_use() {
        let gemini = client(None);
        assert!(!gemini.has_api_key());
        assert!(matches!(
            gemini.api_key(),
            Err(ClipsageError::MissingApiKey { ref env_var }) if env_var == API_KEY_ENV_VAR
        ));
    }

    #[test]
    fn joins_paths_without_double_slashes() {
        let gemini = client(Some("k"));
        assert_eq!(gemini.api_key().unwrap(), "k");
        assert_eq!(gemini.url("/v1beta/files/x"), "https://example.test/v1beta/files/x");
        assert_eq!(
            gemini.url("upload/v1beta/files"),
            "https://example.test/upload/v1beta/files"
        );
    }
}
