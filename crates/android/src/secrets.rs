//! Secrets service client
//!
//! Fetches deploy credentials from a secrets endpoint that answers
//! `GET <base>/<name>` with `{"secret": {"content": "..."}}`.

use andromach_core::config::DocsConfig;
use andromach_core::error::{Error, ErrorCode, Result, ResultExt};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;

/// Source of named secrets
pub trait SecretStore {
    /// Return the `content` of the named secret
    fn get_secret(&self, name: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    secret: SecretBody,
}

#[derive(Debug, Deserialize)]
struct SecretBody {
    content: String,
}

/// Extract `secret.content` from a response body
pub fn parse_secret(body: &str) -> Result<String> {
    let parsed: SecretResponse = serde_json::from_str(body).map_err(|e| {
        Error::from(e).with_suggestion("Expected {\"secret\": {\"content\": \"...\"}}")
    })?;
    Ok(parsed.secret.content)
}

/// [`SecretStore`] backed by the HTTP secrets service
#[derive(Debug, Clone)]
pub struct HttpSecretStore {
    inner: Client,
    base_url: String,
}

impl HttpSecretStore {
    /// Client for the secrets service at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("andromach/0.1"));
        let inner = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            inner,
            base_url: base_url.into(),
        })
    }

    /// Client described by the `[docs]` section
    pub fn from_config(config: &DocsConfig) -> Result<Self> {
        Self::new(
            config.secrets_url.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    /// URL of the named secret
    pub fn secret_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }
}

impl SecretStore for HttpSecretStore {
    fn get_secret(&self, name: &str) -> Result<String> {
        let url = self.secret_url(name);
        tracing::debug!(%url, "fetching secret");
        let response = self.inner.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::new(
                ErrorCode::HttpStatus,
                format!("Secrets service returned {status} for {name}"),
            ));
        }
        let body = response.text()?;
        parse_secret(&body).context(format!("Reading secret {name}"))
    }
}
