use anyhow::{Context, Result};
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Rate-limited JSON client for the OpenAI REST API.
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: Client,
    base_url: String,
    api_key: SecretString,
    rate_limiter: Arc<RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>>,
}

impl OpenAiClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        requests_per_second: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Reads the API key from `OPENAI_API_KEY`.
    ///
    /// # Errors
    /// Returns an error if the variable is unset or the client cannot be built.
    pub fn from_env(
        base_url: impl Into<String>,
        requests_per_second: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let key = std::env::var(API_KEY_ENV)
            .with_context(|| format!("Missing {API_KEY_ENV} env var"))?;
        Self::new(base_url, SecretString::from(key), requests_per_second, timeout)
    }

    /// # Errors
    /// Returns an error on transport failure, a non-success status or invalid JSON.
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.rate_limiter.until_ready().await;
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {endpoint} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("POST {endpoint} returned {status}: {detail}");
        }
        response.json().await.context("Invalid JSON response")
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
