//! `DataSource` backed by a weather forecast API.
//!
//! `fetch(location)` requests the hourly forecast for `location` and returns
//! the first hourly entry, i.e. current conditions, as raw JSON.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use permits_contracts::error::{PermitError, PermitResult};
use permits_core::traits::DataSource;

use crate::retry::{with_retry, CallError, RetryConfig};

pub const DEFAULT_API_BASE: &str = "https://api.tomorrow.io/v4";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct WeatherDataSource {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for WeatherDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherDataSource")
            .field("api_base", &self.api_base)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl WeatherDataSource {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> PermitResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PermitError::ConfigError {
                reason: "weather API key is not set".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PermitError::ConfigError {
                reason: format!("failed to build weather HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key,
            api_base: api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            retry,
        })
    }

    async fn forecast_once(&self, location: &str) -> Result<serde_json::Value, CallError> {
        let response = self
            .client
            .get(format!("{}/weather/forecast", self.api_base))
            .query(&[("location", location), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(CallError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::from_status(status, body));
        }

        response
            .json()
            .await
            .map_err(|e| CallError::Permanent(format!("invalid forecast payload: {e}")))
    }
}

#[async_trait]
impl DataSource for WeatherDataSource {
    async fn fetch(&self, location: &str) -> PermitResult<serde_json::Value> {
        let forecast = with_retry("weather-forecast", &self.retry, || self.forecast_once(location))
            .await
            .map_err(|e| PermitError::evaluation(format!("weather lookup failed: {}", e.into_message())))?;

        let current = forecast
            .pointer("/timelines/hourly/0")
            .cloned()
            .ok_or_else(|| PermitError::evaluation(format!("forecast for '{location}' has no hourly entries")))?;

        debug!(%location, "fetched current weather");
        Ok(current)
    }
}
