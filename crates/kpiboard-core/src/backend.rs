//! Backend port for KPI records
//!
//! The REST backend owns persistence. This module defines the contract the
//! dashboard and the submission gate depend on, plus a reqwest adapter.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::{KpiConfig, KpiRecord, TrackedMetricSet};

/// Default backend base URL (local dev server)
pub const DEFAULT_API_URL: &str = "http://localhost:8001/api";

/// Read/write access to a seller's KPI records
#[async_trait]
pub trait KpiBackend: Send + Sync {
    /// Records for the last `days` days, newest first
    async fn fetch_records(&self, seller: &str, days: u32) -> Result<Vec<KpiRecord>, CoreError>;

    /// Upsert one record (seller + date is the key); returns the stored record
    async fn save_record(&self, seller: &str, record: &KpiRecord) -> Result<KpiRecord, CoreError>;

    /// Metrics the seller's shop tracks
    async fn fetch_tracked_metrics(&self, seller: &str) -> Result<TrackedMetricSet, CoreError>;
}

/// Configuration for the HTTP backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL without trailing slash
    pub base_url: String,

    /// Bearer token
    pub token: Option<String>,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(15),
        }
    }
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn kpi_url(&self, seller: &str) -> String {
        format!("{}/sellers/{}/kpi", self.base_url, seller)
    }

    fn config_url(&self, seller: &str) -> String {
        format!("{}/sellers/{}/kpi-config", self.base_url, seller)
    }
}

/// Error body shape returned by the backend
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Extract the backend's error detail, falling back to the raw body
fn error_detail(body: &str, status: u16) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => body.trim().to_string(),
    }
}

/// reqwest-backed implementation of [`KpiBackend`]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CoreError::Transport {
                message: format!("Failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode a JSON body, mapping non-2xx to `Backend`
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body, status.as_u16());
            tracing::warn!(status = status.as_u16(), %detail, "Backend request failed");
            return Err(CoreError::Backend {
                status: Some(status.as_u16()),
                detail,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl KpiBackend for HttpBackend {
    async fn fetch_records(&self, seller: &str, days: u32) -> Result<Vec<KpiRecord>, CoreError> {
        tracing::info!(seller, days, "Fetching KPI records");
        let request = self
            .client
            .get(self.config.kpi_url(seller))
            .query(&[("days", days)]);
        self.send_json(request).await
    }

    async fn save_record(&self, seller: &str, record: &KpiRecord) -> Result<KpiRecord, CoreError> {
        tracing::info!(seller, date = %record.date, "Saving KPI record");
        let request = self.client.post(self.config.kpi_url(seller)).json(record);
        self.send_json(request).await
    }

    async fn fetch_tracked_metrics(&self, seller: &str) -> Result<TrackedMetricSet, CoreError> {
        let request = self.client.get(self.config.config_url(seller));
        let config: KpiConfig = self.send_json(request).await?;
        Ok(config.into())
    }
}
