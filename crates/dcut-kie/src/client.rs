//! KIE HTTP client.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{KieError, KieResult};
use crate::types::{
    ExtendVideoParams, GenerateResponse, GenerateVideoParams, Hd1080pResponse, RecordInfoResponse,
};

/// Configuration for the KIE client.
#[derive(Debug, Clone)]
pub struct KieConfig {
    /// Base URL of the KIE API
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
}

impl KieConfig {
    /// Create config from environment variables.
    pub fn from_env() -> KieResult<Self> {
        let api_key = std::env::var("KIE_API_KEY").map_err(|_| KieError::MissingApiKey)?;
        Ok(Self {
            base_url: std::env::var("KIE_API_BASE")
                .unwrap_or_else(|_| "https://api.kie.ai".to_string()),
            api_key,
            timeout: Duration::from_secs(
                std::env::var("KIE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        })
    }
}

/// Client for the KIE Veo API.
///
/// No internal retries: submit/extend failures surface to the caller, and
/// status-query failures are transient by contract (poll again later).
#[derive(Clone)]
pub struct KieClient {
    http: Client,
    config: KieConfig,
}

impl KieClient {
    /// Create a new KIE client.
    pub fn new(config: KieConfig) -> KieResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(KieError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> KieResult<Self> {
        Self::new(KieConfig::from_env()?)
    }

    /// Submit a generation job. Returns the provider envelope; callers
    /// check `task_id()` for acceptance.
    pub async fn generate(&self, params: &GenerateVideoParams) -> KieResult<GenerateResponse> {
        let url = format!("{}/api/v1/veo/generate", self.config.base_url);
        debug!("KIE generate: model={:?}", params.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(params)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Query task status.
    pub async fn record_info(&self, task_id: &str) -> KieResult<RecordInfoResponse> {
        let url = format!("{}/api/v1/veo/record-info", self.config.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(&[("taskId", task_id)])
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch the 1080p upgrade URL for a finished task, when available.
    ///
    /// Returns `None` when the provider has no upgraded rendition; HTTP
    /// failures still surface so the caller can decide to swallow them.
    pub async fn get_1080p(&self, task_id: &str, index: Option<u32>) -> KieResult<Option<String>> {
        let url = format!("{}/api/v1/veo/get-1080p-video", self.config.base_url);

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(&[("taskId", task_id)]);
        if let Some(index) = index {
            request = request.query(&[("index", index.to_string())]);
        }

        let response = Self::check_status(request.send().await?).await?;
        let parsed: Hd1080pResponse = response.json().await?;

        if parsed.code != 200 {
            warn!("KIE get-1080p envelope code {}: {}", parsed.code, parsed.msg);
            return Ok(None);
        }
        Ok(parsed
            .data
            .and_then(|d| d.result_url)
            .filter(|u| !u.is_empty()))
    }

    /// Submit a continuation job chained to a prior task.
    pub async fn extend(&self, params: &ExtendVideoParams) -> KieResult<GenerateResponse> {
        let url = format!("{}/api/v1/veo/extend", self.config.base_url);
        debug!("KIE extend: task_id={}", params.task_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(params)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn check_status(response: reqwest::Response) -> KieResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        warn!("KIE non-OK response: status={} body={}", status, body);
        Err(KieError::Http { status, body })
    }
}
