use std::time::Duration;

use tracker_core::StatusUpdate;
use url::Url;

use crate::{FailureKind, FetchError, StatusResponse};

/// Where the job service lives and how patiently to talk to it.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    /// Path template; `{id}` is replaced by the job id.
    pub status_path: String,
    pub events_path: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            status_path: "/jobs/{id}".to_string(),
            events_path: "/jobs/{id}/events".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl FetchSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn status_url(&self, job_id: &str) -> Result<Url, FetchError> {
        self.job_url(&self.status_path, job_id)
    }

    pub fn events_url(&self, job_id: &str) -> Result<Url, FetchError> {
        self.job_url(&self.events_path, job_id)
    }

    fn job_url(&self, template: &str, job_id: &str) -> Result<Url, FetchError> {
        let base = Url::parse(&self.base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let encoded: String = url::form_urlencoded::byte_serialize(job_id.as_bytes()).collect();
        let path = template.replace("{id}", &encoded);
        base.join(&path)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
    }
}

/// Pulls the current status of one job.
#[async_trait::async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusUpdate, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestStatusFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestStatusFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }
}

#[async_trait::async_trait]
impl StatusFetcher for ReqwestStatusFetcher {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusUpdate, FetchError> {
        let url = self.settings.status_url(job_id)?;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let parsed: StatusResponse = serde_json::from_slice(&body)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        Ok(parsed.into())
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
