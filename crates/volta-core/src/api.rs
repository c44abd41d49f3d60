use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::ClientConfig;
use crate::meter::MeterStatus;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {got} meter statuses for {want} requested ids")]
    MeterCountMismatch { want: usize, got: usize },
    #[error("station load interrupted: {0}")]
    Join(String),
}

/// Seam over the remote JSON service so orchestration can run against a
/// scripted fake in tests.
#[async_trait]
pub trait VoltaApi: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Catalog, ApiError>;
    async fn fetch_meters(&self, meter_ids: &[String]) -> Result<Vec<MeterStatus>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpVoltaApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpVoltaApi {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ApiError> {
        let base_url: String = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.request_timeout)
    }
}

#[async_trait]
impl VoltaApi for HttpVoltaApi {
    async fn fetch_catalog(&self) -> Result<Catalog, ApiError> {
        let url = format!("{}/sites", self.base_url);
        debug!(%url, "fetching site catalog");
        let catalog = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(catalog)
    }

    async fn fetch_meters(&self, meter_ids: &[String]) -> Result<Vec<MeterStatus>, ApiError> {
        let url = format!("{}/meters/{}", self.base_url, meter_ids.join(","));
        debug!(%url, "fetching meter statuses");
        let meters: Vec<MeterStatus> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if meters.len() != meter_ids.len() {
            return Err(ApiError::MeterCountMismatch {
                want: meter_ids.len(),
                got: meters.len(),
            });
        }
        Ok(meters)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::HttpVoltaApi;

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let api = HttpVoltaApi::new("http://localhost:8080/", Duration::from_secs(1))
            .expect("client");
        assert_eq!(api.base_url, "http://localhost:8080");
    }
}
