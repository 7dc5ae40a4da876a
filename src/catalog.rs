use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::ResourceDescriptor;
use crate::error::SyncError;

pub trait CatalogClient {
    fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, SyncError>;
}

#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    result: Option<CatalogResult>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogResult {
    #[serde(default)]
    resources: Vec<ResourceDescriptor>,
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    api_url: String,
}

impl CatalogHttpClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .default_headers(default_headers()?)
            .timeout(timeout)
            .build()
            .map_err(|err| SyncError::CatalogUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }
}

impl CatalogClient for CatalogHttpClient {
    fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, SyncError> {
        tracing::info!(api_url = %self.api_url, "requesting catalog");
        let response = self
            .client
            .get(&self.api_url)
            .send()
            .map_err(|err| SyncError::CatalogUnavailable(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(SyncError::CatalogUnavailable(format!(
                "catalog returned status {status}"
            )));
        }
        let body = response
            .text()
            .map_err(|err| SyncError::CatalogUnavailable(err.to_string()))?;
        let resources = parse_catalog(&body)?;
        tracing::info!(count = resources.len(), "catalog listed");
        Ok(resources)
    }
}

/// Extracts `result.resources` from a CKAN `package_show` response body.
pub fn parse_catalog(body: &str) -> Result<Vec<ResourceDescriptor>, SyncError> {
    let envelope: CatalogEnvelope = serde_json::from_str(body)
        .map_err(|err| SyncError::CatalogUnavailable(format!("invalid catalog JSON: {err}")))?;
    if envelope.success == Some(false) {
        let detail = envelope
            .error
            .map(|value| value.to_string())
            .unwrap_or_else(|| "no error detail".to_string());
        return Err(SyncError::CatalogUnavailable(format!(
            "catalog reported failure: {detail}"
        )));
    }
    Ok(envelope.result.unwrap_or_default().resources)
}

pub(crate) fn default_headers() -> Result<HeaderMap, SyncError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("opendata-sync/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| SyncError::Filesystem(err.to_string()))?,
    );
    Ok(headers)
}
