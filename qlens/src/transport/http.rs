//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::{http_error, FetchRequest, HttpTransport, Method};
use crate::cancel::{run_cancellable, CancellationToken};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::telemetry;

/// Dashboards-style backends reject state-changing calls without it
const XSRF_HEADER: &str = "osd-xsrf";

/// Sends requests to the backend over HTTP
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(XSRF_HEADER, HeaderValue::from_static("true"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: FetchRequest) -> Result<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        telemetry::record_backend_fetch(&request.path, status.as_str());

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!(path = %request.path, status = status.as_u16(), "Backend returned error");
            return Err(http_error(status.as_u16(), &text));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, request: FetchRequest, cancel: &CancellationToken) -> Result<Value> {
        tracing::debug!(path = %request.path, "Backend fetch");
        run_cancellable(cancel, self.send(request)).await
    }
}
