use super::error::{map_transport_error, StreamError};
use crate::config::Config;
use crate::logging::{debug_payload_enabled, emit_debug_payload};
use crate::state::report::DetailSource;
use crate::types::WorkflowRequest;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Url;
use serde::Deserialize;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Opens the chunked response body for one workflow request.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, request: &WorkflowRequest) -> Result<ByteStream, StreamError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        Url::parse(&config.base_url)
            .with_context(|| format!("invalid backend base URL '{}'", config.base_url))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn request_url(&self, request: &WorkflowRequest) -> String {
        format!("{}/{}", self.base_url, request.workflow().endpoint_path())
    }

    fn detail_url(&self, filename: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("base URL '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(["knowledge", "content", filename]);
        Ok(url)
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn open(&self, request: &WorkflowRequest) -> Result<ByteStream, StreamError> {
        let request_url = self.request_url(request);
        if debug_payload_enabled() {
            emit_debug_payload(&request_url, request.body());
        }
        tracing::debug!(workflow = request.workflow().name(), url = %request_url, "opening stream");

        let response = self
            .http
            .post(&request_url)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .json(request.body())
            .send()
            .await
            .map_err(|error| map_transport_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_transport_error(error, &request_url))?;

        let stream = response
            .bytes_stream()
            .map(move |item| item.map_err(|error| map_transport_error(error, &request_url)));
        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl DetailSource for HttpTransport {
    async fn fetch_detail(&self, filename: &str) -> Result<String> {
        let url = self.detail_url(filename)?;
        let url_text = url.to_string();
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| map_transport_error(error, &url_text))?
            .error_for_status()
            .map_err(|error| map_transport_error(error, &url_text))?;

        let detail: DetailResponse = response
            .json()
            .await
            .with_context(|| format!("invalid detail response from '{url_text}'"))?;

        if detail.status != "success" {
            bail!(
                "no content for '{filename}': {}",
                detail.content.unwrap_or_else(|| detail.status.clone())
            );
        }
        Ok(detail.content.unwrap_or_default())
    }
}
