use std::io;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use crate::config::{CompletionRequest, RunConfig};

pub type ChunkStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Opens one streaming completion request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(
        &self,
        request_id: usize,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, TransportError>;
}

/// Builds the transport, and with it the connection pool, for one batch.
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    fn connect(&self, config: &RunConfig) -> Result<Self::Transport>;
}

pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(config: &RunConfig) -> Result<Self> {
        let mut builder = Client::builder().pool_max_idle_per_host(config.concurrency);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .context("failed to construct HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        _request_id: usize,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::Status(status));
        }

        Ok(response.bytes_stream().map_err(TransportError::from).boxed())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    type Transport = HttpTransport;

    fn connect(&self, config: &RunConfig) -> Result<HttpTransport> {
        HttpTransport::new(config)
    }
}
