//! HTTP client utilities and the reqwest-backed [`ChunkSource`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::collections::HashMap;
use tracing::debug;

use crate::client::{ChunkSource, ClientError};
use crate::options::{HttpTransport, TransportOptions};

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(
    transport_options: &TransportOptions<HttpTransport>,
) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.provider.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::Config(format!("invalid proxy {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// A [`ChunkSource`] reading the body of a `reqwest::Response`.
///
/// Releasing drops the body stream, which closes the connection if the
/// server has not finished sending.
pub struct ReqwestSource {
    content_type: Option<String>,
    body: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
}

impl ReqwestSource {
    pub fn new(response: reqwest::Response) -> Self {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // These statuses never carry a body to stream.
        let body = match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED => None,
            _ => Some(response.bytes_stream().boxed()),
        };

        Self { content_type, body }
    }
}

impl std::fmt::Debug for ReqwestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestSource")
            .field("content_type", &self.content_type)
            .field("readable", &self.body.is_some())
            .finish()
    }
}

#[async_trait]
impl ChunkSource for ReqwestSource {
    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn is_readable(&self) -> bool {
        self.body.is_some()
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ClientError> {
        let Some(body) = self.body.as_mut() else {
            return Err(ClientError::StreamUnavailable("response body already released".to_string()));
        };

        match body.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(ClientError::from(e)),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        if self.body.take().is_some() {
            debug!("response body released");
        }
    }
}
