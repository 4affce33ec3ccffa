//! Raw HTTP request and response types, and the transport that carries them.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use futures::TryStreamExt;
use static_assertions::assert_impl_all;

use crate::context::Context;
use crate::error::RequestError;

/// The raw body of a server response, delivered chunk by chunk as the
/// transport receives them.
pub type BodyStream = BoxStream<'static, Result<Bytes, RequestError>>;

assert_impl_all!(HttpRequest: Send);
/// The serialized form of one attempt, on its way to the transport.
#[derive(Debug)]
#[non_exhaustive]
pub struct HttpRequest {
    pub http_request: http::Request<Bytes>,
    pub context: Context,
}

impl HttpRequest {
    pub fn new(http_request: http::Request<Bytes>, context: Context) -> Self {
        HttpRequest {
            http_request,
            context,
        }
    }
}

assert_impl_all!(HttpResponse: Send);
/// Status and headers of a server response, with the body still streaming.
#[non_exhaustive]
pub struct HttpResponse {
    pub http_response: http::Response<BodyStream>,
    pub context: Context,
}

impl HttpResponse {
    pub fn new(http_response: http::Response<BodyStream>, context: Context) -> Self {
        HttpResponse {
            http_response,
            context,
        }
    }

    /// Run `f` over the body stream, keeping status, headers and context.
    pub fn map<F>(self, f: F) -> HttpResponse
    where
        F: FnOnce(BodyStream) -> BodyStream,
    {
        HttpResponse {
            http_response: self.http_response.map(f),
            context: self.context,
        }
    }
}

/// The component that physically performs an HTTP exchange.
///
/// Implementations resolve once status and headers are available; the body
/// keeps streaming through the returned response.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn fetch_chunks(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<BodyStream>, RequestError>;
}

/// The default [`Transport`], backed by a shared [`reqwest::Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        ReqwestTransport {
            client: reqwest::Client::builder()
                .tcp_keepalive(Some(Duration::from_secs(5)))
                .build()
                .expect("failed to build the default HTTP client"),
        }
    }

    /// Use an already configured client, e.g. one with proxy or TLS settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        ReqwestTransport::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch_chunks(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<BodyStream>, RequestError> {
        let (parts, body) = request.into_parts();
        tracing::debug!(uri = %parts.uri, method = %parts.method, "sending request");
        let mut response = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(|err| RequestError::Transport {
                status: None,
                reason: err.to_string(),
            })?;

        let status = response.status();
        let version = response.version();
        let headers = std::mem::take(response.headers_mut());
        let body: BodyStream = response
            .bytes_stream()
            .map_err(move |err| RequestError::Transport {
                status: Some(status.as_u16()),
                reason: err.to_string(),
            })
            .boxed();

        let mut http_response = http::Response::builder()
            .status(status)
            .version(version)
            .body(body)
            .map_err(|err| RequestError::Transport {
                status: Some(status.as_u16()),
                reason: err.to_string(),
            })?;
        *http_response.headers_mut() = headers;
        Ok(http_response)
    }
}
