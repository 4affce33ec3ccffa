//! The network leg of an attempt: request serialization, the HTTP-level
//! chain, and response parsing.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use bytes::BytesMut;
use futures::stream;
use futures::StreamExt;
use futures::TryStreamExt;
use http::header::ACCEPT;
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use http::Method;

use crate::error::RequestError;
use crate::graphql;
use crate::http::BodyStream;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::http::Transport;
use crate::interceptor::ChainResult;
use crate::interceptor::HttpChain;
use crate::interceptor::HttpInterceptor;
use crate::interceptor::HttpTerminal;
use crate::request::Request;
use crate::response::Response;
use crate::response::ResponseStream;
use crate::response::Source;

static APPLICATION_JSON_HEADER_VALUE: HeaderValue = HeaderValue::from_static("application/json");
static ACCEPT_GRAPHQL_HEADER_VALUE: HeaderValue =
    HeaderValue::from_static("application/graphql-response+json, application/json");

/// Decodes one raw HTTP exchange into the attempt's stream of GraphQL
/// responses.
///
/// The default is [`JsonResponseParser`]. Installing another implementation
/// is how multipart protocols (`@defer`, subscriptions over chunked
/// responses) plug in: a parser may yield any number of responses, in
/// network order.
pub trait ResponseParser: Send + Sync + 'static {
    fn parse(
        &self,
        response: http::Response<BodyStream>,
        operation: &graphql::Request,
    ) -> ResponseStream;
}

/// The default [`ResponseParser`]: the whole body is one JSON document
/// holding one GraphQL response.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonResponseParser;

impl ResponseParser for JsonResponseParser {
    fn parse(
        &self,
        response: http::Response<BodyStream>,
        _operation: &graphql::Request,
    ) -> ResponseStream {
        let (parts, body) = response.into_parts();
        stream::once(async move {
            let bytes = collect_body(body).await?;
            match graphql::Response::from_bytes(bytes) {
                Ok(body) => Ok(Response::from_server(body)),
                // Servers answer some failures (e.g. an unknown persisted
                // query) with an error status and a well-formed GraphQL
                // body, which still counts as a response. Only give up when
                // the body is not GraphQL at all.
                Err(_) if !parts.status.is_success() => Err(RequestError::Transport {
                    status: Some(parts.status.as_u16()),
                    reason: parts.status.to_string(),
                }),
                Err(err) => Err(err),
            }
        })
        .boxed()
    }
}

async fn collect_body(mut body: BodyStream) -> Result<Bytes, RequestError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = body.try_next().await? {
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

/// Builds and runs the raw leg of one attempt.
#[derive(Clone)]
pub(crate) struct NetworkBridge {
    interceptors: Arc<[Arc<dyn HttpInterceptor>]>,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn ResponseParser>,
}

impl NetworkBridge {
    pub(crate) fn new(
        interceptors: Vec<Arc<dyn HttpInterceptor>>,
        transport: Arc<dyn Transport>,
        parser: Arc<dyn ResponseParser>,
    ) -> Self {
        NetworkBridge {
            interceptors: interceptors.into(),
            transport,
            parser,
        }
    }

    /// Serialize `request`, traverse the HTTP-level chain, and parse the
    /// exchange.
    ///
    /// The per-request timeout, when set, bounds everything up to response
    /// headers. Body streaming and parsing are not under it; they are
    /// bounded by the caller consuming (or dropping) the stream.
    pub(crate) async fn fetch(&self, request: &Request) -> Result<ResponseStream, RequestError> {
        let raw = build_http_request(request)?;
        let chain = HttpChain::new(
            &self.interceptors,
            Arc::new(TransportTerminal {
                transport: self.transport.clone(),
            }),
        );
        let send = chain.proceed(HttpRequest::new(raw, request.context.clone()));
        let response = match request.timeout {
            Some(after) => tokio::time::timeout(after, send)
                .await
                .map_err(|_| RequestError::Timeout { after })??,
            None => send.await?,
        };

        let stream = self.parser.parse(response.http_response, &request.operation);
        // Whatever the parser produced came from the network; enforce the
        // origin tag so downstream persistence can rely on it.
        Ok(stream
            .map(|item| {
                item.map(|mut response| {
                    response.source = Source::Server;
                    response
                })
            })
            .boxed())
    }
}

fn build_http_request(request: &Request) -> Result<http::Request<Bytes>, RequestError> {
    let body = serde_json::to_vec(&request.operation).map_err(|err| {
        RequestError::MalformedRequest {
            reason: err.to_string(),
        }
    })?;
    let mut raw = http::Request::builder()
        .method(Method::POST)
        .uri(request.endpoint.clone())
        .body(Bytes::from(body))
        .map_err(|err| RequestError::MalformedRequest {
            reason: err.to_string(),
        })?;

    let headers = raw.headers_mut();
    for (name, value) in &request.headers {
        headers.append(name, value.clone());
    }
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, APPLICATION_JSON_HEADER_VALUE.clone());
    }
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, ACCEPT_GRAPHQL_HEADER_VALUE.clone());
    }
    Ok(raw)
}

struct TransportTerminal {
    transport: Arc<dyn Transport>,
}

#[async_trait]
impl HttpTerminal for TransportTerminal {
    async fn send(&self, request: HttpRequest) -> ChainResult<HttpResponse> {
        let HttpRequest {
            http_request,
            context,
        } = request;
        let response = self.transport.fetch_chunks(http_request).await?;
        Ok(HttpResponse::new(response, context))
    }
}
