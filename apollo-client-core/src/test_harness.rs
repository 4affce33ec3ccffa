//! In-memory implementations of the chain's seams.
//!
//! These allow tests, benchmarks, etc to drive a
//! [`RequestChain`](crate::RequestChain) entirely in memory: a scripted
//! [`Transport`], an inspectable [`NormalizedCache`], a parser that yields
//! pre-built responses and an interceptor that records the order things
//! happened in.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream;
use futures::StreamExt;
use http::HeaderMap;
use http::Method;
use http::StatusCode;
use http::Uri;
use parking_lot::Mutex;

use crate::cache::CacheKey;
use crate::cache::NormalizedCache;
use crate::error::BoxError;
use crate::error::RequestError;
use crate::graphql;
use crate::http::BodyStream;
use crate::http::Transport;
use crate::interceptor::ChainResult;
use crate::interceptor::GraphQLChain;
use crate::interceptor::GraphQLInterceptor;
use crate::network::ResponseParser;
use crate::request::Request;
use crate::response::Response;
use crate::response::ResponseStream;

/// A shared, ordered record of what a [`RecordingInterceptor`] observed.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Create an empty [`EventLog`] to share between recording interceptors.
pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Collect a response stream into its emissions and its terminal error.
///
/// Stops at the first `Err` item, which by the chain contract is also the
/// last one.
pub async fn drain(mut stream: ResponseStream) -> (Vec<Response>, Option<RequestError>) {
    let mut responses = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(response) => responses.push(response),
            Err(err) => return (responses, Some(err)),
        }
    }
    (responses, None)
}

/// One raw HTTP request as a [`MockTransport`] saw it.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    /// The recorded body, decoded as the GraphQL request it carried.
    pub fn graphql_body(&self) -> graphql::Request {
        serde_json::from_slice(&self.body).expect("recorded body is not a graphql request")
    }
}

enum MockReply {
    Response {
        status: StatusCode,
        chunks: Vec<Result<Bytes, RequestError>>,
    },
    Error(RequestError),
}

/// A [`Transport`] that answers from a script and records every request.
///
/// Replies are consumed in the order they were scripted, one per request.
/// Running past the end of the script fails the fetch, which keeps a test
/// with a missing expectation from hanging on the network.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a 200 reply carrying `body` as a single JSON chunk.
    pub fn respond_json(&self, body: serde_json::Value) {
        let bytes = serde_json::to_vec(&body).expect("serializing a json value cannot fail");
        self.respond_chunks(StatusCode::OK, vec![Ok(Bytes::from(bytes))]);
    }

    /// Script a reply with an arbitrary status and a plain text body.
    pub fn respond_status(&self, status: StatusCode, body: &str) {
        self.respond_chunks(status, vec![Ok(Bytes::copy_from_slice(body.as_bytes()))]);
    }

    /// Script a reply delivered as individual body chunks, any of which may
    /// be a mid-body failure.
    pub fn respond_chunks(&self, status: StatusCode, chunks: Vec<Result<Bytes, RequestError>>) {
        self.replies
            .lock()
            .push_back(MockReply::Response { status, chunks });
    }

    /// Script a fetch that fails before any response arrives.
    pub fn respond_error(&self, error: RequestError) {
        self.replies.lock().push_back(MockReply::Error(error));
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_chunks(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<BodyStream>, RequestError> {
        let (parts, body) = request.into_parts();
        self.requests.lock().push(RecordedRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        });

        match self.replies.lock().pop_front() {
            Some(MockReply::Response { status, chunks }) => Ok(http::Response::builder()
                .status(status)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(stream::iter(chunks).boxed())
                .expect("valid mock response")),
            Some(MockReply::Error(error)) => Err(error),
            None => Err(RequestError::Transport {
                status: None,
                reason: "no scripted reply left".to_string(),
            }),
        }
    }
}

/// A [`NormalizedCache`] holding responses in a map, with counters and
/// failure switches.
#[derive(Default)]
pub struct MockStore {
    entries: DashMap<String, graphql::Response>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store with the response a request would have cached.
    pub fn seed(&self, request: &Request, response: graphql::Response) {
        self.entries
            .insert(CacheKey::from_request(request).as_str().to_owned(), response);
    }

    /// What `request` has in the store right now, if anything.
    pub fn written(&self, request: &Request) -> Option<graphql::Response> {
        self.entries
            .get(CacheKey::from_request(request).as_str())
            .map(|entry| entry.clone())
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NormalizedCache for MockStore {
    async fn read(&self, key: &CacheKey) -> Result<Option<graphql::Response>, BoxError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err("scripted read failure".into());
        }
        Ok(self.entries.get(key.as_str()).map(|entry| entry.clone()))
    }

    async fn write(&self, key: &CacheKey, response: &graphql::Response) -> Result<(), BoxError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err("scripted write failure".into());
        }
        self.entries
            .insert(key.as_str().to_owned(), response.clone());
        Ok(())
    }
}

/// A GraphQL-level interceptor that appends what it sees to an [`EventLog`]:
/// `label:request` when entered, then `label:response` or `label:error` per
/// stream item.
pub struct RecordingInterceptor {
    label: String,
    events: EventLog,
}

impl RecordingInterceptor {
    pub fn new(label: impl Into<String>, events: EventLog) -> Self {
        Self {
            label: label.into(),
            events,
        }
    }
}

#[async_trait]
impl GraphQLInterceptor for RecordingInterceptor {
    async fn intercept(&self, request: Request, next: GraphQLChain) -> ChainResult<ResponseStream> {
        self.events.lock().push(format!("{}:request", self.label));
        let label = self.label.clone();
        let events = self.events.clone();
        match next.proceed(request).await {
            Ok(stream) => Ok(stream
                .map(move |item| {
                    let kind = if item.is_ok() { "response" } else { "error" };
                    events.lock().push(format!("{label}:{kind}"));
                    item
                })
                .boxed()),
            Err(err) => {
                self.events.lock().push(format!("{}:error", self.label));
                Err(err)
            }
        }
    }
}

/// A [`ResponseParser`] that ignores the raw body and yields pre-built
/// responses, one script entry per parsed exchange.
///
/// Useful to stand in for multipart decoders: scripting several parts for
/// one exchange exercises the multi-emission paths without a wire format.
#[derive(Default)]
pub struct CannedParser {
    scripts: Mutex<VecDeque<Vec<Result<graphql::Response, RequestError>>>>,
}

impl CannedParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the parts the next parsed exchange will yield.
    pub fn next_parse(&self, parts: Vec<Result<graphql::Response, RequestError>>) {
        self.scripts.lock().push_back(parts);
    }
}

impl ResponseParser for CannedParser {
    fn parse(
        &self,
        _response: http::Response<BodyStream>,
        _operation: &graphql::Request,
    ) -> ResponseStream {
        let parts = match self.scripts.lock().pop_front() {
            Some(parts) => parts,
            None => vec![Err(RequestError::MalformedResponse {
                reason: "no scripted parse left".to_string(),
            })],
        };
        stream::iter(
            parts
                .into_iter()
                .map(|part| part.map(Response::from_server)),
        )
        .boxed()
    }
}
