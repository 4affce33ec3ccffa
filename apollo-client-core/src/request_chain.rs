//! The request chain: one logical GraphQL call, from the interceptors
//! through the cache and network legs, to a stream of responses.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use static_assertions::assert_impl_all;

use crate::cache::CacheBridge;
use crate::cache::NormalizedCache;
use crate::error::RequestError;
use crate::http::Transport;
use crate::interceptor::ChainResult;
use crate::interceptor::GraphQLChain;
use crate::interceptor::GraphQLInterceptor;
use crate::interceptor::GraphQLTerminal;
use crate::interceptor::HttpInterceptor;
use crate::network::JsonResponseParser;
use crate::network::NetworkBridge;
use crate::network::ResponseParser;
use crate::request::Request;
use crate::response::Response;
use crate::response::ResponseStream;

assert_impl_all!(RequestChain: Send, Sync);
/// Executes GraphQL calls through two stacks of interceptors, a cache and a
/// transport.
///
/// A chain is built once and shared: running a call does not consume it, and
/// concurrent calls are independent except for whatever state individual
/// interceptors choose to share.
pub struct RequestChain {
    interceptors: Vec<Arc<dyn GraphQLInterceptor>>,
    executor: Arc<Executor>,
}

// Not using buildstructor because the setters take trait objects
/// Assembles a [`RequestChain`], obtained from [`RequestChain::builder`].
pub struct RequestChainBuilder {
    interceptors: Vec<Arc<dyn GraphQLInterceptor>>,
    http_interceptors: Vec<Arc<dyn HttpInterceptor>>,
    store: Arc<dyn NormalizedCache>,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn ResponseParser>,
}

impl RequestChain {
    /// Start building a chain around the two components every chain needs: a
    /// cache store and a transport.
    pub fn builder(
        store: Arc<dyn NormalizedCache>,
        transport: Arc<dyn Transport>,
    ) -> RequestChainBuilder {
        RequestChainBuilder {
            interceptors: Vec::new(),
            http_interceptors: Vec::new(),
            store,
            transport,
            parser: Arc::new(JsonResponseParser),
        }
    }

    /// Run one logical GraphQL call.
    ///
    /// The returned stream yields every response the call produces, cache
    /// replays and server responses alike. Retries demanded by interceptors
    /// happen internally; the caller never observes them beyond their
    /// effects. A call that finishes without a single response fails with
    /// [`RequestError::NoResults`]. An `Err` item, when present, is the last
    /// item of the stream.
    ///
    /// Dropping the stream cancels the call: nothing further is fetched,
    /// parsed or persisted.
    pub fn kickoff(&self, request: Request) -> ResponseStream {
        tracing::debug!(
            operation = request.operation.operation_name.as_deref().unwrap_or(""),
            "kicking off request chain"
        );
        let state = Kickoff {
            chain: GraphQLChain::new(&self.interceptors, self.executor.clone()),
            phase: KickoffPhase::Attempt(Box::new(request)),
            emitted: 0,
            attempt: 0,
        };
        stream::unfold(state, |mut state| async move {
            state.next_item().await.map(|item| (item, state))
        })
        .boxed()
    }
}

impl RequestChainBuilder {
    /// Append a GraphQL-level interceptor. The first appended becomes the
    /// outermost layer.
    pub fn interceptor(mut self, interceptor: Arc<dyn GraphQLInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Append an HTTP-level interceptor. The first appended becomes the
    /// outermost layer of the raw leg.
    pub fn http_interceptor(mut self, interceptor: Arc<dyn HttpInterceptor>) -> Self {
        self.http_interceptors.push(interceptor);
        self
    }

    /// Replace the default JSON parser, e.g. with a multipart-aware one.
    pub fn parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn build(self) -> RequestChain {
        RequestChain {
            interceptors: self.interceptors,
            executor: Arc::new(Executor {
                cache: CacheBridge::new(self.store),
                network: NetworkBridge::new(self.http_interceptors, self.transport, self.parser),
            }),
        }
    }
}

/// Drives one call across as many attempts as its interceptors demand.
struct Kickoff {
    chain: GraphQLChain,
    phase: KickoffPhase,
    emitted: u64,
    attempt: u64,
}

enum KickoffPhase {
    /// The next attempt's request, not yet started.
    Attempt(Box<Request>),
    /// The current attempt's responses are being forwarded.
    Streaming(ResponseStream),
    Done,
}

impl Kickoff {
    async fn next_item(&mut self) -> Option<Result<Response, RequestError>> {
        loop {
            match std::mem::replace(&mut self.phase, KickoffPhase::Done) {
                KickoffPhase::Attempt(request) => {
                    self.attempt += 1;
                    tracing::debug!(attempt = self.attempt, "starting attempt");
                    match self.chain.proceed(*request).await {
                        Ok(stream) => self.phase = KickoffPhase::Streaming(stream),
                        Err(RequestError::Retry(signal)) => {
                            tracing::debug!("restarting with a replacement request");
                            self.phase = KickoffPhase::Attempt(Box::new(signal.request));
                        }
                        Err(err) => return Some(Err(err)),
                    }
                }
                KickoffPhase::Streaming(mut stream) => match stream.next().await {
                    Some(Ok(response)) => {
                        self.emitted += 1;
                        self.phase = KickoffPhase::Streaming(stream);
                        return Some(Ok(response));
                    }
                    Some(Err(RequestError::Retry(signal))) => {
                        tracing::debug!("restarting with a replacement request");
                        self.phase = KickoffPhase::Attempt(Box::new(signal.request));
                    }
                    Some(Err(err)) => return Some(Err(err)),
                    None => {
                        if self.emitted == 0 {
                            return Some(Err(RequestError::NoResults));
                        }
                        tracing::debug!(emitted = self.emitted, "request chain completed");
                        return None;
                    }
                },
                KickoffPhase::Done => return None,
            }
        }
    }
}

/// The step at the bottom of the GraphQL-level chain: run the cache and
/// network legs of one attempt according to the request's fetch behavior.
struct Executor {
    cache: CacheBridge,
    network: NetworkBridge,
}

#[async_trait]
impl GraphQLTerminal for Executor {
    async fn execute(&self, request: Request) -> ChainResult<ResponseStream> {
        let behavior = request.fetch_behavior;

        let mut staged = None;
        if behavior.should_read_cache(false) {
            match self.cache.read(&request).await {
                Ok(hit) => staged = hit,
                // A failed read only fails the attempt when nothing else
                // could still answer it.
                Err(err) if behavior.should_fetch_network(false) => {
                    tracing::warn!(error = %err, "cache read failed, continuing to network");
                }
                Err(err) => return Err(err),
            }
        }

        let fetch = behavior.should_fetch_network(staged.is_some());
        let phase = match (staged, fetch) {
            (Some(hit), then_network) => AttemptPhase::CacheEmit { hit, then_network },
            (None, true) => AttemptPhase::Network,
            (None, false) => AttemptPhase::Finished,
        };
        let state = Attempt {
            cache: self.cache.clone(),
            network: self.network.clone(),
            request,
            phase,
        };
        Ok(stream::unfold(state, |mut state| async move {
            state.next_item().await.map(|item| (item, state))
        })
        .boxed())
    }
}

/// One attempt's emissions, produced lazily as the caller pulls.
struct Attempt {
    cache: CacheBridge,
    network: NetworkBridge,
    request: Request,
    phase: AttemptPhase,
}

enum AttemptPhase {
    /// A cache hit waiting to be yielded.
    CacheEmit { hit: Response, then_network: bool },
    /// The network leg has not started yet.
    Network,
    /// Parsed responses are streaming in.
    Streaming(ResponseStream),
    Finished,
}

impl Attempt {
    async fn next_item(&mut self) -> Option<Result<Response, RequestError>> {
        loop {
            match std::mem::replace(&mut self.phase, AttemptPhase::Finished) {
                AttemptPhase::CacheEmit { hit, then_network } => {
                    if then_network {
                        self.phase = AttemptPhase::Network;
                    }
                    return Some(Ok(hit));
                }
                AttemptPhase::Network => match self.network.fetch(&self.request).await {
                    Ok(stream) => self.phase = AttemptPhase::Streaming(stream),
                    Err(err) => return Some(self.network_failure(err).await),
                },
                AttemptPhase::Streaming(mut stream) => match stream.next().await {
                    Some(Ok(response)) => {
                        // Persistence is best effort, and happens before the
                        // element travels upward.
                        if let Err(err) = self.cache.write(&self.request, &response).await {
                            tracing::error!(error = %err, "failed to persist response");
                        }
                        self.phase = AttemptPhase::Streaming(stream);
                        return Some(Ok(response));
                    }
                    Some(Err(err)) => return Some(self.network_failure(err).await),
                    None => return None,
                },
                AttemptPhase::Finished => return None,
            }
        }
    }

    /// Decide what a failed network leg means for the attempt: retry demands
    /// pass through untouched, and a fallback cache read may still answer.
    async fn network_failure(&mut self, error: RequestError) -> Result<Response, RequestError> {
        if error.is_retry() {
            return Err(error);
        }
        if !self.request.fetch_behavior.should_read_cache(true) {
            return Err(error);
        }
        tracing::debug!(error = %error, "network fetch failed, trying the cache");
        match self.cache.read(&self.request).await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(error),
            Err(read_error) => {
                tracing::warn!(error = %read_error, "fallback cache read also failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use test_log::test;

    use super::*;
    use crate::fetch_behavior::CacheRead;
    use crate::fetch_behavior::FetchBehavior;
    use crate::fetch_behavior::NetworkFetch;
    use crate::test_harness::MockStore;
    use crate::test_harness::MockTransport;

    #[test(tokio::test)]
    async fn a_policy_that_allows_nothing_yields_no_results() {
        let chain = RequestChain::builder(
            Arc::new(MockStore::new()),
            Arc::new(MockTransport::new()),
        )
        .build();
        let request = crate::Request::fake_builder()
            .query("{ me }")
            .fetch_behavior(FetchBehavior {
                cache_read: CacheRead::Never,
                network_fetch: NetworkFetch::Never,
            })
            .build();

        let mut stream = chain.kickoff(request);
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, RequestError::NoResults));
        assert!(stream.next().await.is_none());
    }

    #[test(tokio::test)]
    async fn cache_only_misses_complete_without_emitting() {
        let chain = RequestChain::builder(
            Arc::new(MockStore::new()),
            Arc::new(MockTransport::new()),
        )
        .build();
        let request = crate::Request::fake_builder()
            .query("{ me }")
            .fetch_behavior(FetchBehavior::CACHE_ONLY)
            .build();

        let mut stream = chain.kickoff(request);
        assert!(matches!(
            stream.next().await,
            Some(Err(RequestError::NoResults)),
        ));
    }
}
