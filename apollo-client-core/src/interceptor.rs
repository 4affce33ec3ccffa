//! Interceptor traits and the chains that compose them.
//!
//! A chain is built by folding the registered interceptors, in reverse, over
//! the terminal step, so the first registered interceptor becomes the
//! outermost layer. Each interceptor receives the request on the way down and
//! the response stream on the way up, and may rewrite either, short-circuit
//! with an error, or demand a retry with a replacement request.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RequestError;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::request::Request;
use crate::response::ResponseStream;

/// Result alias for values traveling up a chain.
pub type ChainResult<T> = Result<T, RequestError>;

/// A unit of middleware operating on parsed GraphQL requests and response
/// streams.
///
/// Implementations must call [`GraphQLChain::proceed`] on `next` to hand
/// control to the rest of the chain, unless they intend to short-circuit the
/// attempt. `next` is owned, so it can also be moved into a stream adapter
/// and re-entered later.
#[async_trait]
pub trait GraphQLInterceptor: Send + Sync + 'static {
    async fn intercept(&self, request: Request, next: GraphQLChain) -> ChainResult<ResponseStream>;

    /// Displayed in traces. Defaults to the implementing type's name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A unit of middleware operating on the raw HTTP exchange, after the
/// GraphQL-level chain and request serialization.
#[async_trait]
pub trait HttpInterceptor: Send + Sync + 'static {
    async fn intercept(&self, request: HttpRequest, next: HttpChain) -> ChainResult<HttpResponse>;

    /// Displayed in traces. Defaults to the implementing type's name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The step a GraphQL-level chain bottoms out at.
#[async_trait]
pub(crate) trait GraphQLTerminal: Send + Sync {
    async fn execute(&self, request: Request) -> ChainResult<ResponseStream>;
}

/// The step an HTTP-level chain bottoms out at.
#[async_trait]
pub(crate) trait HttpTerminal: Send + Sync {
    async fn send(&self, request: HttpRequest) -> ChainResult<HttpResponse>;
}

/// The rest of a GraphQL-level chain, from the next interceptor down to the
/// step that runs the cache and network legs.
///
/// Cloning is cheap and yields a handle to the same remainder.
#[derive(Clone)]
pub struct GraphQLChain {
    link: Arc<GraphQLLink>,
}

enum GraphQLLink {
    Interceptor {
        interceptor: Arc<dyn GraphQLInterceptor>,
        next: GraphQLChain,
    },
    Terminal(Arc<dyn GraphQLTerminal>),
}

impl GraphQLChain {
    pub(crate) fn new(
        interceptors: &[Arc<dyn GraphQLInterceptor>],
        terminal: Arc<dyn GraphQLTerminal>,
    ) -> Self {
        interceptors.iter().rev().fold(
            GraphQLChain {
                link: Arc::new(GraphQLLink::Terminal(terminal)),
            },
            |next, interceptor| GraphQLChain {
                link: Arc::new(GraphQLLink::Interceptor {
                    interceptor: interceptor.clone(),
                    next,
                }),
            },
        )
    }

    /// Hand `request` to the rest of the chain and wait for its stream.
    pub async fn proceed(&self, request: Request) -> ChainResult<ResponseStream> {
        match self.link.as_ref() {
            GraphQLLink::Interceptor { interceptor, next } => {
                tracing::trace!(interceptor = interceptor.name(), "entering interceptor");
                interceptor.intercept(request, next.clone()).await
            }
            GraphQLLink::Terminal(terminal) => terminal.execute(request).await,
        }
    }
}

/// The rest of an HTTP-level chain, from the next interceptor down to the
/// transport.
///
/// Cloning is cheap and yields a handle to the same remainder.
#[derive(Clone)]
pub struct HttpChain {
    link: Arc<HttpLink>,
}

enum HttpLink {
    Interceptor {
        interceptor: Arc<dyn HttpInterceptor>,
        next: HttpChain,
    },
    Terminal(Arc<dyn HttpTerminal>),
}

impl HttpChain {
    pub(crate) fn new(
        interceptors: &[Arc<dyn HttpInterceptor>],
        terminal: Arc<dyn HttpTerminal>,
    ) -> Self {
        interceptors.iter().rev().fold(
            HttpChain {
                link: Arc::new(HttpLink::Terminal(terminal)),
            },
            |next, interceptor| HttpChain {
                link: Arc::new(HttpLink::Interceptor {
                    interceptor: interceptor.clone(),
                    next,
                }),
            },
        )
    }

    /// Hand `request` to the rest of the chain and wait for its response.
    pub async fn proceed(&self, request: HttpRequest) -> ChainResult<HttpResponse> {
        match self.link.as_ref() {
            HttpLink::Interceptor { interceptor, next } => {
                tracing::trace!(interceptor = interceptor.name(), "entering interceptor");
                interceptor.intercept(request, next.clone()).await
            }
            HttpLink::Terminal(terminal) => terminal.send(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use futures::stream;
    use futures::StreamExt;
    use parking_lot::Mutex;

    use super::*;
    use crate::graphql;
    use crate::response::Response;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Tracer {
        label: &'static str,
        log: Log,
    }

    #[async_trait]
    impl GraphQLInterceptor for Tracer {
        async fn intercept(
            &self,
            request: Request,
            next: GraphQLChain,
        ) -> ChainResult<ResponseStream> {
            self.log.lock().push(format!("{}:request", self.label));
            let stream = next.proceed(request).await?;
            self.log.lock().push(format!("{}:response", self.label));
            Ok(stream)
        }
    }

    struct StaticTerminal {
        log: Log,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphQLTerminal for StaticTerminal {
        async fn execute(&self, request: Request) -> ChainResult<ResponseStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().push(format!(
                "execute:{}",
                request.operation.query.as_deref().unwrap_or("")
            ));
            let body = graphql::Response::builder()
                .data(serde_json_bytes::json!({ "ok": true }))
                .build();
            Ok(stream::iter(vec![Ok(Response::from_server(body))]).boxed())
        }
    }

    fn tracer(label: &'static str, log: &Log) -> Arc<dyn GraphQLInterceptor> {
        Arc::new(Tracer {
            label,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn chain_runs_interceptors_as_an_onion() {
        let log: Log = Default::default();
        let terminal = Arc::new(StaticTerminal {
            log: log.clone(),
            calls: AtomicUsize::new(0),
        });
        let chain = GraphQLChain::new(
            &[tracer("a", &log), tracer("b", &log), tracer("c", &log)],
            terminal.clone(),
        );

        let request = Request::fake_builder().query("{ me { id } }").build();
        let stream = chain.proceed(request).await.unwrap();
        let responses: Vec<_> = stream.collect().await;
        assert_eq!(responses.len(), 1);

        assert_eq!(
            *log.lock(),
            vec![
                "a:request",
                "b:request",
                "c:request",
                "execute:{ me { id } }",
                "c:response",
                "b:response",
                "a:response",
            ],
        );
        assert_eq!(terminal.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_circuiting_skips_deeper_layers() {
        struct Refuser;

        #[async_trait]
        impl GraphQLInterceptor for Refuser {
            async fn intercept(
                &self,
                _request: Request,
                _next: GraphQLChain,
            ) -> ChainResult<ResponseStream> {
                Err(RequestError::interceptor("operation not allowed"))
            }
        }

        let log: Log = Default::default();
        let terminal = Arc::new(StaticTerminal {
            log: log.clone(),
            calls: AtomicUsize::new(0),
        });
        let chain = GraphQLChain::new(
            &[tracer("outer", &log), Arc::new(Refuser)],
            terminal.clone(),
        );

        let request = Request::fake_builder().query("{ me { id } }").build();
        let Err(err) = chain.proceed(request).await else {
            panic!("expected the refuser to short-circuit")
        };
        assert!(matches!(err, RequestError::Interceptor { .. }));
        // the refuser never let the request reach the terminal
        assert_eq!(terminal.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*log.lock(), vec!["outer:request"]);
    }

    #[tokio::test]
    async fn request_mutations_are_visible_downstream() {
        struct Rewriter;

        #[async_trait]
        impl GraphQLInterceptor for Rewriter {
            async fn intercept(
                &self,
                mut request: Request,
                next: GraphQLChain,
            ) -> ChainResult<ResponseStream> {
                request.operation.query = Some("{ rewritten }".to_string());
                next.proceed(request).await
            }
        }

        let log: Log = Default::default();
        let terminal = Arc::new(StaticTerminal {
            log: log.clone(),
            calls: AtomicUsize::new(0),
        });
        let chain = GraphQLChain::new(&[Arc::new(Rewriter)], terminal);

        let request = Request::fake_builder().query("{ original }").build();
        chain.proceed(request).await.unwrap();
        assert_eq!(*log.lock(), vec!["execute:{ rewritten }"]);
    }
}
