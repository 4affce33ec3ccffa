//! Runs GraphQL operations through a chain of interceptors, a normalized
//! cache and an HTTP transport.
//!
//! The entry point is [`RequestChain`]: build one around a
//! [`NormalizedCache`] and a [`Transport`], add interceptors, then call
//! [`RequestChain::kickoff`] per operation and consume the returned stream.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use apollo_client_core::test_harness::MockStore;
//! use apollo_client_core::Request;
//! use apollo_client_core::RequestChain;
//! use apollo_client_core::ReqwestTransport;
//! use futures::StreamExt;
//!
//! # #[tokio::main] async fn main() -> Result<(), apollo_client_core::BoxError> {
//! let chain = RequestChain::builder(
//!     Arc::new(MockStore::new()),
//!     Arc::new(ReqwestTransport::new()),
//! )
//! .build();
//!
//! let request = Request::builder()
//!     .query("{ me { id name } }")
//!     .endpoint(http::Uri::from_static("https://example.com/graphql"))
//!     .build()?;
//!
//! let mut responses = chain.kickoff(request);
//! while let Some(response) = responses.next().await {
//!     println!("{:?}", response?.body.data);
//! }
//! # Ok(()) }
//! ```

#![warn(unreachable_pub)]

mod cache;
mod context;
pub mod error;
mod fetch_behavior;
pub mod graphql;
mod http;
mod interceptor;
pub mod interceptors;
pub mod json_ext;
mod network;
mod request;
mod request_chain;
mod response;
pub mod test_harness;

pub use cache::CacheKey;
pub use cache::NormalizedCache;
pub use context::Context;
pub use error::BoxError;
pub use error::RequestError;
pub use error::RetrySignal;
pub use fetch_behavior::CacheRead;
pub use fetch_behavior::FetchBehavior;
pub use fetch_behavior::NetworkFetch;
pub use interceptor::ChainResult;
pub use interceptor::GraphQLChain;
pub use interceptor::GraphQLInterceptor;
pub use interceptor::HttpChain;
pub use interceptor::HttpInterceptor;
pub use network::JsonResponseParser;
pub use network::ResponseParser;
pub use request::Request;
pub use request_chain::RequestChain;
pub use request_chain::RequestChainBuilder;
pub use response::Response;
pub use response::ResponseStream;
pub use response::Source;

pub use crate::http::BodyStream;
pub use crate::http::HttpRequest;
pub use crate::http::HttpResponse;
pub use crate::http::ReqwestTransport;
pub use crate::http::Transport;
