//! The response type emitted by the request chain, and its stream alias.

use std::pin::Pin;

use futures::Stream;
use static_assertions::assert_impl_all;

use crate::error::RequestError;
use crate::graphql;

/// An asynchronous [`Stream`] of chain [`Response`]s.
///
/// In some cases such as with `@defer` or subscriptions, a single HTTP
/// response from the server may contain multiple GraphQL responses that will
/// be sent at different times (as more data becomes available).
///
/// We represent this in Rust as a stream, even if that stream happens to only
/// contain one item. The stream is pull-based: dropping it abandons whatever
/// work the chain still had in flight. An `Err` item, when present, is the
/// last item of the stream.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Response, RequestError>> + Send>>;

/// Where a response was produced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    /// Served from the normalized cache without touching the network.
    Cache,

    /// Parsed out of a server response.
    Server,
}

assert_impl_all!(Response: Send);
/// One GraphQL response produced by an attempt, tagged with its origin.
///
/// The origin tag is what downstream consumers (and the cache persistence
/// step) use to tell a cache replay from fresh server data.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Response {
    /// The parsed GraphQL response.
    pub body: graphql::Response,

    /// Where the response came from.
    pub source: Source,
}

impl Response {
    pub fn from_cache(body: graphql::Response) -> Self {
        Response {
            body,
            source: Source::Cache,
        }
    }

    pub fn from_server(body: graphql::Response) -> Self {
        Response {
            body,
            source: Source::Server,
        }
    }

    pub fn is_from_cache(&self) -> bool {
        self.source == Source::Cache
    }
}
