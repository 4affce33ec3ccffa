//! The request type traversing the chain of interceptors.

use std::collections::HashMap;
use std::time::Duration;

use http::header::HeaderName;
use http::HeaderMap;
use http::HeaderValue;
use http::Uri;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;
use static_assertions::assert_impl_all;

use crate::context::Context;
use crate::error::BoxError;
use crate::fetch_behavior::FetchBehavior;
use crate::graphql;

assert_impl_all!(Request: Send);
/// One logical GraphQL call as it moves through the request chain.
///
/// Interceptors receive the request by value and may freely rewrite any part
/// of it before handing it to the rest of the chain.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Request {
    /// The GraphQL operation to execute.
    pub operation: graphql::Request,

    /// Where the raw HTTP request is sent.
    pub endpoint: Uri,

    /// Additional headers for the raw HTTP request.
    pub headers: HeaderMap,

    /// How this call participates in caching and network fetching.
    pub fetch_behavior: FetchBehavior,

    /// Whether responses produced by the server may be persisted to the cache.
    pub write_results_to_cache: bool,

    /// Give up on the network leg of an attempt after this long.
    pub timeout: Option<Duration>,

    /// State shared by all interceptors, and across retries when the
    /// replacement request carries the same context.
    pub context: Context,
}

#[buildstructor::buildstructor]
impl Request {
    /// This is the constructor (or builder) to use when constructing a real
    /// `Request`.
    ///
    /// Required parameters are the `endpoint` and at least a `query`, the
    /// rest matches what a GraphQL server accepts alongside an operation.
    #[builder(visibility = "pub")]
    #[allow(clippy::too_many_arguments)]
    fn new(
        query: Option<String>,
        operation_name: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        variables: JsonMap<ByteString, Value>,
        extensions: JsonMap<ByteString, Value>,
        endpoint: Uri,
        headers: HashMap<String, String>,
        fetch_behavior: Option<FetchBehavior>,
        write_results_to_cache: Option<bool>,
        timeout: Option<Duration>,
        context: Option<Context>,
    ) -> Result<Request, BoxError> {
        let mut header_map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            header_map.insert(
                HeaderName::try_from(name.as_str())?,
                HeaderValue::try_from(value.as_str())?,
            );
        }
        Ok(Request {
            operation: graphql::Request::builder()
                .and_query(query)
                .and_operation_name(operation_name)
                .variables(variables)
                .extensions(extensions)
                .build(),
            endpoint,
            headers: header_map,
            fetch_behavior: fetch_behavior.unwrap_or_default(),
            write_results_to_cache: write_results_to_cache.unwrap_or(true),
            timeout,
            context: context.unwrap_or_default(),
        })
    }

    /// This is the constructor (or builder) to use when constructing a
    /// **fake** `Request`: it does not need an endpoint because tests drive
    /// the chain against in-memory transports that never look at it.
    #[builder(visibility = "pub")]
    fn fake_new(
        query: Option<String>,
        operation_name: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        variables: JsonMap<ByteString, Value>,
        extensions: JsonMap<ByteString, Value>,
        fetch_behavior: Option<FetchBehavior>,
        write_results_to_cache: Option<bool>,
        context: Option<Context>,
    ) -> Request {
        Request {
            operation: graphql::Request::builder()
                .and_query(query)
                .and_operation_name(operation_name)
                .variables(variables)
                .extensions(extensions)
                .build(),
            endpoint: Uri::from_static("http://default"),
            headers: HeaderMap::new(),
            fetch_behavior: fetch_behavior.unwrap_or_default(),
            write_results_to_cache: write_results_to_cache.unwrap_or(true),
            timeout: None,
            context: context.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_headers_and_defaults() {
        let request = Request::builder()
            .query("{ me { id } }")
            .endpoint(Uri::from_static("https://example.com/graphql"))
            .header("x-client-name", "apollo-client-core")
            .build()
            .unwrap();
        assert_eq!(request.operation.query.as_deref(), Some("{ me { id } }"));
        assert_eq!(
            request.headers.get("x-client-name").unwrap(),
            "apollo-client-core",
        );
        assert_eq!(request.fetch_behavior, FetchBehavior::CACHE_FIRST);
        assert!(request.write_results_to_cache);
        assert!(request.timeout.is_none());
    }

    #[test]
    fn builder_rejects_invalid_header_names() {
        let result = Request::builder()
            .query("{ me { id } }")
            .endpoint(Uri::from_static("https://example.com/graphql"))
            .header("not a header name", "value")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn fake_builder_needs_no_endpoint() {
        let request = Request::fake_builder()
            .query("{ me { id } }")
            .fetch_behavior(FetchBehavior::NETWORK_ONLY)
            .build();
        assert_eq!(request.fetch_behavior, FetchBehavior::NETWORK_ONLY);
    }
}
