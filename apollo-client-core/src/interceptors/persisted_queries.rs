//! (A)utomatic (P)ersisted (Q)ueries, client side.
//!
//! For more information on APQ see:
//! <https://www.apollographql.com/docs/apollo-server/performance/apq/>

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use sha2::Digest;
use sha2::Sha256;

use crate::error::RequestError;
use crate::graphql;
use crate::interceptor::ChainResult;
use crate::interceptor::GraphQLChain;
use crate::interceptor::GraphQLInterceptor;
use crate::request::Request;
use crate::response::ResponseStream;

const PERSISTED_QUERY_NOT_FOUND_EXTENSION_CODE: &str = "PERSISTED_QUERY_NOT_FOUND";
const PERSISTED_QUERY_NOT_SUPPORTED_EXTENSION_CODE: &str = "PERSISTED_QUERY_NOT_SUPPORTED";
const PERSISTED_QUERY_NOT_FOUND_MESSAGE: &str = "PersistedQueryNotFound";
const PERSISTED_QUERY_NOT_SUPPORTED_MESSAGE: &str = "PersistedQueryNotSupported";
const CODE_STRING: &str = "code";
const PERSISTED_QUERY_KEY: &str = "persistedQuery";
const HASH_VERSION_KEY: &str = "version";
const HASH_VERSION_VALUE: i32 = 1;
const HASH_KEY: &str = "sha256Hash";

enum APQError {
    PersistedQueryNotSupported,
    PersistedQueryNotFound,
    Other,
}

/// Sends operations by sha256 hash first, falling back to the full query
/// text when the server does not know the hash.
///
/// The first pass strips `query` and carries a `persistedQuery` entry in the
/// request extensions instead. A `PersistedQueryNotFound` answer raises a
/// retry whose replacement request restores the full query next to the
/// hash, which registers it server side for subsequent calls. A server
/// answering `PersistedQueryNotSupported` turns the whole interceptor off,
/// for this chain, for good.
#[derive(Clone, Debug, Default)]
pub struct PersistedQueryInterceptor {
    apq_enabled: Arc<AtomicBool>,
}

impl PersistedQueryInterceptor {
    pub fn new() -> Self {
        Self {
            apq_enabled: Arc::new(AtomicBool::new(true)),
        }
    }
}

#[async_trait]
impl GraphQLInterceptor for PersistedQueryInterceptor {
    async fn intercept(&self, request: Request, next: GraphQLChain) -> ChainResult<ResponseStream> {
        // If APQ is not supported by the server, simply make the graphql
        // call with the same request body.
        if !self.apq_enabled.load(Relaxed) {
            return next.proceed(request).await;
        }
        // A replacement request already carries the persistedQuery extension
        // next to its full query text. Nothing left to do for it here.
        if request
            .operation
            .extensions
            .contains_key(PERSISTED_QUERY_KEY)
        {
            return next.proceed(request).await;
        }
        let Some(query) = request.operation.query.clone() else {
            return next.proceed(request).await;
        };

        // Calculate the query hash and try the request with a persistedQuery
        // extension instead of the whole query.
        let hash_value = calculate_hash_for_query(&query);
        let persisted_query = serde_json_bytes::json!({
            HASH_VERSION_KEY: HASH_VERSION_VALUE,
            HASH_KEY: hash_value,
        });

        let mut full_request = request.clone();
        full_request
            .operation
            .extensions
            .insert(PERSISTED_QUERY_KEY, persisted_query);

        let mut hashed_request = full_request.clone();
        hashed_request.operation.query = None;

        let apq_enabled = self.apq_enabled.clone();
        let stream = next.proceed(hashed_request).await?;
        Ok(stream
            .map(move |item| match item {
                Ok(response) if !response.is_from_cache() => {
                    match get_apq_error(&response.body) {
                        APQError::PersistedQueryNotSupported => {
                            tracing::debug!("apq: not supported by the server, disabling");
                            apq_enabled.store(false, Relaxed);
                            Err(RequestError::retry(request.clone()))
                        }
                        APQError::PersistedQueryNotFound => {
                            tracing::trace!("apq: registering the query for its hash");
                            Err(RequestError::retry(full_request.clone()))
                        }
                        APQError::Other => Ok(response),
                    }
                }
                other => other,
            })
            .boxed())
    }
}

fn calculate_hash_for_query(query: &str) -> String {
    let mut digest = Sha256::new();
    digest.update(query.as_bytes());
    hex::encode(digest.finalize().as_slice())
}

fn get_apq_error(gql_response: &graphql::Response) -> APQError {
    for error in &gql_response.errors {
        // Check if the error message is an APQ error
        match error.message.as_str() {
            PERSISTED_QUERY_NOT_FOUND_MESSAGE => {
                return APQError::PersistedQueryNotFound;
            }
            PERSISTED_QUERY_NOT_SUPPORTED_MESSAGE => {
                return APQError::PersistedQueryNotSupported;
            }
            _ => {}
        }
        // Check if extensions contains the APQ error in "code"
        if let Some(value) = error.extensions.get(CODE_STRING) {
            if value == PERSISTED_QUERY_NOT_FOUND_EXTENSION_CODE {
                return APQError::PersistedQueryNotFound;
            } else if value == PERSISTED_QUERY_NOT_SUPPORTED_EXTENSION_CODE {
                return APQError::PersistedQueryNotSupported;
            }
        }
    }
    APQError::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_queries_the_way_apollo_servers_expect() {
        assert_eq!(
            calculate_hash_for_query("{__typename}"),
            "ecf4edb46db40b5132295c0291d62fb65d6759a9eedfa4d5d612dd5ec54a6b38",
        );
    }

    #[test]
    fn apq_errors_are_detected_from_message_or_code() {
        let by_message = graphql::Response::builder()
            .error(
                graphql::Error::builder()
                    .message(PERSISTED_QUERY_NOT_FOUND_MESSAGE)
                    .build(),
            )
            .build();
        assert!(matches!(
            get_apq_error(&by_message),
            APQError::PersistedQueryNotFound,
        ));

        let by_code = graphql::Response::builder()
            .error(
                graphql::Error::builder()
                    .message("some other message")
                    .extension_code(PERSISTED_QUERY_NOT_SUPPORTED_EXTENSION_CODE)
                    .build(),
            )
            .build();
        assert!(matches!(
            get_apq_error(&by_code),
            APQError::PersistedQueryNotSupported,
        ));

        let unrelated = graphql::Response::builder()
            .error(graphql::Error::builder().message("forbidden").build())
            .build();
        assert!(matches!(get_apq_error(&unrelated), APQError::Other));
    }
}
