//! Request chain errors.
use std::time::Duration;

use displaydoc::Display;
use thiserror::Error;

use crate::request::Request;

/// Boxed error type for interceptor and cache implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A demand to abandon the in-flight attempt and run a replacement request
/// through the whole chain again.
///
/// Interceptors raise this as [`RequestError::Retry`], either as the return
/// value of their `intercept` call or as an element of the response stream.
/// The chain consumes the signal internally. It restarts from the outermost
/// interceptor with the replacement request and the signal is never visible
/// to the caller of the chain.
#[derive(Clone, Debug)]
pub struct RetrySignal {
    /// The request the next attempt will run with.
    pub request: Request,
}

/// Error types for the request chain.
///
/// Note that these relate to driving the chain itself and not to GraphQL
/// errors, which travel inside [`crate::graphql::Response`] bodies.
#[derive(Error, Display, Debug, Clone)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum RequestError {
    /// request chain restart requested with a replacement request
    ///
    /// This variant is control flow. The chain consumes it internally and it
    /// never terminates a stream handed to the caller.
    Retry(Box<RetrySignal>),

    /// HTTP fetch failed: {reason}
    ///
    /// note that this relates to a transport error and not a GraphQL error
    Transport {
        /// The response status, when the failure happened after headers.
        status: Option<u16>,

        /// The reason the fetch failed.
        reason: String,
    },

    /// network fetch did not complete within {after:?}
    Timeout { after: Duration },

    /// cache read failed: {reason}
    CacheRead {
        /// The reason the lookup failed.
        reason: String,
    },

    /// cache write failed: {reason}
    CacheWrite {
        /// The reason the persistence failed.
        reason: String,
    },

    /// request was malformed: {reason}
    MalformedRequest {
        /// The reason the serialization failed.
        reason: String,
    },

    /// response was malformed: {reason}
    MalformedResponse {
        /// The reason the deserialization failed.
        reason: String,
    },

    /// request chain completed without emitting a response
    NoResults,

    /// maximum retries exceeded after {attempts} attempts
    MaxRetriesExceeded { attempts: u32 },

    /// interceptor failed: {reason}
    Interceptor {
        /// The reason the interceptor failed.
        reason: String,
    },
}

impl RequestError {
    /// Raise a retry carrying `request` as the replacement for the next
    /// attempt.
    pub fn retry(request: Request) -> Self {
        RequestError::Retry(Box::new(RetrySignal { request }))
    }

    /// Wrap an arbitrary interceptor failure.
    pub fn interceptor(reason: impl std::fmt::Display) -> Self {
        RequestError::Interceptor {
            reason: reason.to_string(),
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, RequestError::Retry(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    #[test]
    fn retry_constructor_boxes_the_replacement_request() {
        let replacement = Request::fake_builder().query("{ me { id } }").build();
        let err = RequestError::retry(replacement);
        assert!(err.is_retry());
        match err {
            RequestError::Retry(signal) => {
                assert_eq!(signal.request.operation.query.as_deref(), Some("{ me { id } }"));
            }
            other => panic!("expected a retry signal, got {other}"),
        }
    }

    #[test]
    fn display_messages_stay_operator_readable() {
        let err = RequestError::Transport {
            status: Some(503),
            reason: "connection reset by peer".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP fetch failed: connection reset by peer");
        assert_eq!(
            RequestError::NoResults.to_string(),
            "request chain completed without emitting a response",
        );
    }
}
