//! Ready-made interceptors for common request chain concerns.
//!
//! None of these are installed implicitly. A chain only runs what its
//! builder was given, in the order it was given.

mod headers;
mod max_retry;
mod persisted_queries;

pub use headers::HeaderInterceptor;
pub use max_retry::MaxRetryInterceptor;
pub use max_retry::RETRY_COUNT_CONTEXT_KEY;
pub use persisted_queries::PersistedQueryInterceptor;
