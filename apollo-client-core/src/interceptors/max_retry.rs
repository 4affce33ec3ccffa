//! Caps how many retries a single call may consume.

use async_trait::async_trait;
use futures::StreamExt;

use crate::context::Context;
use crate::error::RequestError;
use crate::interceptor::ChainResult;
use crate::interceptor::GraphQLChain;
use crate::interceptor::GraphQLInterceptor;
use crate::request::Request;
use crate::response::ResponseStream;

/// Context key under which the number of consumed retries is recorded.
pub const RETRY_COUNT_CONTEXT_KEY: &str = "apollo::request_chain::retry_count";

/// Converts retry demands beyond a configured budget into
/// [`RequestError::MaxRetriesExceeded`].
///
/// Install it as the outermost GraphQL-level interceptor so that it observes
/// the retry demands of everything below it. The count lives on the request
/// [`Context`], which replacement requests share, so it spans all attempts of
/// one call without bleeding into concurrent calls.
#[derive(Clone, Debug)]
pub struct MaxRetryInterceptor {
    max_retries: u32,
}

impl MaxRetryInterceptor {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

#[async_trait]
impl GraphQLInterceptor for MaxRetryInterceptor {
    async fn intercept(&self, request: Request, next: GraphQLChain) -> ChainResult<ResponseStream> {
        let context = request.context.clone();
        let max_retries = self.max_retries;
        let stream = match next.proceed(request).await {
            Ok(stream) => stream,
            Err(err) => return Err(escalate(&context, max_retries, err)),
        };
        Ok(stream
            .map(move |item| item.map_err(|err| escalate(&context, max_retries, err)))
            .boxed())
    }
}

/// Count a retry demand against the budget, turning it terminal once spent.
/// Everything that is not a retry passes through untouched.
fn escalate(context: &Context, max_retries: u32, error: RequestError) -> RequestError {
    if !error.is_retry() {
        return error;
    }
    let used: u32 = context
        .get(RETRY_COUNT_CONTEXT_KEY)
        .ok()
        .flatten()
        .unwrap_or(0)
        + 1;
    if used > max_retries {
        tracing::info!(retries = used, "retry budget exhausted");
        return RequestError::MaxRetriesExceeded { attempts: used };
    }
    if let Err(err) = context.insert(RETRY_COUNT_CONTEXT_KEY, used) {
        tracing::warn!(error = %err, "failed to record the retry count");
    }
    error
}
