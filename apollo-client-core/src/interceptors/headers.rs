//! Header manipulation for the raw HTTP leg.

use async_trait::async_trait;
use http::header::HeaderName;
use http::HeaderValue;

use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::interceptor::ChainResult;
use crate::interceptor::HttpChain;
use crate::interceptor::HttpInterceptor;

/// One header rewrite applied to every outgoing HTTP request.
#[derive(Clone, Debug)]
enum HeaderOperation {
    /// Set a fixed header, replacing an existing value of the same name.
    Insert { name: HeaderName, value: HeaderValue },

    /// Set a header from a request context entry, skipped when the entry is
    /// absent or does not convert to a header value.
    InsertFromContext { name: HeaderName, from_context: String },

    /// Remove a header by name.
    Remove { name: HeaderName },
}

/// Applies a fixed list of header operations, in order, to the raw request
/// of every attempt.
///
/// Dynamic values travel through the request [`Context`]: an authentication
/// interceptor higher up the chain can deposit a token there and have this
/// one turn it into a header on the HTTP leg.
///
/// [`Context`]: crate::Context
#[derive(Clone, Debug, Default)]
pub struct HeaderInterceptor {
    operations: Vec<HeaderOperation>,
}

impl HeaderInterceptor {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    pub fn insert(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.operations.push(HeaderOperation::Insert { name, value });
        self
    }

    pub fn insert_from_context(
        mut self,
        name: HeaderName,
        from_context: impl Into<String>,
    ) -> Self {
        self.operations.push(HeaderOperation::InsertFromContext {
            name,
            from_context: from_context.into(),
        });
        self
    }

    pub fn remove(mut self, name: HeaderName) -> Self {
        self.operations.push(HeaderOperation::Remove { name });
        self
    }

    fn modify_request(&self, request: &mut HttpRequest) {
        for operation in &self.operations {
            match operation {
                HeaderOperation::Insert { name, value } => {
                    request.http_request.headers_mut().insert(name, value.clone());
                }
                HeaderOperation::InsertFromContext { name, from_context } => {
                    if let Some(val) = request
                        .context
                        .get::<_, String>(from_context.as_str())
                        .ok()
                        .flatten()
                    {
                        match HeaderValue::from_str(&val) {
                            Ok(header_value) => {
                                request.http_request.headers_mut().insert(name, header_value);
                            }
                            Err(err) => {
                                tracing::error!(
                                    "cannot convert from the context into a header value for header name '{}': {:?}",
                                    name,
                                    err,
                                );
                            }
                        }
                    }
                }
                HeaderOperation::Remove { name } => {
                    request.http_request.headers_mut().remove(name);
                }
            }
        }
    }
}

#[async_trait]
impl HttpInterceptor for HeaderInterceptor {
    async fn intercept(&self, mut request: HttpRequest, next: HttpChain) -> ChainResult<HttpResponse> {
        self.modify_request(&mut request);
        next.proceed(request).await
    }
}
