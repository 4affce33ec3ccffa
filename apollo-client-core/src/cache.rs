//! The bridge between the request chain and the external normalized cache.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::Digest;
use sha2::Sha256;

use crate::error::BoxError;
use crate::error::RequestError;
use crate::graphql;
use crate::request::Request;
use crate::response::Response;
use crate::response::Source;

/// The narrow contract the chain holds against the cache system.
///
/// Implementations own storage, normalization and eviction. The chain only
/// ever asks two things of them: answer a lookup, and absorb a server
/// response. Both calls receive the [`CacheKey`] identifying the operation.
#[async_trait]
pub trait NormalizedCache: Send + Sync + 'static {
    /// Look up the response stored for `key`. `Ok(None)` is a miss.
    async fn read(&self, key: &CacheKey) -> Result<Option<graphql::Response>, BoxError>;

    /// Persist a server response under `key`.
    ///
    /// Incremental parts arrive through here too, carrying their `path`, so
    /// a store that merges patches can do so.
    async fn write(&self, key: &CacheKey, response: &graphql::Response) -> Result<(), BoxError>;
}

/// Stable fingerprint of one operation together with its variables.
///
/// Requests that differ only in transport concerns (endpoint, headers,
/// timeouts) share a key, so a response fetched through one configuration
/// can answer another.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_request(request: &Request) -> Self {
        let operation = &request.operation;
        let mut digest = Sha256::new();
        digest.update(operation.operation_name.as_deref().unwrap_or("").as_bytes());
        digest.update([0x00]);
        digest.update(operation.query.as_deref().unwrap_or("").as_bytes());
        digest.update([0x00]);
        digest.update(serde_json::to_vec(&operation.variables).unwrap_or_default());
        CacheKey(hex::encode(digest.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runs the cache legs of an attempt against the configured store.
#[derive(Clone)]
pub(crate) struct CacheBridge {
    store: Arc<dyn NormalizedCache>,
}

impl CacheBridge {
    pub(crate) fn new(store: Arc<dyn NormalizedCache>) -> Self {
        CacheBridge { store }
    }

    /// Look up the response for `request`, tagging a hit with the Cache
    /// origin.
    pub(crate) async fn read(&self, request: &Request) -> Result<Option<Response>, RequestError> {
        let key = CacheKey::from_request(request);
        match self.store.read(&key).await {
            Ok(Some(body)) => {
                tracing::debug!(%key, "cache hit");
                Ok(Some(Response::from_cache(body)))
            }
            Ok(None) => {
                tracing::debug!(%key, "cache miss");
                Ok(None)
            }
            Err(err) => Err(RequestError::CacheRead {
                reason: err.to_string(),
            }),
        }
    }

    /// Offer one emitted response to the store.
    ///
    /// Only server responses carrying data are persisted, and only when the
    /// request opted in. Everything else is a no-op.
    pub(crate) async fn write(
        &self,
        request: &Request,
        response: &Response,
    ) -> Result<(), RequestError> {
        if response.source != Source::Server
            || !request.write_results_to_cache
            || response.body.data.is_none()
        {
            return Ok(());
        }
        let key = CacheKey::from_request(request);
        self.store
            .write(&key, &response.body)
            .await
            .map_err(|err| RequestError::CacheWrite {
                reason: err.to_string(),
            })
    }
}
