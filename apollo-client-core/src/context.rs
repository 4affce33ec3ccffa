//! Provide a [`Context`] for the chain of interceptors.
//!
//! Interceptors accept a [`Context`] when invoked and this contains a DashMap
//! which allows additional data to be passed back and forth along the request
//! chain, including across retries of the same logical call.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json_bytes::Value;

use crate::error::BoxError;

/// Holds [`Context`] entries.
pub(crate) type Entries = Arc<DashMap<String, Value>>;

/// Shared mutable state scoped to one logical GraphQL call.
///
/// Cloning a `Context` is cheap and clones share the same entries, so an
/// interceptor that stashes a value on the way down can read it back on the
/// way up, and a replacement request created for a retry can either share the
/// original entries (clone) or start fresh (`Context::new`).
#[derive(Clone, Debug, Default)]
pub struct Context {
    entries: Entries,
}

impl Context {
    pub fn new() -> Self {
        Context {
            entries: Default::default(),
        }
    }
}

impl Context {
    /// Get a value from the context using the provided key.
    ///
    /// Semantics:
    ///  - If the operation fails, then the key is not present.
    ///  - If the operation succeeds, the value is an [`Option`].
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>, BoxError>
    where
        K: Into<String>,
        V: for<'de> serde::Deserialize<'de>,
    {
        self.entries
            .get(&key.into())
            .map(|v| serde_json_bytes::from_value(v.value().clone()))
            .transpose()
            .map_err(|e| e.into())
    }

    /// Insert a value into the context using the provided key and value.
    ///
    /// Semantics:
    ///  - If the operation fails, then the pair has not been inserted.
    ///  - If the operation succeeds, the result is the old value as an [`Option`].
    pub fn insert<K, V>(&self, key: K, value: V) -> Result<Option<V>, BoxError>
    where
        K: Into<String>,
        V: for<'de> serde::Deserialize<'de> + Serialize,
    {
        match serde_json_bytes::to_value(value) {
            Ok(value) => self
                .entries
                .insert(key.into(), value)
                .map(serde_json_bytes::from_value)
                .transpose()
                .map_err(|e| e.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Upsert a value in the context using the provided key and resolving
    /// function.
    ///
    /// The resolving function must yield a value to be used in the context. It
    /// is provided with the current value to use in evaluating how to resolve.
    pub fn upsert<K, V>(
        &self,
        key: K,
        upsert: impl Fn(V) -> V,
        default: impl Fn() -> V,
    ) -> Result<(), BoxError>
    where
        K: Into<String>,
        V: for<'de> serde::Deserialize<'de> + Serialize,
    {
        let key = key.into();
        self.entries
            .entry(key.clone())
            .or_try_insert_with(|| serde_json_bytes::to_value((default)()))?;
        let mut result = Ok(());
        self.entries
            .alter(&key, |_, v| match serde_json_bytes::from_value(v.clone()) {
                Ok(value) => match serde_json_bytes::to_value((upsert)(value)) {
                    Ok(value) => value,
                    Err(e) => {
                        result = Err(e);
                        v
                    }
                },
                Err(e) => {
                    result = Err(e);
                    v
                }
            });
        result.map_err(|e| e.into())
    }
}
