//! Store for arbitrary structured values
//!
//! Values are written as pretty-printed JSON inside a `{"value": ...}`
//! envelope. The envelope keeps a stored `null` distinguishable from a
//! missing entry: `fetch` on a `ValueCache<Option<T>>` holding null returns
//! `Some(None)`, an absent entry returns `None`.

use super::context::{CacheContext, CacheKind, Ttl};
use super::entry::CacheEntry;
use super::store::CacheStore;
use crate::error::ShelfResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    value: T,
}

/// Cache entry holding one serde value
#[derive(Debug, Clone)]
pub struct ValueCache<T> {
    entry: CacheEntry,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ValueCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(ctx: &CacheContext, name: &str, ttl: Ttl) -> Self {
        Self {
            entry: ctx.entry(name, CacheKind::Value, ttl),
            _marker: PhantomData,
        }
    }

    /// Read-modify-write the value under one exclusive lock
    ///
    /// `f` sees the current fresh value (or `None`) and returns the value
    /// to store, or `None` to leave the entry untouched.
    pub fn update<R>(&self, f: impl FnOnce(Option<T>) -> (Option<T>, R)) -> ShelfResult<R> {
        let mut encode_error = None;

        let result = self.entry.update(|bytes| {
            let current = bytes.and_then(|b| self.decode(&b));
            let (next, result) = f(current);
            let encoded = next.and_then(|v| match encode(&v) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    encode_error = Some(e);
                    None
                }
            });
            (encoded, result)
        })?;

        match encode_error {
            Some(e) => Err(e.into()),
            None => Ok(result),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Option<T> {
        match serde_json::from_slice::<Envelope<T>>(bytes) {
            Ok(envelope) => Some(envelope.value),
            Err(e) => {
                debug!("Cache entry {} is corrupt: {}", self.entry.name(), e);
                None
            }
        }
    }
}

fn encode<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(&EnvelopeRef { value })
}

impl<T> CacheStore for ValueCache<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    fn fetch(&self) -> Option<T> {
        self.entry.read().and_then(|bytes| self.decode(&bytes))
    }

    fn store(&self, value: T) -> ShelfResult<T> {
        self.entry.write(&encode(&value)?)?;
        Ok(value)
    }
}
