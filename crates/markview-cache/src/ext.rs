//! Typed convenience methods for [`MemoryCache`].

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::MemoryCache;

/// Typed access on top of the raw byte store.
///
/// `get_json`/`set_json` cover serde-serializable values and
/// `get_string`/`set_string` cover UTF-8 strings. Deserialization and
/// serialization failures degrade to a cache miss / silent skip so a
/// corrupt entry can never poison a render.
pub trait CacheExt {
    /// Retrieve a JSON-deserialized value.
    ///
    /// Returns `None` on a miss, expiry, or deserialization failure.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T>;

    /// Store a value as JSON. Does nothing if serialization fails.
    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>);

    /// Retrieve a cached UTF-8 string.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Store a string value.
    fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>);
}

impl CacheExt for MemoryCache {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.value(key)?;
        serde_json::from_slice(&bytes).ok()
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.set_value(key, bytes, ttl);
        }
    }

    fn get_string(&self, key: &str) -> Option<String> {
        let bytes = self.value(key)?;
        String::from_utf8(bytes).ok()
    }

    fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.set_value(key, value.as_bytes().to_vec(), ttl);
    }
}
