//! Query layer over the data-fetch cache.
//!
//! The cache never initiates network calls; this client is the
//! population path. It consults the cache first and calls the transport
//! on a miss, writing the result back so the fetch shows up as a
//! preload observation.

use anyhow::Result;
use serde_json::Value;

use super::DataFetchCache;

/// Remote data-fetch call: `fetch(uri, {query, variables}) -> result`.
///
/// Implementations live outside this crate (HTTP, node bridge, test
/// stubs); the cache layer only needs this seam.
pub trait Transport: Send + Sync {
    fn fetch(&self, uri: &str, query: &str, variables: &Value) -> Result<Value>;
}

/// Cache-through query client bound to one endpoint.
pub struct DataClient<T> {
    uri: String,
    transport: T,
}

impl<T: Transport> DataClient<T> {
    pub fn new(uri: impl Into<String>, transport: T) -> Self {
        Self {
            uri: uri.into(),
            transport,
        }
    }

    /// Resolve a query against the cache, fetching on a miss.
    pub fn query(
        &self,
        cache: &mut DataFetchCache,
        query: &str,
        variables: &Value,
    ) -> Result<Value> {
        if let Some(hit) = cache.get(query, variables) {
            return Ok(hit.clone());
        }

        let result = self.transport.fetch(&self.uri, query, variables)?;
        cache.set(query, variables, result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        calls: AtomicUsize,
    }

    impl Transport for CountingTransport {
        fn fetch(&self, _uri: &str, _query: &str, variables: &Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"echo": variables}))
        }
    }

    #[test]
    fn test_miss_fetches_and_populates() {
        let client = DataClient::new(
            "https://example.test/graphql",
            CountingTransport {
                calls: AtomicUsize::new(0),
            },
        );
        let mut cache = DataFetchCache::new();

        let result = client.query(&mut cache, "query Q", &json!({"id": 1})).unwrap();
        assert_eq!(result, json!({"echo": {"id": 1}}));
        assert_eq!(cache.len(), 1);
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hit_skips_transport() {
        let client = DataClient::new(
            "https://example.test/graphql",
            CountingTransport {
                calls: AtomicUsize::new(0),
            },
        );
        let mut cache = DataFetchCache::new();

        client.query(&mut cache, "query Q", &json!({"id": 1})).unwrap();
        client.query(&mut cache, "query Q", &json!({"id": 1})).unwrap();

        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 1);
    }
}
