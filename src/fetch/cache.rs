//! Query/variable-keyed result cache with clone isolation.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::render::Preload;

/// Cache key: query text plus a canonical serialization of the
/// variables. Canonicalization sorts object keys recursively, so
/// `{"a":1,"b":2}` and `{"b":2,"a":1}` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    query: String,
    variables: String,
}

impl FetchKey {
    pub fn new(query: &str, variables: &Value) -> Self {
        Self {
            query: query.to_string(),
            variables: canonical(variables),
        }
    }

    /// Stable short digest addressing this fetch as a preloadable URL.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.query.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.variables.as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..8])
    }
}

/// Serialize with recursively sorted object keys.
fn canonical(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by_key(|(k, _)| k.as_str());
                // serde_json preserves insertion order, so inserting in
                // sorted order yields a canonical serialization.
                let mut sorted = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    sorted.insert(k.clone(), sort(v));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Memoized data-fetch results for one render scope.
///
/// `Clone` is a full copy: writes to a clone are never visible to the
/// parent or to sibling clones. The dev server clones its base cache
/// once per request, so concurrent renders cannot observe each other's
/// in-flight results.
#[derive(Debug, Clone, Default)]
pub struct DataFetchCache {
    entries: FxHashMap<FetchKey, Value>,
    /// Keys in first-`set` order; drives preload emission.
    observed: Vec<FetchKey>,
}

impl DataFetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached result. Absence is a miss, never an error.
    pub fn get(&self, query: &str, variables: &Value) -> Option<&Value> {
        self.entries.get(&FetchKey::new(query, variables))
    }

    /// Store a result unconditionally, last write wins.
    ///
    /// A repeated key keeps its original preload position.
    pub fn set(&mut self, query: &str, variables: &Value, result: Value) {
        let key = FetchKey::new(query, variables);
        if !self.entries.contains_key(&key) {
            self.observed.push(key.clone());
        }
        self.entries.insert(key, result);
    }

    /// Drop every entry. Used once per full build for a clean baseline.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.observed.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Preload descriptors for every key populated since this cache (or
    /// the cache it was cloned from) was created, in first-set order.
    pub fn preloads(&self) -> Vec<Preload> {
        self.observed
            .iter()
            .map(|key| Preload {
                href: format!("/__skein/data/{}.json", key.digest()),
                kind: "fetch",
                crossorigin: true,
            })
            .collect()
    }
}
