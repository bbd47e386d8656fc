//! Cache of parsed and validated documents, keyed by the hash of the query text.
//!
//! Implementations own their eviction policy. A failing cache must never fail a request: callers
//! log the error and fall back to parsing and validating again.

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait::async_trait]
pub trait DocumentCache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> CacheResult<Option<V>>;

    async fn insert(&self, key: String, value: V) -> CacheResult<()>;
}
