use runtime::document_cache::{CacheResult, DocumentCache};

/// Size-bounded document cache. Entries are weighted by a caller-provided estimate, usually the
/// length of the query text, and the least recently used ones are evicted first.
pub struct InMemoryDocumentCache<V> {
    inner: mini_moka::sync::Cache<String, V>,
}

impl<V> InMemoryDocumentCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_size: u64, weigh: impl Fn(&V) -> u32 + Send + Sync + 'static) -> Self {
        InMemoryDocumentCache {
            inner: mini_moka::sync::Cache::builder()
                .max_capacity(max_size)
                .weigher(move |key: &String, value: &V| {
                    weigh(value).saturating_add(u32::try_from(key.len()).unwrap_or(u32::MAX))
                })
                .build(),
        }
    }
}

#[async_trait::async_trait]
impl<V> DocumentCache<V> for InMemoryDocumentCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> CacheResult<Option<V>> {
        Ok(self.inner.get(&key.to_string()))
    }

    async fn insert(&self, key: String, value: V) -> CacheResult<()> {
        self.inner.insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_returns_documents() {
        let cache = InMemoryDocumentCache::new(1024, |value: &String| value.len() as u32);

        cache.insert("hash".to_string(), "{ me }".to_string()).await.unwrap();

        assert_eq!(cache.get("hash").await.unwrap().as_deref(), Some("{ me }"));
        assert_eq!(cache.get("other").await.unwrap(), None);
    }
}
