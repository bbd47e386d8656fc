use std::time::{Duration, Instant};

use bytes::Bytes;
use runtime::kv::{KvResult, KvStoreInner};

#[derive(Clone)]
struct Entry {
    bytes: Bytes,
    expires_at: Option<Instant>,
}

/// In-memory key-value store, bounded by the total size of the stored values. Expiration is
/// checked lazily on reads.
pub struct InMemoryKvStore {
    inner: mini_moka::sync::Cache<String, Entry>,
}

impl InMemoryKvStore {
    pub fn new(max_size: u64) -> Self {
        InMemoryKvStore {
            inner: mini_moka::sync::Cache::builder()
                .max_capacity(max_size)
                .weigher(|key: &String, entry: &Entry| {
                    u32::try_from(key.len() + entry.bytes.len()).unwrap_or(u32::MAX)
                })
                .build(),
        }
    }
}

#[async_trait::async_trait]
impl KvStoreInner for InMemoryKvStore {
    async fn get(&self, name: &str) -> KvResult<Option<Bytes>> {
        let key = name.to_string();

        let Some(entry) = self.inner.get(&key) else {
            return Ok(None);
        };

        if entry.expires_at.is_some_and(|expires_at| expires_at <= Instant::now()) {
            self.inner.invalidate(&key);
            return Ok(None);
        }

        Ok(Some(entry.bytes))
    }

    async fn put(&self, name: &str, bytes: Bytes, expiration_ttl: Option<Duration>) -> KvResult<()> {
        let expires_at = expiration_ttl.map(|ttl| Instant::now() + ttl);
        self.inner.insert(name.to_string(), Entry { bytes, expires_at });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use runtime::kv::KvStore;

    use super::*;

    #[tokio::test]
    async fn round_trips_values() {
        let store = KvStore::new(InMemoryKvStore::new(1024));

        store.put_string("apq:abc", "{ me }", None).await.unwrap();

        assert_eq!(store.get_string("apq:abc").await.unwrap().as_deref(), Some("{ me }"));
    }

    #[tokio::test]
    async fn expired_values_are_misses() {
        let store = KvStore::new(InMemoryKvStore::new(1024));

        store
            .put_string("apq:abc", "{ me }", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.get_string("apq:abc").await.unwrap(), None);
    }
}
