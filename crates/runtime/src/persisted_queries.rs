use std::time::Duration;

use crate::kv::{KvResult, KvStore};

const KEY_PREFIX: &str = "apq:";

/// Automatic persisted query storage on top of a shared [`KvStore`]. Every key is namespaced so
/// the store can be shared with other consumers.
#[derive(Clone, Debug)]
pub struct PersistedQueryStore {
    kv: KvStore,
    ttl: Option<Duration>,
}

impl PersistedQueryStore {
    pub fn new(kv: KvStore, ttl: Option<Duration>) -> Self {
        Self { kv, ttl }
    }

    pub async fn get(&self, sha256_hash: &str) -> KvResult<Option<String>> {
        self.kv.get_string(&key(sha256_hash)).await
    }

    pub async fn set(&self, sha256_hash: &str, query: &str) -> KvResult<()> {
        tracing::debug!(sha256_hash, "registering persisted query");
        self.kv.put_string(&key(sha256_hash), query, self.ttl).await
    }
}

fn key(sha256_hash: &str) -> String {
    format!("{KEY_PREFIX}{sha256_hash}")
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::kv::KvStoreInner;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, (Bytes, Option<Duration>)>>);

    #[async_trait::async_trait]
    impl KvStoreInner for MapStore {
        async fn get(&self, name: &str) -> KvResult<Option<Bytes>> {
            Ok(self.0.lock().unwrap().get(name).map(|(bytes, _)| bytes.clone()))
        }

        async fn put(&self, name: &str, bytes: Bytes, expiration_ttl: Option<Duration>) -> KvResult<()> {
            self.0.lock().unwrap().insert(name.to_string(), (bytes, expiration_ttl));
            Ok(())
        }
    }

    #[tokio::test]
    async fn keys_are_namespaced() {
        let kv = KvStore::new(MapStore::default());
        let store = PersistedQueryStore::new(kv.clone(), Some(Duration::from_secs(60)));

        store.set("abc", "{ me }").await.unwrap();

        assert_eq!(store.get("abc").await.unwrap().as_deref(), Some("{ me }"));
        assert_eq!(kv.get_string("apq:abc").await.unwrap().as_deref(), Some("{ me }"));
        assert_eq!(kv.get_string("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let store = PersistedQueryStore::new(KvStore::new(MapStore::default()), None);
        assert_eq!(store.get("unknown").await.unwrap(), None);
    }
}
