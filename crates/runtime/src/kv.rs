use std::{sync::Arc, time::Duration};

use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Kv error: {0}")]
    Kv(String),
}

pub type KvResult<T> = Result<T, KvError>;

/// Shared handle on a key-value store. Cheap to clone.
#[derive(Clone)]
pub struct KvStore(Arc<dyn KvStoreInner>);

impl KvStore {
    pub fn new(inner: impl KvStoreInner + 'static) -> Self {
        Self(Arc::new(inner))
    }

    pub async fn get_string(&self, name: &str) -> KvResult<Option<String>> {
        let bytes = self.get(name).await?;

        bytes
            .map(|bytes| String::from_utf8(bytes.to_vec()).map_err(|err| KvError::Kv(err.to_string())))
            .transpose()
    }

    pub async fn put_string(&self, name: &str, value: &str, expiration_ttl: Option<Duration>) -> KvResult<()> {
        self.put(name, Bytes::copy_from_slice(value.as_bytes()), expiration_ttl)
            .await
    }
}

impl std::ops::Deref for KvStore {
    type Target = dyn KvStoreInner;
    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
pub trait KvStoreInner: Send + Sync {
    async fn get(&self, name: &str) -> KvResult<Option<Bytes>>;
    async fn put(&self, name: &str, bytes: Bytes, expiration_ttl: Option<Duration>) -> KvResult<()>;
}
