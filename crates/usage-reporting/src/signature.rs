use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use quick_cache::{sync::Cache, DefaultHashBuilder, Lifecycle, Weighter};

const EVICTION_WARNING_INTERVAL: Duration = Duration::from_secs(60);

/// Memoized operation signatures, keyed by `<query hash>` or `<query hash>:<operation name>`
/// and bounded by the total size of keys and signatures.
pub struct SignatureCache {
    cache: Cache<String, Arc<str>, SignatureWeighter, DefaultHashBuilder, EvictionWarning>,
    lifecycle: EvictionWarning,
}

impl SignatureCache {
    pub fn new(max_size: u64) -> Self {
        let lifecycle = EvictionWarning::default();
        let estimated_items = usize::try_from(max_size / 512).unwrap_or(usize::MAX).max(16);

        SignatureCache {
            cache: Cache::with(
                estimated_items,
                max_size,
                SignatureWeighter,
                DefaultHashBuilder::default(),
                lifecycle.clone(),
            ),
            lifecycle,
        }
    }

    pub fn key(query_hash: &str, operation_name: Option<&str>) -> String {
        match operation_name {
            Some(name) => format!("{query_hash}:{name}"),
            None => query_hash.to_string(),
        }
    }

    pub fn get_or_compute(
        &self,
        query_hash: &str,
        operation_name: Option<&str>,
        source: &str,
    ) -> anyhow::Result<Arc<str>> {
        let key = Self::key(query_hash, operation_name);

        if let Some(signature) = self.cache.get(key.as_str()) {
            return Ok(signature);
        }

        let signature: Arc<str> = operation_normalizer::signature(source, operation_name)?.into();
        self.cache.insert(key, signature.clone());

        Ok(signature)
    }

    pub fn evictions(&self) -> u64 {
        self.lifecycle.evictions.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct SignatureWeighter;

impl Weighter<String, Arc<str>> for SignatureWeighter {
    fn weight(&self, key: &String, signature: &Arc<str>) -> u64 {
        (key.len() + signature.len()) as u64
    }
}

/// Warns about evictions at most once per minute, an undersized cache evicts continuously.
#[derive(Clone, Default)]
struct EvictionWarning {
    evictions: Arc<AtomicU64>,
    last_warning: Arc<Mutex<Option<Instant>>>,
}

impl Lifecycle<String, Arc<str>> for EvictionWarning {
    type RequestState = ();

    fn begin_request(&self) -> Self::RequestState {}

    fn on_evict(&self, _state: &mut Self::RequestState, _key: String, _signature: Arc<str>) {
        self.evictions.fetch_add(1, Ordering::Relaxed);

        let mut last_warning = self.last_warning.lock().unwrap_or_else(PoisonError::into_inner);
        if last_warning.is_some_and(|at| at.elapsed() < EVICTION_WARNING_INTERVAL) {
            return;
        }

        *last_warning = Some(Instant::now());
        tracing::warn!(
            "the operation signature cache is evicting entries, consider increasing usage_reporting.signature_cache_size"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_includes_the_operation_name() {
        assert_eq!(SignatureCache::key("abc", None), "abc");
        assert_eq!(SignatureCache::key("abc", Some("Op")), "abc:Op");
    }

    #[test]
    fn memoized_signature() {
        let cache = SignatureCache::new(1024 * 1024);
        let source = "query Op { b a(x: 1) }";

        let first = cache.get_or_compute("hash", Some("Op"), source).unwrap();
        // A different source under the same key is never read.
        let second = cache.get_or_compute("hash", Some("Op"), "{ other }").unwrap();

        assert_eq!(first, second);
        insta::assert_snapshot!(first, @"query Op{a(x:0)b}");
    }

    #[test]
    fn invalid_operation_is_an_error() {
        let cache = SignatureCache::new(1024);
        assert!(cache.get_or_compute("hash", Some("Missing"), "query Op { a }").is_err());
    }

    #[test]
    fn undersized_cache_evicts() {
        let cache = SignatureCache::new(64);

        for i in 0..32 {
            let source = format!("query Op{i} {{ field{i} }}");
            let name = format!("Op{i}");
            cache.get_or_compute(&format!("hash{i}"), Some(&name), &source).unwrap();
        }

        assert!(cache.evictions() > 0);
    }
}
