#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentCacheConfig {
    /// If parsed and validated documents should be cached.
    pub enabled: bool,
    /// Approximate memory budget of the cache, in bytes. Documents are weighted by the size of
    /// their source text. 30 MiB by default.
    pub max_size: u64,
}

impl Default for DocumentCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 30 * 1024 * 1024,
        }
    }
}
