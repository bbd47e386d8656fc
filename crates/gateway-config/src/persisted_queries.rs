use std::time::Duration;

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistedQueriesConfig {
    /// If automatic persisted queries are accepted.
    pub enabled: bool,
    /// How long a registered query is kept. No expiration when unset.
    #[serde(deserialize_with = "duration_str::deserialize_option_duration")]
    pub ttl: Option<Duration>,
    /// Memory budget of the in-memory query store, in bytes.
    pub max_size: u64,
}

impl Default for PersistedQueriesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Some(Duration::from_secs(300)),
            max_size: 30 * 1024 * 1024,
        }
    }
}
