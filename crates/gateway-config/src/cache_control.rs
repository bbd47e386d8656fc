#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheControlConfig {
    /// maxAge in seconds applied to root fields and composite fields without an explicit hint.
    pub default_max_age: u32,
    /// Whether a `Cache-Control` header is computed for cacheable responses.
    pub calculate_http_headers: bool,
}

impl Default for CacheControlConfig {
    fn default() -> Self {
        Self {
            default_max_age: 0,
            calculate_http_headers: true,
        }
    }
}
