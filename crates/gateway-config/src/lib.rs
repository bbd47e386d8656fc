//! Configuration for the GraphQL request engine. Every section uses sensible defaults, so an
//! empty TOML document is a valid configuration.

mod cache_control;
mod document_cache;
mod persisted_queries;
mod usage_reporting;

pub use cache_control::*;
pub use document_cache::*;
pub use persisted_queries::*;
pub use usage_reporting::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Include internal error details in responses.
    pub debug: bool,
    /// Computation of the response cache policy
    pub cache_control: CacheControlConfig,
    /// Cache of parsed and validated documents
    pub document_cache: DocumentCacheConfig,
    /// Automatic persisted queries
    pub persisted_queries: PersistedQueriesConfig,
    /// Traces and statistics reporting
    pub usage_reporting: UsageReportingConfig,
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let reporting = &self.usage_reporting;

        if !(0.0..=1.0).contains(&reporting.field_level_instrumentation) {
            return Err(ConfigError::Invalid(format!(
                "usage_reporting.field_level_instrumentation must be between 0.0 and 1.0, got {}",
                reporting.field_level_instrumentation
            )));
        }

        if let Err(error) = url::Url::parse(&reporting.endpoint_url) {
            return Err(ConfigError::Invalid(format!(
                "usage_reporting.endpoint_url is not a valid URL: {error}"
            )));
        }

        if reporting.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "usage_reporting.max_attempts must be at least 1".to_string(),
            ));
        }

        if reporting.report_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "usage_reporting.report_interval must be greater than zero".to_string(),
            ));
        }

        if reporting.enabled && reporting.api_key.is_none() {
            return Err(ConfigError::Invalid(
                "usage_reporting.api_key is required when usage reporting is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use indoc::indoc;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.cache_control.default_max_age, 0);
        assert!(config.cache_control.calculate_http_headers);
        assert!(config.document_cache.enabled);
        assert_eq!(config.persisted_queries.ttl, Some(Duration::from_secs(300)));
        assert!(!config.usage_reporting.enabled);
        assert_eq!(config.usage_reporting.report_interval, Duration::from_secs(10));
        assert_eq!(config.usage_reporting.max_attempts, 5);
    }

    #[test]
    fn usage_reporting_durations() {
        let input = indoc! {r#"
            [usage_reporting]
            enabled = true
            api_key = "service:my-graph:secret"
            graph_ref = "my-graph@current"
            report_interval = "20s"
            minimum_retry_delay = "250ms"
            send_variable_values = "all"
        "#};

        let config = Config::from_toml_str(input).unwrap();
        let reporting = config.usage_reporting;

        assert_eq!(reporting.report_interval, Duration::from_secs(20));
        assert_eq!(reporting.minimum_retry_delay, Duration::from_millis(250));
        assert_eq!(reporting.send_variable_values, SendVariableValues::All);
        assert_eq!(reporting.graph_ref.as_deref(), Some("my-graph@current"));
        assert_eq!(reporting.endpoint_url, DEFAULT_ENDPOINT_URL);
    }

    #[test]
    fn cache_control_section() {
        let input = indoc! {r#"
            [cache_control]
            default_max_age = 10
            calculate_http_headers = false
        "#};

        let config = Config::from_toml_str(input).unwrap();

        assert_eq!(
            config.cache_control,
            CacheControlConfig {
                default_max_age: 10,
                calculate_http_headers: false,
            }
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let input = indoc! {r#"
            [document_cache]
            size = 10
        "#};

        let error = Config::from_toml_str(input).unwrap_err();
        assert!(error.to_string().contains("unknown field `size`"), "{error}");
    }

    #[test]
    fn enabled_reporting_requires_api_key() {
        let input = indoc! {r#"
            [usage_reporting]
            enabled = true
        "#};

        let error = Config::from_toml_str(input).unwrap_err();
        insta::assert_snapshot!(error, @"invalid configuration: usage_reporting.api_key is required when usage reporting is enabled");
    }

    #[test]
    fn sampling_ratio_is_bounded() {
        let input = indoc! {r#"
            [usage_reporting]
            field_level_instrumentation = 1.5
        "#};

        assert!(Config::from_toml_str(input).is_err());
    }
}
