use std::time::Duration;

pub const DEFAULT_ENDPOINT_URL: &str = "https://usage-reporting.api.apollographql.com";

/// Usage reporting configuration: traces and statistics are batched per schema and sent to a
/// remote ingress.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsageReportingConfig {
    pub enabled: bool,
    /// Credential sent in the `x-api-key` header.
    pub api_key: Option<String>,
    /// Graph reference written in every report header.
    pub graph_ref: Option<String>,
    /// Base URL of the ingress, the traces path is appended.
    pub endpoint_url: String,
    /// How often reports are flushed.
    #[serde(deserialize_with = "duration_str::deserialize_duration")]
    pub report_interval: Duration,
    /// Send one report per request instead of using a background timer. Meant for serverless
    /// environments where timers may never fire.
    pub send_reports_immediately: bool,
    /// A report is sent as soon as its estimated size goes over this many bytes.
    pub max_uncompressed_report_size: usize,
    /// Total attempts to deliver a report, including the first one.
    pub max_attempts: usize,
    /// First backoff delay, doubled after each failed attempt.
    #[serde(deserialize_with = "duration_str::deserialize_duration")]
    pub minimum_retry_delay: Duration,
    #[serde(deserialize_with = "duration_str::deserialize_duration")]
    pub request_timeout: Duration,
    /// Ratio of operations for which field level timings are captured, between 0.0 and 1.0.
    pub field_level_instrumentation: f64,
    /// Keep the traces used to compute statistics in the report.
    pub include_traces_contributing_to_stats: bool,
    /// Report the source of operations which failed to parse, validate or resolve.
    pub send_unexecutable_operation_documents: bool,
    pub send_variable_values: SendVariableValues,
    /// Memory budget of the operation signature cache, in bytes.
    pub signature_cache_size: u64,
    /// Log every report before sending it.
    pub debug_print_reports: bool,
}

impl Default for UsageReportingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            graph_ref: None,
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            report_interval: Duration::from_secs(10),
            send_reports_immediately: false,
            max_uncompressed_report_size: 4 * 1024 * 1024,
            max_attempts: 5,
            minimum_retry_delay: Duration::from_millis(100),
            request_timeout: Duration::from_secs(30),
            field_level_instrumentation: 1.0,
            include_traces_contributing_to_stats: false,
            send_unexecutable_operation_documents: false,
            send_variable_values: SendVariableValues::None,
            signature_cache_size: 3 * 1024 * 1024,
            debug_print_reports: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendVariableValues {
    #[default]
    None,
    All,
}

