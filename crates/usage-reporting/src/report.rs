use std::{collections::HashMap, time::SystemTime};

use prost::Message;

use crate::{
    proto::{self, ReportHeader},
    stats::OperationStats,
};

/// Keys of requests which never reached execution.
pub const PARSE_FAILURE_KEY: &str = "## GraphQLParseFailure\n";
pub const VALIDATION_FAILURE_KEY: &str = "## GraphQLValidationFailure\n";
pub const UNKNOWN_OPERATION_NAME_KEY: &str = "## GraphQLUnknownOperationName\n";

pub fn stats_report_key(operation_name: Option<&str>, signature: &str) -> String {
    format!("# {}\n{signature}", operation_name.unwrap_or("-"))
}

/// Baseline of the size estimate, whatever the content of the report.
const EMPTY_REPORT_SIZE: usize = 0;

#[derive(Debug, Default)]
struct TracesAndStats {
    traces: Vec<proto::Trace>,
    stats: OperationStats,
}

/// Traces and statistics accumulated for a single executable schema.
#[derive(Debug)]
pub struct Report {
    header: ReportHeader,
    traces_pre_aggregated: bool,
    traces_per_query: HashMap<String, TracesAndStats>,
    operation_count: u64,
    size_estimate: usize,
}

impl Report {
    /// When `traces_pre_aggregated` is set, every trace sent as a trace is also folded into
    /// the statistics of the report.
    pub fn new(header: ReportHeader, traces_pre_aggregated: bool) -> Self {
        Report {
            header,
            traces_pre_aggregated,
            traces_per_query: HashMap::new(),
            operation_count: 0,
            size_estimate: EMPTY_REPORT_SIZE,
        }
    }

    pub fn add_trace(&mut self, stats_report_key: &str, trace: proto::Trace, as_trace: bool) {
        if !self.traces_per_query.contains_key(stats_report_key) {
            self.size_estimate += 2 + stats_report_key.len();
        }
        let entry = self
            .traces_per_query
            .entry(stats_report_key.to_string())
            .or_default();

        if !as_trace || self.traces_pre_aggregated {
            self.size_estimate += entry.stats.add_trace(&trace);
        }

        if as_trace {
            self.size_estimate += 2 + trace.encoded_len();
            entry.traces.push(trace);
        }

        self.operation_count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.operation_count == 0
    }

    pub fn operation_count(&self) -> u64 {
        self.operation_count
    }

    pub fn size_estimate(&self) -> usize {
        self.size_estimate
    }

    /// A fresh report with the same header, to accumulate while this one is sent.
    pub fn renewed(&self) -> Report {
        Report::new(self.header.clone(), self.traces_pre_aggregated)
    }

    pub fn into_proto(self) -> proto::Report {
        let traces_per_query = self
            .traces_per_query
            .into_iter()
            .map(|(key, entry)| {
                let value = proto::TracesAndStats {
                    trace: entry.traces,
                    stats_with_context: entry.stats.into_proto(),
                };
                (key, value)
            })
            .collect();

        proto::Report {
            header: Some(self.header),
            end_time: Some(SystemTime::now().into()),
            traces_per_query,
            operation_count: self.operation_count,
            traces_pre_aggregated: self.traces_pre_aggregated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> ReportHeader {
        ReportHeader {
            executable_schema_id: "schema".into(),
            ..Default::default()
        }
    }

    #[test]
    fn keys() {
        assert_eq!(stats_report_key(Some("GetUser"), "query GetUser{me}"), "# GetUser\nquery GetUser{me}");
        assert_eq!(stats_report_key(None, "{me}"), "# -\n{me}");
    }

    #[test]
    fn size_estimate() {
        let mut report = Report::new(header(), false);
        assert!(report.is_empty());

        let trace = proto::Trace {
            duration_ns: 1_000,
            ..Default::default()
        };
        let encoded_len = trace.encoded_len();

        report.add_trace("# -\n{a}", trace.clone(), true);
        assert_eq!(report.size_estimate(), 2 + 7 + 2 + encoded_len);

        report.add_trace("# -\n{a}", trace, true);
        assert_eq!(report.size_estimate(), 2 + 7 + 2 * (2 + encoded_len));
        assert_eq!(report.operation_count(), 2);

        let renewed = report.renewed();
        assert!(renewed.is_empty());
        assert_eq!(renewed.size_estimate(), EMPTY_REPORT_SIZE);
    }

    #[test]
    fn statistics_only() {
        let mut report = Report::new(header(), false);
        report.add_trace("# -\n{a}", proto::Trace::default(), false);

        let report = report.into_proto();
        let entry = &report.traces_per_query["# -\n{a}"];
        assert!(entry.trace.is_empty());
        assert_eq!(entry.stats_with_context.len(), 1);
        assert_eq!(report.operation_count, 1);
    }

    #[test]
    fn pre_aggregated_traces_are_in_both() {
        let mut report = Report::new(header(), true);
        report.add_trace("# -\n{a}", proto::Trace::default(), true);

        let report = report.into_proto();
        let entry = &report.traces_per_query["# -\n{a}"];
        assert_eq!(entry.trace.len(), 1);
        assert_eq!(entry.stats_with_context.len(), 1);
        assert!(report.traces_pre_aggregated);
    }
}
