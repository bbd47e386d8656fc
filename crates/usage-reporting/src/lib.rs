//! Usage reporting of GraphQL operations.
//!
//! [`UsageReportingPlugin`] records a trace of every request it includes, sampled at the field
//! level, and hands it to a [`ReportBatcher`]. Traces are grouped by executable schema and by
//! operation signature, folded into statistics when they are not sent as traces, and delivered
//! as gzipped protobuf reports on an interval, once a report grows too large or when the server
//! stops.

mod batcher;
mod histogram;
mod plugin;
pub mod proto;
mod report;
mod schema_id;
mod sender;
mod signature;
mod stats;
mod trace_tree;

pub use batcher::{BatcherOptions, ReportBatcher, ReportErrorHandler};
pub use plugin::{IncludeRequest, RewriteError, UsageReportingError, UsageReportingPlugin, UsageReportingPluginBuilder};
pub use report::{stats_report_key, PARSE_FAILURE_KEY, UNKNOWN_OPERATION_NAME_KEY, VALIDATION_FAILURE_KEY};
pub use sender::{Delivery, ReportSender, SendReportError};
pub use signature::SignatureCache;

/// Sent as the user agent and in every report header.
pub const AGENT_VERSION: &str = concat!("usage-reporting ", env!("CARGO_PKG_VERSION"));
