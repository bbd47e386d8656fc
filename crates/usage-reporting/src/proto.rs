//! Wire messages of the usage reporting ingress, protobuf encoded with prost. Only the fields
//! this crate writes are declared, tags match the ingress schema.

use std::collections::HashMap;

use prost_types::Timestamp;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Report {
    #[prost(message, optional, tag = "1")]
    pub header: Option<ReportHeader>,
    #[prost(message, optional, tag = "2")]
    pub end_time: Option<Timestamp>,
    #[prost(map = "string, message", tag = "5")]
    pub traces_per_query: HashMap<String, TracesAndStats>,
    #[prost(uint64, tag = "6")]
    pub operation_count: u64,
    /// Traces of this report were already folded into its statistics.
    #[prost(bool, tag = "7")]
    pub traces_pre_aggregated: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReportHeader {
    #[prost(string, tag = "5")]
    pub hostname: String,
    #[prost(string, tag = "6")]
    pub agent_version: String,
    #[prost(string, tag = "7")]
    pub service_version: String,
    #[prost(string, tag = "8")]
    pub runtime_version: String,
    #[prost(string, tag = "9")]
    pub uname: String,
    #[prost(string, tag = "11")]
    pub executable_schema_id: String,
    #[prost(string, tag = "12")]
    pub graph_ref: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TracesAndStats {
    #[prost(message, repeated, tag = "1")]
    pub trace: Vec<Trace>,
    #[prost(message, repeated, tag = "2")]
    pub stats_with_context: Vec<ContextualizedStats>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Trace {
    #[prost(message, optional, tag = "3")]
    pub end_time: Option<Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub start_time: Option<Timestamp>,
    #[prost(message, optional, tag = "6")]
    pub details: Option<trace::Details>,
    #[prost(string, tag = "7")]
    pub client_name: String,
    #[prost(string, tag = "8")]
    pub client_version: String,
    #[prost(message, optional, tag = "10")]
    pub http: Option<trace::Http>,
    #[prost(uint64, tag = "11")]
    pub duration_ns: u64,
    #[prost(message, optional, tag = "14")]
    pub root: Option<trace::Node>,
    #[prost(message, optional, tag = "18")]
    pub cache_policy: Option<trace::CachePolicy>,
    #[prost(bool, tag = "20")]
    pub full_query_cache_hit: bool,
    #[prost(bool, tag = "21")]
    pub persisted_query_hit: bool,
    #[prost(bool, tag = "22")]
    pub persisted_query_register: bool,
    #[prost(bool, tag = "24")]
    pub registered_operation: bool,
    #[prost(bool, tag = "25")]
    pub forbidden_operation: bool,
    #[prost(string, tag = "27")]
    pub unexecuted_operation_body: String,
    #[prost(string, tag = "28")]
    pub unexecuted_operation_name: String,
    #[prost(double, tag = "31")]
    pub field_execution_weight: f64,
}

pub mod trace {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct CachePolicy {
        #[prost(enumeration = "cache_policy::Scope", tag = "1")]
        pub scope: i32,
        #[prost(int64, tag = "2")]
        pub max_age_ns: i64,
    }

    pub mod cache_policy {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
        #[repr(i32)]
        pub enum Scope {
            Unknown = 0,
            Public = 1,
            Private = 2,
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Details {
        #[prost(string, tag = "3")]
        pub operation_name: String,
        /// Variable values, each one JSON encoded.
        #[prost(map = "string, string", tag = "4")]
        pub variables_json: HashMap<String, String>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Error {
        #[prost(string, tag = "1")]
        pub message: String,
        #[prost(message, repeated, tag = "2")]
        pub location: Vec<Location>,
        #[prost(uint64, tag = "3")]
        pub time_ns: u64,
        #[prost(string, tag = "4")]
        pub json: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Location {
        #[prost(uint32, tag = "1")]
        pub line: u32,
        #[prost(uint32, tag = "2")]
        pub column: u32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Node {
        #[prost(oneof = "node::Id", tags = "1, 2")]
        pub id: Option<node::Id>,
        #[prost(string, tag = "3")]
        pub r#type: String,
        #[prost(uint64, tag = "8")]
        pub start_time: u64,
        #[prost(uint64, tag = "9")]
        pub end_time: u64,
        #[prost(message, repeated, tag = "11")]
        pub error: Vec<Error>,
        #[prost(message, repeated, tag = "12")]
        pub child: Vec<Node>,
        #[prost(string, tag = "13")]
        pub parent_type: String,
        /// Set when the response name is an alias.
        #[prost(string, tag = "14")]
        pub original_field_name: String,
    }

    pub mod node {
        #[derive(Clone, PartialEq, Eq, Hash, prost::Oneof)]
        pub enum Id {
            #[prost(string, tag = "1")]
            ResponseName(String),
            #[prost(uint32, tag = "2")]
            Index(u32),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Http {
        #[prost(enumeration = "http::Method", tag = "1")]
        pub method: i32,
    }

    pub mod http {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
        #[repr(i32)]
        pub enum Method {
            Unknown = 0,
            Options = 1,
            Get = 2,
            Head = 3,
            Post = 4,
            Put = 5,
            Delete = 6,
            Trace = 7,
            Connect = 8,
            Patch = 9,
        }

        impl From<&::http::Method> for Method {
            fn from(method: &::http::Method) -> Self {
                match *method {
                    ::http::Method::OPTIONS => Method::Options,
                    ::http::Method::GET => Method::Get,
                    ::http::Method::HEAD => Method::Head,
                    ::http::Method::POST => Method::Post,
                    ::http::Method::PUT => Method::Put,
                    ::http::Method::DELETE => Method::Delete,
                    ::http::Method::TRACE => Method::Trace,
                    ::http::Method::CONNECT => Method::Connect,
                    ::http::Method::PATCH => Method::Patch,
                    _ => Method::Unknown,
                }
            }
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ContextualizedStats {
    #[prost(message, optional, tag = "1")]
    pub context: Option<StatsContext>,
    #[prost(message, optional, tag = "2")]
    pub query_latency_stats: Option<QueryLatencyStats>,
    #[prost(map = "string, message", tag = "3")]
    pub per_type_stat: HashMap<String, TypeStat>,
}

#[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
pub struct StatsContext {
    #[prost(string, tag = "2")]
    pub client_name: String,
    #[prost(string, tag = "3")]
    pub client_version: String,
}

/// Histograms are zero-run-length encoded, see `DurationHistogram`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryLatencyStats {
    #[prost(uint64, tag = "2")]
    pub request_count: u64,
    #[prost(uint64, tag = "3")]
    pub cache_hits: u64,
    #[prost(uint64, tag = "4")]
    pub persisted_query_hits: u64,
    #[prost(uint64, tag = "5")]
    pub persisted_query_misses: u64,
    #[prost(uint64, tag = "8")]
    pub requests_with_errors_count: u64,
    #[prost(uint64, tag = "11")]
    pub registered_operation_count: u64,
    #[prost(uint64, tag = "12")]
    pub forbidden_operation_count: u64,
    #[prost(sint64, repeated, tag = "13")]
    pub latency_count: Vec<i64>,
    #[prost(sint64, repeated, tag = "14")]
    pub cache_latency_count: Vec<i64>,
    #[prost(sint64, repeated, tag = "15")]
    pub public_cache_ttl_count: Vec<i64>,
    #[prost(sint64, repeated, tag = "16")]
    pub private_cache_ttl_count: Vec<i64>,
    #[prost(uint64, tag = "17")]
    pub requests_without_field_instrumentation: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TypeStat {
    #[prost(map = "string, message", tag = "3")]
    pub per_field_stat: HashMap<String, FieldStat>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FieldStat {
    #[prost(string, tag = "3")]
    pub return_type: String,
    #[prost(uint64, tag = "4")]
    pub errors_count: u64,
    #[prost(uint64, tag = "5")]
    pub observed_execution_count: u64,
    #[prost(uint64, tag = "6")]
    pub requests_with_errors_count: u64,
    #[prost(sint64, repeated, tag = "9")]
    pub latency_count: Vec<i64>,
    #[prost(uint64, tag = "10")]
    pub estimated_execution_count: u64,
}
