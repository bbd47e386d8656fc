use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    cache_control::CachePolicy,
    document::{OperationRef, ParsedDocument},
    request::Request,
    response::Response,
    schema::Schema,
};

/// Flags describing how a request was served. Listeners observe the context through a shared
/// reference, hence the atomics.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    persisted_query_hit: AtomicBool,
    persisted_query_register: AtomicBool,
    capture_traces: AtomicBool,
    response_cache_hit: AtomicBool,
    /// Set by plugins enforcing an operation safelist, reported in usage statistics.
    registered_operation: AtomicBool,
    forbidden_operation: AtomicBool,
}

macro_rules! flag {
    ($get:ident, $set:ident) => {
        pub fn $get(&self) -> bool {
            self.$get.load(Ordering::Relaxed)
        }

        pub fn $set(&self, value: bool) {
            self.$get.store(value, Ordering::Relaxed);
        }
    };
}

impl RequestMetrics {
    flag!(persisted_query_hit, set_persisted_query_hit);
    flag!(persisted_query_register, set_persisted_query_register);
    flag!(capture_traces, set_capture_traces);
    flag!(response_cache_hit, set_response_cache_hit);
    flag!(registered_operation, set_registered_operation);
    flag!(forbidden_operation, set_forbidden_operation);
}

/// State of a single request, filled in stage after stage by the pipeline. Never shared across
/// requests.
#[derive(Debug)]
pub struct RequestContext {
    pub schema: Arc<Schema>,
    pub request: Request,
    /// Query text, once known. Either sent by the client or retrieved from the persisted
    /// query store.
    pub source: Option<String>,
    pub query_hash: Option<String>,
    pub document: Option<Arc<ParsedDocument>>,
    pub operation: Option<OperationRef>,
    pub metrics: RequestMetrics,
    pub overall_cache_policy: Option<CachePolicy>,
    /// Set right before `will_send_response`.
    pub response: Option<Response>,
}

impl RequestContext {
    pub fn new(schema: Arc<Schema>, request: Request) -> Self {
        RequestContext {
            schema,
            request,
            source: None,
            query_hash: None,
            document: None,
            operation: None,
            metrics: RequestMetrics::default(),
            overall_cache_policy: None,
            response: None,
        }
    }

    /// Name of the resolved operation, falling back to the requested one.
    pub fn operation_name(&self) -> Option<&str> {
        match &self.operation {
            Some(operation) => operation.name.as_deref(),
            None => self.request.operation_name.as_deref(),
        }
    }
}
