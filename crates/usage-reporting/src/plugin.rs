use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use engine::{
    cache_control::CacheScope,
    hooks::{ExecutionListener, FieldEnd, HookSet, ParsingEnd, Plugin, RequestListener, ValidationEnd},
    BoxError, FieldInfo, FieldOutcome, GraphqlError, RequestContext,
};
use gateway_config::{SendVariableValues, UsageReportingConfig};
use rand::Rng;
use tokio::task::JoinHandle;

use crate::{
    batcher::{BatcherOptions, ReportBatcher, ReportErrorHandler},
    proto::{self, trace},
    report::{stats_report_key, PARSE_FAILURE_KEY, UNKNOWN_OPERATION_NAME_KEY, VALIDATION_FAILURE_KEY},
    schema_id::SchemaIdCache,
    sender::{ReportSender, SendReportError},
    signature::SignatureCache,
    stats::trace_cache_policy,
    trace_tree::TraceTreeBuilder,
};

const CLIENT_NAME_HEADER: &str = "graphql-client-name";
const CLIENT_VERSION_HEADER: &str = "graphql-client-version";

/// Decides whether a request is reported at all.
pub type IncludeRequest = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Applied to every error before it is written in a trace. `Ok(None)` leaves the error out,
/// an `Err` replaces it with a masked error.
pub type RewriteError = Arc<dyn Fn(GraphqlError) -> Result<Option<GraphqlError>, BoxError> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum UsageReportingError {
    #[error("usage reporting requires an API key")]
    MissingApiKey,
    #[error("the usage report interval must be greater than zero")]
    ZeroReportInterval,
    #[error("could not build the usage reporting HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Reports a trace of every operation, batched per executable schema.
#[derive(Clone)]
pub struct UsageReportingPlugin {
    inner: Arc<PluginInner>,
}

struct PluginInner {
    batcher: ReportBatcher,
    signatures: SignatureCache,
    schema_ids: SchemaIdCache,
    field_level_instrumentation: f64,
    send_unexecutable_operation_documents: bool,
    send_variable_values: SendVariableValues,
    include_request: Option<IncludeRequest>,
    rewrite_error: Option<RewriteError>,
    submissions: Mutex<Vec<JoinHandle<()>>>,
}

pub struct UsageReportingPluginBuilder {
    config: UsageReportingConfig,
    service_version: Option<String>,
    include_request: Option<IncludeRequest>,
    rewrite_error: Option<RewriteError>,
    report_error: Option<ReportErrorHandler>,
}

impl UsageReportingPlugin {
    pub fn builder(config: &UsageReportingConfig) -> UsageReportingPluginBuilder {
        UsageReportingPluginBuilder {
            config: config.clone(),
            service_version: None,
            include_request: None,
            rewrite_error: None,
            report_error: None,
        }
    }

    /// The plugin as configured, `None` when usage reporting is disabled.
    pub fn from_config(config: &UsageReportingConfig) -> Result<Option<Self>, UsageReportingError> {
        if !config.enabled {
            return Ok(None);
        }

        Self::builder(config).build().map(Some)
    }

    pub fn batcher(&self) -> &ReportBatcher {
        &self.inner.batcher
    }
}

impl UsageReportingPluginBuilder {
    #[must_use]
    pub fn with_service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_include_request(mut self, include: impl Fn(&RequestContext) -> bool + Send + Sync + 'static) -> Self {
        self.include_request = Some(Arc::new(include));
        self
    }

    #[must_use]
    pub fn with_rewrite_error(
        mut self,
        rewrite: impl Fn(GraphqlError) -> Result<Option<GraphqlError>, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.rewrite_error = Some(Arc::new(rewrite));
        self
    }

    /// Receives report delivery failures instead of the error log.
    #[must_use]
    pub fn with_report_error(mut self, handler: impl Fn(&SendReportError) + Send + Sync + 'static) -> Self {
        self.report_error = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<UsageReportingPlugin, UsageReportingError> {
        let config = self.config;
        let api_key = config.api_key.clone().ok_or(UsageReportingError::MissingApiKey)?;

        if config.report_interval.is_zero() && !config.send_reports_immediately {
            return Err(UsageReportingError::ZeroReportInterval);
        }

        let sender = ReportSender::new(
            &config.endpoint_url,
            api_key,
            config.request_timeout,
            config.max_attempts,
            config.minimum_retry_delay,
        )?;

        let header = proto::ReportHeader {
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            agent_version: crate::AGENT_VERSION.to_string(),
            service_version: self.service_version.unwrap_or_default(),
            runtime_version: "rust".to_string(),
            uname: format!("{}, {}", std::env::consts::OS, std::env::consts::ARCH),
            executable_schema_id: String::new(),
            graph_ref: config.graph_ref.clone().unwrap_or_default(),
        };

        let batcher = ReportBatcher::new(
            BatcherOptions {
                header,
                report_interval: config.report_interval,
                send_reports_immediately: config.send_reports_immediately,
                max_uncompressed_report_size: config.max_uncompressed_report_size,
                include_traces_contributing_to_stats: config.include_traces_contributing_to_stats,
                debug_print_reports: config.debug_print_reports,
                report_error: self.report_error,
            },
            sender,
        );

        Ok(UsageReportingPlugin {
            inner: Arc::new(PluginInner {
                batcher,
                signatures: SignatureCache::new(config.signature_cache_size),
                schema_ids: SchemaIdCache::default(),
                field_level_instrumentation: config.field_level_instrumentation.clamp(0.0, 1.0),
                send_unexecutable_operation_documents: config.send_unexecutable_operation_documents,
                send_variable_values: config.send_variable_values,
                include_request: self.include_request,
                rewrite_error: self.rewrite_error,
                submissions: Mutex::new(Vec::new()),
            }),
        })
    }
}

#[async_trait::async_trait]
impl Plugin for UsageReportingPlugin {
    async fn server_will_start(&self) {
        self.inner.batcher.start();
    }

    async fn server_will_stop(&self) {
        let submissions = std::mem::take(&mut *self.inner.submissions.lock().unwrap_or_else(PoisonError::into_inner));
        for submission in submissions {
            if let Err(err) = submission.await {
                tracing::warn!("a trace submission did not complete: {err}");
            }
        }

        self.inner.batcher.stop().await;
    }

    async fn request_did_start(&self, ctx: &RequestContext) -> Option<Box<dyn RequestListener>> {
        let mut tree = TraceTreeBuilder::default();
        if let Err(err) = tree.start_timing() {
            tracing::warn!("could not start the trace: {err}");
            return None;
        }

        let trace = proto::Trace {
            http: Some(trace::Http {
                method: trace::http::Method::from(&ctx.request.http.method) as i32,
            }),
            field_execution_weight: 1.0,
            ..Default::default()
        };

        Some(Box::new(UsageReportingListener {
            plugin: self.inner.clone(),
            state: Arc::new(Mutex::new(ListenerState::Pending(Box::new(PendingTrace {
                tree,
                trace,
                source_resolved: false,
                parse_failed: false,
                validation_failed: false,
                unknown_operation: false,
                executed: false,
                included: None,
            })))),
        }))
    }
}

/// A request is reported once. Both the early exit on request errors and
/// `will_send_response` end it, whichever comes first.
enum ListenerState {
    Pending(Box<PendingTrace>),
    Ended,
}

struct PendingTrace {
    tree: TraceTreeBuilder,
    trace: proto::Trace,
    source_resolved: bool,
    parse_failed: bool,
    validation_failed: bool,
    unknown_operation: bool,
    executed: bool,
    included: Option<bool>,
}

type SharedState = Arc<Mutex<ListenerState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, ListenerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_pending(state: &SharedState, f: impl FnOnce(&mut PendingTrace)) {
    if let ListenerState::Pending(pending) = &mut *lock(state) {
        f(pending);
    }
}

struct UsageReportingListener {
    plugin: Arc<PluginInner>,
    state: SharedState,
}

#[async_trait::async_trait]
impl RequestListener for UsageReportingListener {
    fn hooks(&self) -> HookSet {
        HookSet::REQUEST - HookSet::RESPONSE_FOR_OPERATION
    }

    async fn did_resolve_source(&self, ctx: &RequestContext) {
        let send_variable_values = self.plugin.send_variable_values;

        with_pending(&self.state, |pending| {
            pending.source_resolved = true;

            let trace = &mut pending.trace;
            trace.persisted_query_hit = ctx.metrics.persisted_query_hit();
            trace.persisted_query_register = ctx.metrics.persisted_query_register();
            trace.client_name = ctx.request.header(CLIENT_NAME_HEADER).unwrap_or_default().to_string();
            trace.client_version = ctx.request.header(CLIENT_VERSION_HEADER).unwrap_or_default().to_string();

            let variables_json = match send_variable_values {
                SendVariableValues::None => HashMap::new(),
                SendVariableValues::All => ctx
                    .request
                    .variables
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_string()))
                    .collect(),
            };

            trace.details = Some(trace::Details {
                variables_json,
                ..Default::default()
            });
        });
    }

    fn parsing_did_start(&self, _ctx: &RequestContext) -> Option<ParsingEnd> {
        let state = self.state.clone();

        Some(Box::new(move |error: Option<&GraphqlError>| {
            if error.is_some() {
                with_pending(&state, |pending| pending.parse_failed = true);
            }
        }))
    }

    fn validation_did_start(&self, _ctx: &RequestContext) -> Option<ValidationEnd> {
        let state = self.state.clone();

        Some(Box::new(move |errors: &[GraphqlError]| {
            if !errors.is_empty() {
                with_pending(&state, |pending| pending.validation_failed = true);
            }
        }))
    }

    async fn did_resolve_operation(&self, ctx: &RequestContext) -> Result<(), GraphqlError> {
        let included = self.plugin.included(ctx);
        let capture_traces = included && ctx.operation.is_some() && sample(self.plugin.field_level_instrumentation);
        ctx.metrics.set_capture_traces(capture_traces);

        let field_execution_weight = if self.plugin.field_level_instrumentation > 0.0 {
            1.0 / self.plugin.field_level_instrumentation
        } else {
            0.0
        };

        with_pending(&self.state, |pending| {
            pending.included = Some(included);
            pending.unknown_operation = ctx.operation.is_none();
            pending.trace.field_execution_weight = field_execution_weight;
        });

        Ok(())
    }

    async fn execution_did_start(&self, ctx: &RequestContext) -> Option<Box<dyn ExecutionListener>> {
        with_pending(&self.state, |pending| pending.executed = true);

        if !ctx.metrics.capture_traces() {
            return None;
        }

        Some(Box::new(TraceExecutionListener {
            state: self.state.clone(),
        }))
    }

    async fn did_encounter_errors(&self, ctx: &RequestContext, errors: &[GraphqlError]) {
        let errors: Vec<_> = errors
            .iter()
            .filter_map(|error| self.plugin.rewrite(error))
            .collect();

        let mut reached_execution = true;
        with_pending(&self.state, |pending| {
            for error in &errors {
                pending.tree.add_error(error.path.as_ref(), protobuf_error(error));
            }
            reached_execution = pending.executed;
        });

        // Request errors end the trace right away, nothing else will happen to it.
        if !reached_execution {
            self.plugin.end(ctx, &self.state);
        }
    }

    async fn will_send_response(&self, ctx: &RequestContext) {
        self.plugin.end(ctx, &self.state);
    }
}

struct TraceExecutionListener {
    state: SharedState,
}

impl ExecutionListener for TraceExecutionListener {
    fn hooks(&self) -> HookSet {
        HookSet::WILL_RESOLVE_FIELD
    }

    fn will_resolve_field(&self, info: &FieldInfo<'_>) -> Option<FieldEnd> {
        let node = match &mut *lock(&self.state) {
            ListenerState::Pending(pending) => pending.tree.will_resolve_field(info),
            ListenerState::Ended => None,
        }?;

        let state = self.state.clone();
        Some(Box::new(move |_: FieldOutcome<'_>| {
            with_pending(&state, |pending| pending.tree.did_resolve_field(node));
        }))
    }
}

impl PluginInner {
    fn included(&self, ctx: &RequestContext) -> bool {
        self.include_request.as_ref().is_none_or(|include| include(ctx))
    }

    fn rewrite(&self, error: &GraphqlError) -> Option<GraphqlError> {
        let Some(rewrite_error) = &self.rewrite_error else {
            return Some(error.clone());
        };

        match rewrite_error(error.clone()) {
            Ok(rewritten) => rewritten,
            Err(err) => {
                tracing::warn!("rewrite_error failed, masking the error: {err}");
                let mut masked = GraphqlError::new("<masked>", error.code);
                masked.path = error.path.clone();
                Some(masked)
            }
        }
    }

    /// Ends the trace of a request and submits it. Only the first call has an effect.
    fn end(&self, ctx: &RequestContext, state: &SharedState) {
        let pending = match std::mem::replace(&mut *lock(state), ListenerState::Ended) {
            ListenerState::Pending(pending) => pending,
            ListenerState::Ended => return,
        };
        let PendingTrace {
            mut tree,
            mut trace,
            source_resolved,
            parse_failed,
            validation_failed,
            unknown_operation,
            executed: _,
            included,
        } = *pending;

        // Requests which failed before their query was known are not reported.
        if !source_resolved {
            return;
        }

        if !included.unwrap_or_else(|| self.included(ctx)) {
            return;
        }

        if let Err(err) = tree.stop_timing() {
            tracing::warn!("could not stop the trace: {err}");
        }

        if let Some(details) = trace.details.as_mut() {
            details.operation_name = ctx.operation_name().unwrap_or_default().to_string();
        }

        trace.full_query_cache_hit = ctx.metrics.response_cache_hit();
        trace.registered_operation = ctx.metrics.registered_operation();
        trace.forbidden_operation = ctx.metrics.forbidden_operation();

        if let Some(policy) = ctx.overall_cache_policy.and_then(|policy| policy.policy_if_cacheable()) {
            trace.cache_policy = Some(trace_cache_policy(policy.max_age, policy.scope == CacheScope::Private));
        }

        let failure_key = if parse_failed {
            Some(PARSE_FAILURE_KEY)
        } else if validation_failed {
            Some(VALIDATION_FAILURE_KEY)
        } else if unknown_operation || ctx.operation.is_none() {
            Some(UNKNOWN_OPERATION_NAME_KEY)
        } else {
            None
        };

        let stats_report_key = match failure_key {
            Some(key) => {
                if self.send_unexecutable_operation_documents {
                    trace.unexecuted_operation_body = ctx.source.clone().unwrap_or_default();
                    trace.unexecuted_operation_name = ctx.request.operation_name.clone().unwrap_or_default();
                }
                key.to_string()
            }
            None => {
                let query_hash = ctx.query_hash.as_deref().unwrap_or_default();
                let source = ctx.source.as_deref().unwrap_or_default();
                let operation_name = ctx.operation_name();

                match self.signatures.get_or_compute(query_hash, operation_name, source) {
                    Ok(signature) => stats_report_key(operation_name, &signature),
                    Err(err) => {
                        tracing::warn!("could not compute the operation signature, the operation is not reported: {err}");
                        return;
                    }
                }
            }
        };

        let capture_traces = ctx.metrics.capture_traces();
        tree.finish(&mut trace, capture_traces && failure_key.is_none());

        // Unexecutable operations are rare and only useful with their errors, always kept as traces.
        let as_trace = self.batcher.graph_might_support_traces() && (capture_traces || failure_key.is_some());
        let executable_schema_id = self.schema_ids.get(&ctx.schema);
        let batcher = self.batcher.clone();

        // Submitted on the next scheduling tick, the response never waits for it.
        let submission = tokio::spawn(async move {
            tokio::task::yield_now().await;
            batcher
                .add_trace(&executable_schema_id, &stats_report_key, trace, as_trace)
                .await;
        });

        let mut submissions = self.submissions.lock().unwrap_or_else(PoisonError::into_inner);
        submissions.retain(|submission| !submission.is_finished());
        submissions.push(submission);
    }
}

fn sample(ratio: f64) -> bool {
    ratio >= 1.0 || (ratio > 0.0 && rand::thread_rng().gen::<f64>() < ratio)
}

fn protobuf_error(error: &GraphqlError) -> trace::Error {
    trace::Error {
        message: error.message.to_string(),
        location: error
            .locations
            .iter()
            .map(|location| trace::Location {
                line: location.line,
                column: location.column,
            })
            .collect(),
        time_ns: 0,
        json: serde_json::to_string(error).unwrap_or_default(),
    }
}
