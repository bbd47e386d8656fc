use std::sync::Arc;

use error::GraphqlError;
use gateway_config::{CacheControlConfig, Config};
use runtime::{document_cache::DocumentCache, kv::KvStore, persisted_queries::PersistedQueryStore};
use runtime_local::{InMemoryDocumentCache, InMemoryKvStore};

use crate::{
    context::RequestContext,
    document::ParsedDocument,
    execution::Executor,
    hooks::{HookDispatcher, HookSet, Plugin},
    response::Response,
    schema::Schema,
    validation::ValidationRule,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Applied to every error sent to the client. Failures are replaced by a generic error.
pub type FormatError = Arc<dyn Fn(GraphqlError) -> Result<GraphqlError, BoxError> + Send + Sync>;

/// Applied to every response before `will_send_response`.
pub type FormatResponse = Arc<dyn Fn(Response, &RequestContext) -> Response + Send + Sync>;

pub type SharedDocumentCache = Arc<dyn DocumentCache<Arc<ParsedDocument>>>;

pub struct Engine {
    pub(crate) schema: Arc<Schema>,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) plugins: HookDispatcher<dyn Plugin>,
    pub(crate) document_cache: Option<SharedDocumentCache>,
    pub(crate) persisted_queries: Option<PersistedQueryStore>,
    pub(crate) validation_rules: Vec<Arc<dyn ValidationRule>>,
    pub(crate) cache_control: CacheControlConfig,
    pub(crate) debug: bool,
    pub(crate) root_value: Option<serde_json::Value>,
    pub(crate) format_error: Option<FormatError>,
    pub(crate) format_response: Option<FormatResponse>,
}

impl Engine {
    pub fn builder(schema: Arc<Schema>, executor: impl Executor + 'static) -> EngineBuilder {
        EngineBuilder {
            schema,
            executor: Arc::new(executor),
            plugins: Vec::new(),
            document_cache: None,
            persisted_queries: None,
            validation_rules: Vec::new(),
            cache_control: CacheControlConfig::default(),
            debug: false,
            root_value: None,
            format_error: None,
            format_response: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Notifies plugins that the server is about to accept requests.
    pub async fn start(&self) {
        tracing::debug!(plugins = self.plugins.len(), "starting engine");

        self.plugins
            .invoke_hook(HookSet::SERVER_WILL_START, |plugin| plugin.server_will_start())
            .await;
    }

    /// Notifies plugins that the server is shutting down. Plugins flush whatever they buffered.
    pub async fn stop(&self) {
        tracing::debug!("stopping engine");

        self.plugins
            .invoke_hook(HookSet::SERVER_WILL_STOP, |plugin| plugin.server_will_stop())
            .await;
    }
}

pub struct EngineBuilder {
    schema: Arc<Schema>,
    executor: Arc<dyn Executor>,
    plugins: Vec<Box<dyn Plugin>>,
    document_cache: Option<SharedDocumentCache>,
    persisted_queries: Option<PersistedQueryStore>,
    validation_rules: Vec<Arc<dyn ValidationRule>>,
    cache_control: CacheControlConfig,
    debug: bool,
    root_value: Option<serde_json::Value>,
    format_error: Option<FormatError>,
    format_response: Option<FormatResponse>,
}

impl EngineBuilder {
    /// Applies the engine configuration, with in-memory stores for the document cache and
    /// persisted queries when they are enabled.
    #[must_use]
    pub fn from_config(mut self, config: &Config) -> Self {
        self.debug = config.debug;
        self.cache_control = config.cache_control;

        self.document_cache = config.document_cache.enabled.then(|| {
            let cache = InMemoryDocumentCache::new(config.document_cache.max_size, |document: &Arc<ParsedDocument>| {
                document.estimated_size()
            });
            Arc::new(cache) as SharedDocumentCache
        });

        self.persisted_queries = config.persisted_queries.enabled.then(|| {
            let kv = KvStore::new(InMemoryKvStore::new(config.persisted_queries.max_size));
            PersistedQueryStore::new(kv, config.persisted_queries.ttl)
        });

        self
    }

    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    #[must_use]
    pub fn with_document_cache(mut self, cache: impl DocumentCache<Arc<ParsedDocument>> + 'static) -> Self {
        self.document_cache = Some(Arc::new(cache));
        self
    }

    #[must_use]
    pub fn without_document_cache(mut self) -> Self {
        self.document_cache = None;
        self
    }

    #[must_use]
    pub fn with_persisted_query_store(mut self, store: PersistedQueryStore) -> Self {
        self.persisted_queries = Some(store);
        self
    }

    #[must_use]
    pub fn without_persisted_queries(mut self) -> Self {
        self.persisted_queries = None;
        self
    }

    #[must_use]
    pub fn with_validation_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.validation_rules.push(Arc::new(rule));
        self
    }

    #[must_use]
    pub fn with_cache_control(mut self, config: CacheControlConfig) -> Self {
        self.cache_control = config;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_root_value(mut self, root_value: serde_json::Value) -> Self {
        self.root_value = Some(root_value);
        self
    }

    #[must_use]
    pub fn with_format_error(
        mut self,
        format_error: impl Fn(GraphqlError) -> Result<GraphqlError, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.format_error = Some(Arc::new(format_error));
        self
    }

    #[must_use]
    pub fn with_format_response(
        mut self,
        format_response: impl Fn(Response, &RequestContext) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.format_response = Some(Arc::new(format_response));
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            schema: self.schema,
            executor: self.executor,
            plugins: self.plugins.into_iter().collect(),
            document_cache: self.document_cache,
            persisted_queries: self.persisted_queries,
            validation_rules: self.validation_rules,
            cache_control: self.cache_control,
            debug: self.debug,
            root_value: self.root_value,
            format_error: self.format_error,
            format_response: self.format_response,
        }
    }
}
