use std::sync::Arc;

use error::{ErrorCode, GraphqlError, ResponsePath};
use graphql_parser::query::OperationDefinition;

use crate::{
    cache_control::{CacheControlCollector, CacheHint, FieldCacheHint},
    context::RequestContext,
    document::{OperationRef, ParsedDocument},
    hooks::{DidEndHook, ExecutionListener, FieldEnd, HookDispatcher, HookSet},
    schema::Schema,
};

pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// Executes a validated operation. The engine does not resolve fields itself.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// An `Err` is an unexpected failure of the executor. It is reported to the client as an
    /// internal error. Field errors belong in [`ExecutionResult::errors`].
    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<ExecutionResult, ExecutorError>;
}

pub struct ExecutionRequest<'a> {
    pub schema: &'a Schema,
    pub document: &'a ParsedDocument,
    pub operation: &'a OperationRef,
    pub variables: &'a serde_json::Map<String, serde_json::Value>,
    pub root_value: Option<&'a serde_json::Value>,
    pub context: &'a RequestContext,
    /// Must be notified of every field the executor resolves.
    pub field_hooks: &'a FieldHooks,
}

impl ExecutionRequest<'_> {
    pub fn operation_name(&self) -> Option<&str> {
        self.operation.name.as_deref()
    }

    pub fn definition(&self) -> Option<&OperationDefinition<'static, String>> {
        self.document.definition(self.operation)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub data: Option<serde_json::Value>,
    pub errors: Vec<GraphqlError>,
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

/// A field about to be resolved.
#[derive(Debug, Clone, Copy)]
pub struct FieldInfo<'a> {
    pub path: &'a ResponsePath,
    pub field_name: &'a str,
    pub parent_type: &'a str,
    /// Return type as written in the schema, `[Droid!]!` for example.
    pub return_type: &'a str,
    pub arguments: &'a serde_json::Map<String, serde_json::Value>,
}

/// How a field settled.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldOutcome<'a> {
    pub error: Option<&'a GraphqlError>,
    pub result: Option<&'a serde_json::Value>,
}

impl<'a> FieldOutcome<'a> {
    pub fn ok(result: &'a serde_json::Value) -> Self {
        FieldOutcome {
            error: None,
            result: Some(result),
        }
    }

    pub fn error(error: &'a GraphqlError) -> Self {
        FieldOutcome {
            error: Some(error),
            result: None,
        }
    }
}

/// Entry point of the field level hooks, handed to the executor.
#[derive(Clone)]
pub struct FieldHooks {
    listeners: Arc<HookDispatcher<dyn ExecutionListener>>,
    cache_control: Arc<CacheControlCollector>,
}

impl FieldHooks {
    pub(crate) fn new(
        listeners: Arc<HookDispatcher<dyn ExecutionListener>>,
        cache_control: Arc<CacheControlCollector>,
    ) -> Self {
        FieldHooks {
            listeners,
            cache_control,
        }
    }

    /// Must be called before resolving a field. The returned guard must be ended once the
    /// value of the field settled, including nested asynchronous resolution.
    pub fn will_resolve_field(&self, info: FieldInfo<'_>) -> FieldGuard {
        let ends = self
            .listeners
            .invoke_did_start_hook(HookSet::WILL_RESOLVE_FIELD, |listener| listener.will_resolve_field(&info));
        let cache_hint = self.cache_control.start_field(&info);

        FieldGuard {
            ends: Some(ends),
            cache_control: self.cache_control.clone(),
            cache_hint,
        }
    }
}

/// A field being resolved. Dropping it without calling [`FieldGuard::end`] ends the field with
/// an error, so every start is always paired with an end.
pub struct FieldGuard {
    ends: Option<DidEndHook<FieldEnd>>,
    cache_control: Arc<CacheControlCollector>,
    cache_hint: FieldCacheHint,
}

impl FieldGuard {
    /// Replaces the dimensions defined by the hint, for resolvers that know better than the
    /// schema annotations.
    pub fn set_cache_hint(&mut self, hint: CacheHint) {
        self.cache_hint.replace(hint);
    }

    /// Makes the hint of the field more restrictive.
    pub fn restrict_cache_hint(&mut self, hint: CacheHint) {
        self.cache_hint.restrict(hint);
    }

    pub fn cache_hint(&self) -> CacheHint {
        self.cache_hint.hint()
    }

    pub fn end(mut self, outcome: FieldOutcome<'_>) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: FieldOutcome<'_>) {
        let Some(ends) = self.ends.take() else {
            return;
        };

        ends.end(outcome);
        self.cache_control.end_field(&self.cache_hint);
    }
}

impl Drop for FieldGuard {
    fn drop(&mut self) {
        if self.ends.is_some() {
            let error = GraphqlError::new("Field resolution was abandoned", ErrorCode::InternalServerError);
            self.finish(FieldOutcome::error(&error));
        }
    }
}
