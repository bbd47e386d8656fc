use std::sync::Arc;

use error::{ErrorCode, GraphqlError};
use tracing::Instrument;

use super::{RequestListeners, StageResult};
use crate::{
    cache_control::{CacheControlCollector, CachePolicy},
    context::RequestContext,
    document::OperationRef,
    engine::Engine,
    execution::{ExecutionRequest, ExecutorError, FieldHooks},
    hooks::{ExecutionListener, HookDispatcher, HookSet},
    response::Response,
};

impl Engine {
    /// Runs the executor with the field hooks of every listener, and computes the cache policy
    /// of the response from the resolved fields.
    pub(super) async fn execute_operation(
        &self,
        ctx: &RequestContext,
        listeners: &RequestListeners,
        operation: &OperationRef,
    ) -> StageResult<(Response, CachePolicy)> {
        let Some(document) = ctx.document.as_deref() else {
            return Err(vec![GraphqlError::internal_server_error()]);
        };

        let execution_listeners: HookDispatcher<dyn ExecutionListener> = listeners
            .collect_hook(HookSet::EXECUTION_DID_START, |listener| listener.execution_did_start(ctx))
            .await
            .into_iter()
            .collect();
        let execution_listeners = Arc::new(execution_listeners);

        let collector = Arc::new(CacheControlCollector::new(self.schema.clone(), &self.cache_control));
        let field_hooks = FieldHooks::new(execution_listeners.clone(), collector.clone());

        let request = ExecutionRequest {
            schema: &self.schema,
            document,
            operation,
            variables: &ctx.request.variables,
            root_value: self.root_value.as_ref(),
            context: ctx,
            field_hooks: &field_hooks,
        };

        let result = self
            .executor
            .execute(request)
            .instrument(tracing::info_span!("execute", operation_kind = %operation.kind))
            .await;

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                let error = self.executor_error(err);
                execution_listeners.invoke_hook_reversed(HookSet::EXECUTION_DID_END, |listener| {
                    listener.execution_did_end(Some(&error))
                });
                return Err(vec![error]);
            }
        };

        execution_listeners
            .invoke_hook_reversed(HookSet::EXECUTION_DID_END, |listener| listener.execution_did_end(None));

        if !result.errors.is_empty() {
            listeners
                .invoke_hook(HookSet::DID_ENCOUNTER_ERRORS, |listener| {
                    listener.did_encounter_errors(ctx, &result.errors)
                })
                .await;
        }

        let response = Response {
            data: result.data,
            errors: result.errors,
            extensions: result.extensions,
            http: Default::default(),
        };

        Ok((response, collector.finish()))
    }

    fn executor_error(&self, err: ExecutorError) -> GraphqlError {
        tracing::error!("operation execution failed: {err}");

        if self.debug {
            GraphqlError::new(err.to_string(), ErrorCode::InternalServerError)
                .with_extension("exception", serde_json::json!({ "message": err.to_string() }))
        } else {
            GraphqlError::internal_server_error()
        }
    }
}
