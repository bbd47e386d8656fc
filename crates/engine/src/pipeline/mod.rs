//! The request pipeline: source resolution, document acquisition, operation resolution,
//! execution and response formatting, with the lifecycle hooks dispatched at every step.

mod document;
mod execute;
mod persisted_query;

use error::{ErrorCode, GraphqlError};
use tracing::Instrument;

use crate::{
    context::RequestContext,
    engine::Engine,
    hooks::{HookDispatcher, HookSet, RequestListener},
    request::Request,
    response::Response,
};

pub(crate) type RequestListeners = HookDispatcher<dyn RequestListener>;

/// A request that ends before execution, or whose execution failed as a whole.
type StageResult<T> = Result<T, Vec<GraphqlError>>;

impl Engine {
    pub async fn execute(&self, request: Request) -> Response {
        let span = tracing::info_span!(
            "graphql_request",
            operation_name = request.operation_name.as_deref().unwrap_or_default()
        );

        async {
            let mut ctx = RequestContext::new(self.schema.clone(), request);

            let listeners: RequestListeners = {
                let ctx = &ctx;
                self.plugins
                    .collect_hook(HookSet::REQUEST_DID_START, |plugin| plugin.request_did_start(ctx))
                    .await
                    .into_iter()
                    .collect()
            };

            self.process(&mut ctx, &listeners).await
        }
        .instrument(span)
        .await
    }

    /// Runs every stage for one request. `will_send_response` is called exactly once, whichever
    /// stage ended the request.
    pub(crate) async fn process(&self, ctx: &mut RequestContext, listeners: &RequestListeners) -> Response {
        let response = match self.run_stages(ctx, listeners).await {
            Ok(response) => response,
            Err(errors) => {
                let shared = &*ctx;
                listeners
                    .invoke_hook(HookSet::DID_ENCOUNTER_ERRORS, |listener| {
                        listener.did_encounter_errors(shared, &errors)
                    })
                    .await;

                Response::request_errors(errors)
            }
        };

        self.send_response(ctx, listeners, response).await
    }

    async fn run_stages(&self, ctx: &mut RequestContext, listeners: &RequestListeners) -> StageResult<Response> {
        let (source, query_hash) = self.resolve_source(ctx).await.map_err(|error| vec![error])?;
        ctx.source = Some(source);
        ctx.query_hash = Some(query_hash);

        let shared = &*ctx;
        listeners
            .invoke_hook(HookSet::DID_RESOLVE_SOURCE, |listener| listener.did_resolve_source(shared))
            .await;

        let document = self.acquire_document(ctx, listeners).await?;
        ctx.operation = document.operation(ctx.request.operation_name.as_deref());
        ctx.document = Some(document);

        let shared = &*ctx;
        listeners
            .try_invoke_hook(HookSet::DID_RESOLVE_OPERATION, |listener| {
                listener.did_resolve_operation(shared)
            })
            .await
            .map_err(|error| vec![error])?;

        if ctx.metrics.persisted_query_register() {
            self.register_persisted_query(ctx);
        }

        let shared = &*ctx;
        let cached = listeners
            .invoke_hook_until_some(HookSet::RESPONSE_FOR_OPERATION, |listener| {
                listener.response_for_operation(shared)
            })
            .await;

        if let Some(cached) = cached {
            tracing::debug!("response provided by a plugin, skipping execution");
            ctx.metrics.set_response_cache_hit(true);
            ctx.overall_cache_policy = Some(cached.cache_policy.unwrap_or_default());
            return Ok(cached.response);
        }

        let Some(operation) = ctx.operation.clone() else {
            return Err(vec![unknown_operation_error(ctx)]);
        };

        let (response, cache_policy) = self.execute_operation(ctx, listeners, &operation).await?;
        ctx.overall_cache_policy = Some(cache_policy);

        Ok(response)
    }

    async fn send_response(
        &self,
        ctx: &mut RequestContext,
        listeners: &RequestListeners,
        mut response: Response,
    ) -> Response {
        response.errors = std::mem::take(&mut response.errors)
            .into_iter()
            .map(|error| self.format_error(error))
            .collect();

        if let Some(format_response) = &self.format_response {
            response = format_response(response, &*ctx);
        }

        if self.cache_control.calculate_http_headers && !response.has_errors() {
            if let Some(policy) = &ctx.overall_cache_policy {
                response.set_cache_control(policy);
            }
        }

        ctx.response = Some(response);

        let shared = &*ctx;
        listeners
            .invoke_hook(HookSet::WILL_SEND_RESPONSE, |listener| listener.will_send_response(shared))
            .await;

        ctx.response.take().unwrap_or_default()
    }

    fn format_error(&self, error: GraphqlError) -> GraphqlError {
        let Some(format_error) = &self.format_error else {
            return error;
        };

        match format_error(error) {
            Ok(error) => error,
            Err(err) => {
                tracing::warn!("failed to format an error: {err}");
                GraphqlError::new(
                    "Internal server error while formatting error",
                    ErrorCode::InternalServerError,
                )
            }
        }
    }
}

fn unknown_operation_error(ctx: &RequestContext) -> GraphqlError {
    let message = match ctx.request.operation_name.as_deref() {
        Some(name) => format!("Unknown operation named \"{name}\"."),
        None => "Must provide operation name if query contains multiple operations.".to_string(),
    };

    GraphqlError::new(message, ErrorCode::OperationResolutionError)
}
