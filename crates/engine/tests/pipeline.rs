mod utils;

use std::sync::Arc;

use engine::{
    cache_control::{CacheHint, CachePolicy},
    hooks::{CachedResponse, HookSet, Plugin, RequestListener},
    Engine, ErrorCode, GraphqlError, Request, RequestContext, Response,
};
use gateway_config::CacheControlConfig;
use runtime_local::InMemoryDocumentCache;
use utils::*;

fn engine() -> engine::EngineBuilder {
    Engine::builder(schema(), JsonExecutor::default()).with_root_value(root_value())
}

fn cached_documents() -> InMemoryDocumentCache<Arc<engine::ParsedDocument>> {
    InMemoryDocumentCache::new(1024 * 1024, |document: &Arc<engine::ParsedDocument>| {
        document.estimated_size()
    })
}

#[tokio::test]
async fn executes_a_query() {
    let engine = engine().build();

    let response = engine.execute(Request::new("{ hero { name friends { name } } }")).await;

    assert_eq!(response.http.status, http::StatusCode::OK);
    insta::assert_json_snapshot!(response, @r#"
    {
      "data": {
        "hero": {
          "name": "R2-D2",
          "friends": [
            {
              "name": "C-3PO"
            }
          ]
        }
      }
    }
    "#);
}

#[tokio::test]
async fn hooks_are_called_in_order() {
    let log = Log::default();
    let engine = engine().with_plugin(RecordingPlugin::new("a", &log)).build();

    engine.execute(Request::new("query Greet { greeting }")).await;

    insta::assert_debug_snapshot!(entries(&log), @r#"
    [
        "a requestDidStart",
        "a didResolveSource",
        "a parsingDidStart",
        "a parsingDidEnd error=false",
        "a validationDidStart",
        "a validationDidEnd errors=0",
        "a didResolveOperation Greet",
        "a executionDidStart",
        "a willResolveField greeting",
        "a didResolveField greeting error=false",
        "a executionDidEnd error=false",
        "a willSendResponse Some(200)",
    ]
    "#);
}

#[tokio::test]
async fn end_hooks_run_in_reverse_registration_order() {
    let log = Log::default();
    let engine = engine()
        .with_plugin(RecordingPlugin::new("a", &log))
        .with_plugin(RecordingPlugin::new("b", &log))
        .build();

    engine.execute(Request::new("{ greeting }")).await;

    let ends: Vec<_> = entries(&log)
        .into_iter()
        .filter(|entry| entry.contains("DidEnd") || entry.contains("didResolveField"))
        .collect();

    insta::assert_debug_snapshot!(ends, @r#"
    [
        "b parsingDidEnd error=false",
        "a parsingDidEnd error=false",
        "b validationDidEnd errors=0",
        "a validationDidEnd errors=0",
        "b didResolveField greeting error=false",
        "a didResolveField greeting error=false",
        "b executionDidEnd error=false",
        "a executionDidEnd error=false",
    ]
    "#);
}

#[tokio::test]
async fn lifecycle_of_the_server() {
    let log = Log::default();
    let engine = engine().with_plugin(RecordingPlugin::new("a", &log)).build();

    engine.start().await;
    engine.stop().await;

    assert_eq!(entries(&log), ["a serverWillStart", "a serverWillStop"]);
}

#[tokio::test]
async fn parsing_failure() {
    let log = Log::default();
    let executor = JsonExecutor::default();
    let engine = Engine::builder(schema(), executor.clone())
        .with_plugin(RecordingPlugin::new("a", &log))
        .build();

    let response = engine.execute(Request::new("{ greeting ")).await;

    assert_eq!(response.http.status, http::StatusCode::BAD_REQUEST);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code, ErrorCode::OperationParsingError);
    assert_eq!(executor.calls(), 0);

    insta::assert_debug_snapshot!(entries(&log), @r#"
    [
        "a requestDidStart",
        "a didResolveSource",
        "a parsingDidStart",
        "a parsingDidEnd error=true",
        "a didEncounterErrors 1",
        "a willSendResponse Some(400)",
    ]
    "#);
}

#[tokio::test]
async fn validation_failure() {
    let log = Log::default();
    let engine = engine().with_plugin(RecordingPlugin::new("a", &log)).build();

    let response = engine.execute(Request::new("{ greeting age }")).await;

    assert_eq!(response.http.status, http::StatusCode::BAD_REQUEST);
    assert_eq!(response.errors[0].code, ErrorCode::OperationValidationError);
    assert!(response.data.is_none());

    let log = entries(&log);
    assert!(log.contains(&"a validationDidEnd errors=1".to_string()));
    assert!(!log.iter().any(|entry| entry.contains("didResolveOperation")));
}

#[tokio::test]
async fn document_cache_skips_parsing_and_validation() {
    let log = Log::default();
    let engine = engine()
        .with_document_cache(cached_documents())
        .with_plugin(RecordingPlugin::new("a", &log))
        .build();

    engine.execute(Request::new("{ greeting }")).await;
    tokio::task::yield_now().await;
    let response = engine.execute(Request::new("{ greeting }")).await;

    assert_eq!(response.data, Some(serde_json::json!({ "greeting": "hello" })));

    let log = entries(&log);
    let count = |event: &str| log.iter().filter(|entry| entry.ends_with(event)).count();
    assert_eq!(count("parsingDidStart"), 1);
    assert_eq!(count("validationDidStart"), 1);
    assert_eq!(count("willSendResponse Some(200)"), 2);
}

#[tokio::test]
async fn without_document_cache_every_request_is_parsed() {
    let log = Log::default();
    let engine = engine().with_plugin(RecordingPlugin::new("a", &log)).build();

    engine.execute(Request::new("{ greeting }")).await;
    tokio::task::yield_now().await;
    engine.execute(Request::new("{ greeting }")).await;

    let log = entries(&log);
    let count = |event: &str| log.iter().filter(|entry| entry.ends_with(event)).count();
    assert_eq!(count("parsingDidStart"), 2);
    assert_eq!(count("validationDidStart"), 2);
}

#[tokio::test]
async fn unknown_operation_name() {
    let engine = engine().build();

    let response = engine
        .execute(Request::new("query A { greeting } query B { greeting }").with_operation_name("C"))
        .await;

    insta::assert_json_snapshot!(response, @r#"
    {
      "errors": [
        {
          "message": "Unknown operation named \"C\".",
          "extensions": {
            "code": "OPERATION_RESOLUTION_ERROR"
          }
        }
      ]
    }
    "#);
}

#[tokio::test]
async fn missing_operation_name() {
    let engine = engine().build();

    let response = engine
        .execute(Request::new("query A { greeting } query B { greeting }"))
        .await;

    assert_eq!(
        response.errors[0].message,
        "Must provide operation name if query contains multiple operations."
    );
    assert_eq!(response.http.status, http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn picks_the_named_operation() {
    let engine = engine().build();

    let response = engine
        .execute(Request::new("query A { greeting } query B { hero { name } }").with_operation_name("B"))
        .await;

    assert_eq!(response.data, Some(serde_json::json!({ "hero": { "name": "R2-D2" } })));
}

#[tokio::test]
async fn field_errors_are_reported_once() {
    let log = Log::default();
    let engine = engine().with_plugin(RecordingPlugin::new("a", &log)).build();

    let response = engine.execute(Request::new("{ greeting broken }")).await;

    assert_eq!(response.http.status, http::StatusCode::OK);
    insta::assert_json_snapshot!(response, @r#"
    {
      "data": {
        "greeting": "hello",
        "broken": null
      },
      "errors": [
        {
          "message": "broken on purpose",
          "path": [
            "broken"
          ],
          "extensions": {
            "code": "INTERNAL_SERVER_ERROR"
          }
        }
      ]
    }
    "#);

    let log = entries(&log);
    assert!(log.contains(&"a didResolveField broken error=true".to_string()));
    assert_eq!(log.iter().filter(|entry| entry.contains("didEncounterErrors")).count(), 1);
}

#[tokio::test]
async fn executor_failure_is_masked() {
    let log = Log::default();
    let engine = Engine::builder(schema(), FailingExecutor)
        .with_plugin(RecordingPlugin::new("a", &log))
        .build();

    let response = engine.execute(Request::new("{ greeting }")).await;

    assert_eq!(response.http.status, http::StatusCode::INTERNAL_SERVER_ERROR);
    insta::assert_json_snapshot!(response, @r#"
    {
      "errors": [
        {
          "message": "Internal server error",
          "extensions": {
            "code": "INTERNAL_SERVER_ERROR"
          }
        }
      ]
    }
    "#);

    let log = entries(&log);
    assert!(log.contains(&"a executionDidEnd error=true".to_string()));
    assert!(log.contains(&"a didEncounterErrors 1".to_string()));
}

#[tokio::test]
async fn executor_failure_in_debug_mode() {
    let engine = Engine::builder(schema(), FailingExecutor).with_debug(true).build();

    let response = engine.execute(Request::new("{ greeting }")).await;

    insta::assert_json_snapshot!(response, @r#"
    {
      "errors": [
        {
          "message": "connection to the database was reset",
          "extensions": {
            "exception": {
              "message": "connection to the database was reset"
            },
            "code": "INTERNAL_SERVER_ERROR"
          }
        }
      ]
    }
    "#);
}

#[tokio::test]
async fn format_error_failure_is_replaced() {
    let engine = engine()
        .with_format_error(|error: GraphqlError| {
            if error.message.contains("broken") {
                Err("formatter gave up".into())
            } else {
                Ok(error)
            }
        })
        .build();

    let response = engine.execute(Request::new("{ broken }")).await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].message,
        "Internal server error while formatting error"
    );
}

#[tokio::test]
async fn format_error_rewrites_messages() {
    let engine = engine()
        .with_format_error(|mut error: GraphqlError| {
            error.message = format!("[masked] {}", error.message).into();
            Ok(error)
        })
        .build();

    let response = engine.execute(Request::new("{ greeting")).await;

    assert!(response.errors[0].message.starts_with("[masked] "));
}

#[tokio::test]
async fn format_response_runs_before_will_send_response() {
    let log = Log::default();
    let engine = engine()
        .with_plugin(RecordingPlugin::new("a", &log))
        .with_format_response(|mut response: Response, _ctx: &RequestContext| {
            response.http.status = http::StatusCode::ACCEPTED;
            response
        })
        .build();

    let response = engine.execute(Request::new("{ greeting }")).await;

    assert_eq!(response.http.status, http::StatusCode::ACCEPTED);
    assert!(entries(&log).contains(&"a willSendResponse Some(202)".to_string()));
}

#[tokio::test]
async fn cache_control_header_uses_the_default_max_age() {
    let engine = engine()
        .with_cache_control(CacheControlConfig {
            default_max_age: 10,
            calculate_http_headers: true,
        })
        .build();

    let response = engine.execute(Request::new("{ greeting }")).await;

    assert_eq!(response.cache_control(), Some("max-age=10, public"));
}

#[tokio::test]
async fn cache_control_header_follows_the_annotations() {
    let engine = engine().build();

    let response = engine.execute(Request::new("{ hero { name friends { name } } }")).await;
    assert_eq!(response.cache_control(), Some("max-age=60, public"));

    let response = engine.execute(Request::new("{ hero { name } me { name } }")).await;
    assert_eq!(response.cache_control(), Some("max-age=5, private"));

    // A root scalar without annotation falls back to the default maxAge of 0.
    let response = engine.execute(Request::new("{ hero { name } greeting }")).await;
    assert_eq!(response.cache_control(), None);
}

#[tokio::test]
async fn cache_control_header_can_be_disabled() {
    let engine = engine()
        .with_cache_control(CacheControlConfig {
            default_max_age: 10,
            calculate_http_headers: false,
        })
        .build();

    let response = engine.execute(Request::new("{ greeting }")).await;

    assert_eq!(response.cache_control(), None);
}

#[tokio::test]
async fn no_cache_control_header_on_errors() {
    let engine = engine()
        .with_cache_control(CacheControlConfig {
            default_max_age: 10,
            calculate_http_headers: true,
        })
        .build();

    let response = engine.execute(Request::new("{ greeting broken }")).await;

    assert_eq!(response.cache_control(), None);
}

struct ResponseCache {
    policy: Option<CachePolicy>,
}

#[async_trait::async_trait]
impl Plugin for ResponseCache {
    async fn request_did_start(&self, _ctx: &RequestContext) -> Option<Box<dyn RequestListener>> {
        Some(Box::new(CachedListener { policy: self.policy }))
    }
}

struct CachedListener {
    policy: Option<CachePolicy>,
}

#[async_trait::async_trait]
impl RequestListener for CachedListener {
    fn hooks(&self) -> HookSet {
        HookSet::RESPONSE_FOR_OPERATION
    }

    async fn response_for_operation(&self, _ctx: &RequestContext) -> Option<CachedResponse> {
        Some(CachedResponse {
            response: Response::data(serde_json::json!({ "greeting": "from cache" })),
            cache_policy: self.policy,
        })
    }
}

#[tokio::test]
async fn response_for_operation_skips_execution() {
    let log = Log::default();
    let executor = JsonExecutor::default();
    let engine = Engine::builder(schema(), executor.clone())
        .with_plugin(ResponseCache {
            policy: Some(CachePolicy::from(CacheHint::max_age(30))),
        })
        .with_plugin(RecordingPlugin::new("a", &log))
        .build();

    let response = engine.execute(Request::new("{ greeting }")).await;

    assert_eq!(executor.calls(), 0);
    assert_eq!(response.data, Some(serde_json::json!({ "greeting": "from cache" })));
    assert_eq!(response.cache_control(), Some("max-age=30, public"));

    let log = entries(&log);
    assert!(!log.iter().any(|entry| entry.contains("executionDidStart")));
    assert!(log.contains(&"a willSendResponse Some(200)".to_string()));
}

#[tokio::test]
async fn cached_response_without_policy_is_not_cacheable() {
    let engine = engine().with_plugin(ResponseCache { policy: None }).build();

    let response = engine.execute(Request::new("{ greeting }")).await;

    assert_eq!(response.cache_control(), None);
}

struct Gatekeeper;

#[async_trait::async_trait]
impl Plugin for Gatekeeper {
    async fn request_did_start(&self, _ctx: &RequestContext) -> Option<Box<dyn RequestListener>> {
        Some(Box::new(Gatekeeper))
    }
}

#[async_trait::async_trait]
impl RequestListener for Gatekeeper {
    async fn did_resolve_operation(&self, ctx: &RequestContext) -> Result<(), GraphqlError> {
        match ctx.operation_name() {
            Some("Forbidden") => {
                ctx.metrics.set_forbidden_operation(true);
                Err(GraphqlError::new("Operation is not allowed", ErrorCode::ExtensionError))
            }
            _ => Ok(()),
        }
    }
}

#[tokio::test]
async fn did_resolve_operation_can_reject_a_request() {
    let executor = JsonExecutor::default();
    let engine = Engine::builder(schema(), executor.clone())
        .with_plugin(Gatekeeper)
        .build();

    let response = engine.execute(Request::new("query Forbidden { greeting }")).await;

    assert_eq!(executor.calls(), 0);
    assert_eq!(response.http.status, http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.errors[0].message, "Operation is not allowed");

    let response = engine.execute(Request::new("query Allowed { greeting }")).await;
    assert_eq!(executor.calls(), 1);
    assert!(response.errors.is_empty());
}
