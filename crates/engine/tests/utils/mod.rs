#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use engine::{
    hooks::{ExecutionListener, FieldEnd, HookSet, ParsingEnd, Plugin, RequestListener, ValidationEnd},
    ErrorCode, ExecutionRequest, ExecutionResult, Executor, ExecutorError, FieldInfo, FieldOutcome, GraphqlError,
    RequestContext, ResponsePath, Schema,
};
use graphql_parser::query::{OperationDefinition, Selection, SelectionSet};
use serde_json::{Map, Value};

pub const SDL: &str = r#"
    directive @cacheControl(maxAge: Int, scope: CacheControlScope, inheritMaxAge: Boolean) on FIELD_DEFINITION | OBJECT | INTERFACE | UNION
    enum CacheControlScope { PUBLIC PRIVATE }

    type Query {
      hero: Droid
      me: User @cacheControl(maxAge: 5, scope: PRIVATE)
      greeting: String
      broken: String
    }

    type Droid @cacheControl(maxAge: 60) {
      name: String
      friends: [Droid] @cacheControl(inheritMaxAge: true)
    }

    type User {
      name: String
    }
"#;

pub fn schema() -> Arc<Schema> {
    Arc::new(Schema::from_sdl(SDL).unwrap())
}

pub fn root_value() -> Value {
    serde_json::json!({
        "hero": { "name": "R2-D2", "friends": [{ "name": "C-3PO" }] },
        "me": { "name": "Luke" },
        "greeting": "hello",
    })
}

/// Resolves fields by reading them from the root value, notifying the field hooks along the
/// way. `broken` always fails.
#[derive(Clone, Default)]
pub struct JsonExecutor {
    pub calls: Arc<AtomicUsize>,
}

impl JsonExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Executor for JsonExecutor {
    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<ExecutionResult, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(definition) = request.definition() else {
            return Err("operation not found in the document".into());
        };

        let selection_set = match definition {
            OperationDefinition::SelectionSet(selection_set) => selection_set,
            OperationDefinition::Query(query) => &query.selection_set,
            OperationDefinition::Mutation(mutation) => &mutation.selection_set,
            OperationDefinition::Subscription(subscription) => &subscription.selection_set,
        };

        let root = request.root_value.cloned().unwrap_or_default();
        let mut errors = Vec::new();
        let data = resolve_object(
            &request,
            request.schema.query_type(),
            selection_set,
            &root,
            &ResponsePath::root(),
            &mut errors,
        );

        Ok(ExecutionResult {
            data: Some(data),
            errors,
            ..Default::default()
        })
    }
}

fn resolve_object(
    request: &ExecutionRequest<'_>,
    parent_type: &str,
    selection_set: &SelectionSet<'static, String>,
    parent: &Value,
    path: &ResponsePath,
    errors: &mut Vec<GraphqlError>,
) -> Value {
    let mut object = Map::new();

    for selection in &selection_set.items {
        let Selection::Field(field) = selection else {
            continue;
        };
        let Some(definition) = request.schema.field(parent_type, &field.name) else {
            continue;
        };

        let path = path.child(field.name.as_str());
        let arguments = Map::new();
        let guard = request.field_hooks.will_resolve_field(FieldInfo {
            path: &path,
            field_name: &field.name,
            parent_type,
            return_type: &definition.ty.display,
            arguments: &arguments,
        });

        if field.name == "broken" {
            let error = GraphqlError::new("broken on purpose", ErrorCode::InternalServerError).with_path(path.clone());
            guard.end(FieldOutcome::error(&error));
            errors.push(error);
            object.insert(field.name.clone(), Value::Null);
            continue;
        }

        let value = parent.get(&field.name).cloned().unwrap_or_default();
        let value = match value {
            Value::Object(_) => resolve_object(
                request,
                &definition.ty.named,
                &field.selection_set,
                &value,
                &path,
                errors,
            ),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        resolve_object(
                            request,
                            &definition.ty.named,
                            &field.selection_set,
                            item,
                            &path.child(index),
                            errors,
                        )
                    })
                    .collect(),
            ),
            value => value,
        };

        guard.end(FieldOutcome::ok(&value));
        object.insert(field.name.clone(), value);
    }

    Value::Object(object)
}

pub struct FailingExecutor;

#[async_trait::async_trait]
impl Executor for FailingExecutor {
    async fn execute(&self, _request: ExecutionRequest<'_>) -> Result<ExecutionResult, ExecutorError> {
        Err("connection to the database was reset".into())
    }
}

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Writes every hook it receives to a shared log, prefixed with its name.
#[derive(Clone)]
pub struct RecordingPlugin {
    pub name: &'static str,
    pub log: Log,
}

impl RecordingPlugin {
    pub fn new(name: &'static str, log: &Log) -> Self {
        RecordingPlugin { name, log: log.clone() }
    }

    fn push(&self, event: impl std::fmt::Display) {
        self.log.lock().unwrap().push(format!("{} {event}", self.name));
    }
}

#[async_trait::async_trait]
impl Plugin for RecordingPlugin {
    async fn server_will_start(&self) {
        self.push("serverWillStart");
    }

    async fn server_will_stop(&self) {
        self.push("serverWillStop");
    }

    async fn request_did_start(&self, _ctx: &RequestContext) -> Option<Box<dyn RequestListener>> {
        self.push("requestDidStart");
        Some(Box::new(self.clone()))
    }
}

#[async_trait::async_trait]
impl RequestListener for RecordingPlugin {
    async fn did_resolve_source(&self, _ctx: &RequestContext) {
        self.push("didResolveSource");
    }

    fn parsing_did_start(&self, _ctx: &RequestContext) -> Option<ParsingEnd> {
        self.push("parsingDidStart");
        let this = self.clone();
        Some(Box::new(move |error: Option<&GraphqlError>| {
            this.push(format!("parsingDidEnd error={}", error.is_some()));
        }))
    }

    fn validation_did_start(&self, _ctx: &RequestContext) -> Option<ValidationEnd> {
        self.push("validationDidStart");
        let this = self.clone();
        Some(Box::new(move |errors: &[GraphqlError]| {
            this.push(format!("validationDidEnd errors={}", errors.len()));
        }))
    }

    async fn did_resolve_operation(&self, ctx: &RequestContext) -> Result<(), GraphqlError> {
        self.push(format!(
            "didResolveOperation {}",
            ctx.operation_name().unwrap_or("<anonymous>")
        ));
        Ok(())
    }

    async fn execution_did_start(&self, _ctx: &RequestContext) -> Option<Box<dyn ExecutionListener>> {
        self.push("executionDidStart");
        Some(Box::new(self.clone()))
    }

    async fn did_encounter_errors(&self, _ctx: &RequestContext, errors: &[GraphqlError]) {
        self.push(format!("didEncounterErrors {}", errors.len()));
    }

    async fn will_send_response(&self, ctx: &RequestContext) {
        let status = ctx.response.as_ref().map(|response| response.http.status.as_u16());
        self.push(format!("willSendResponse {status:?}"));
    }
}

impl ExecutionListener for RecordingPlugin {
    fn hooks(&self) -> HookSet {
        HookSet::EXECUTION
    }

    fn will_resolve_field(&self, info: &FieldInfo<'_>) -> Option<FieldEnd> {
        self.push(format!("willResolveField {}", info.path));
        let (this, path) = (self.clone(), info.path.to_string());
        Some(Box::new(move |outcome: FieldOutcome<'_>| {
            this.push(format!("didResolveField {path} error={}", outcome.error.is_some()));
        }))
    }

    fn execution_did_end(&self, error: Option<&GraphqlError>) {
        self.push(format!("executionDidEnd error={}", error.is_some()));
    }
}
