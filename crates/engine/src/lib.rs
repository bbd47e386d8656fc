//! A GraphQL request pipeline. The engine resolves the query text, parses and validates it,
//! picks the operation and hands it to an [`Executor`], notifying plugins at every step.

pub mod cache_control;
mod context;
mod document;
mod engine;
mod execution;
pub mod hooks;
mod pipeline;
mod request;
mod response;
mod schema;
pub mod validation;

pub use context::{RequestContext, RequestMetrics};
pub use document::{query_hash, OperationKind, OperationRef, ParsedDocument};
pub use engine::{BoxError, Engine, EngineBuilder, FormatError, FormatResponse, SharedDocumentCache};
pub use error::{ErrorCode, GraphqlError, Location, PathSegment, ResponsePath};
pub use execution::{
    ExecutionRequest, ExecutionResult, Executor, ExecutorError, FieldGuard, FieldHooks, FieldInfo, FieldOutcome,
};
pub use request::{HttpRequestParts, PersistedQueryRequestExtension, Request, RequestExtensions};
pub use response::{Response, ResponseHttp};
pub use schema::{
    CacheControlAnnotation, FieldDefinition, Schema, SchemaError, TypeDefinition, TypeKind, TypeRef,
};
