//! Lifecycle hooks.
//!
//! A [`Plugin`] lives as long as the server and creates a [`RequestListener`] for every request
//! it wants to observe. A request listener may in turn create an [`ExecutionListener`] which is
//! notified of every resolved field. Each listener declares the hooks it implements once, with
//! [`HookSet`], and the dispatcher only calls those.

mod dispatcher;

pub use dispatcher::{DeclaresHooks, DidEndHook, HookDispatcher};

use error::GraphqlError;

use crate::{
    cache_control::CachePolicy,
    context::RequestContext,
    execution::{FieldInfo, FieldOutcome},
    response::Response,
};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HookSet: u16 {
        const SERVER_WILL_START = 1;
        const SERVER_WILL_STOP = 1 << 1;
        const REQUEST_DID_START = 1 << 2;

        const DID_RESOLVE_SOURCE = 1 << 3;
        const PARSING_DID_START = 1 << 4;
        const VALIDATION_DID_START = 1 << 5;
        const DID_RESOLVE_OPERATION = 1 << 6;
        const RESPONSE_FOR_OPERATION = 1 << 7;
        const EXECUTION_DID_START = 1 << 8;
        const DID_ENCOUNTER_ERRORS = 1 << 9;
        const WILL_SEND_RESPONSE = 1 << 10;

        const WILL_RESOLVE_FIELD = 1 << 11;
        const EXECUTION_DID_END = 1 << 12;

        const PLUGIN = Self::SERVER_WILL_START.bits() | Self::SERVER_WILL_STOP.bits() | Self::REQUEST_DID_START.bits();
        const REQUEST = Self::DID_RESOLVE_SOURCE.bits()
            | Self::PARSING_DID_START.bits()
            | Self::VALIDATION_DID_START.bits()
            | Self::DID_RESOLVE_OPERATION.bits()
            | Self::RESPONSE_FOR_OPERATION.bits()
            | Self::EXECUTION_DID_START.bits()
            | Self::DID_ENCOUNTER_ERRORS.bits()
            | Self::WILL_SEND_RESPONSE.bits();
        const EXECUTION = Self::WILL_RESOLVE_FIELD.bits() | Self::EXECUTION_DID_END.bits();
    }
}

/// Called once parsing is over, with the syntax error if any.
pub type ParsingEnd = Box<dyn FnOnce(Option<&GraphqlError>) + Send>;

/// Called once validation is over, with the validation errors.
pub type ValidationEnd = Box<dyn FnOnce(&[GraphqlError]) + Send>;

/// Called once the value of a field has settled.
pub type FieldEnd = Box<dyn FnOnce(FieldOutcome<'_>) + Send>;

/// A response provided by a plugin instead of executing the operation.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: Response,
    /// Policy under which the response was stored. Kept as the overall policy of the request.
    pub cache_policy: Option<CachePolicy>,
}

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    fn hooks(&self) -> HookSet {
        HookSet::PLUGIN
    }

    async fn server_will_start(&self) {}

    async fn server_will_stop(&self) {}

    async fn request_did_start(&self, _ctx: &RequestContext) -> Option<Box<dyn RequestListener>> {
        None
    }
}

/// Observer of a single request. Every hook has a no-op default.
#[async_trait::async_trait]
pub trait RequestListener: Send + Sync {
    fn hooks(&self) -> HookSet {
        HookSet::REQUEST
    }

    /// The query text is known, either sent by the client or retrieved from the persisted
    /// query store.
    async fn did_resolve_source(&self, _ctx: &RequestContext) {}

    fn parsing_did_start(&self, _ctx: &RequestContext) -> Option<ParsingEnd> {
        None
    }

    fn validation_did_start(&self, _ctx: &RequestContext) -> Option<ValidationEnd> {
        None
    }

    /// Called even when no operation matched, `ctx.operation` is `None` then. Returning an
    /// error ends the request with it.
    async fn did_resolve_operation(&self, _ctx: &RequestContext) -> Result<(), GraphqlError> {
        Ok(())
    }

    /// The first listener to return a response skips the execution.
    async fn response_for_operation(&self, _ctx: &RequestContext) -> Option<CachedResponse> {
        None
    }

    async fn execution_did_start(&self, _ctx: &RequestContext) -> Option<Box<dyn ExecutionListener>> {
        None
    }

    async fn did_encounter_errors(&self, _ctx: &RequestContext, _errors: &[GraphqlError]) {}

    /// Always called exactly once per request, `ctx.response` is set.
    async fn will_send_response(&self, _ctx: &RequestContext) {}
}

pub trait ExecutionListener: Send + Sync {
    fn hooks(&self) -> HookSet {
        HookSet::EXECUTION
    }

    fn will_resolve_field(&self, _info: &FieldInfo<'_>) -> Option<FieldEnd> {
        None
    }

    fn execution_did_end(&self, _error: Option<&GraphqlError>) {}
}

impl DeclaresHooks for dyn Plugin {
    fn declared_hooks(&self) -> HookSet {
        Plugin::hooks(self)
    }
}

impl DeclaresHooks for dyn RequestListener {
    fn declared_hooks(&self) -> HookSet {
        RequestListener::hooks(self)
    }
}

impl DeclaresHooks for dyn ExecutionListener {
    fn declared_hooks(&self) -> HookSet {
        ExecutionListener::hooks(self)
    }
}
