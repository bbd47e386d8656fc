use std::sync::Arc;

use super::{RequestListeners, StageResult};
use crate::{
    context::RequestContext,
    document::ParsedDocument,
    engine::Engine,
    hooks::HookSet,
    validation,
};

impl Engine {
    /// Returns the parsed and validated document of the request, from the document cache when
    /// possible.
    pub(super) async fn acquire_document(
        &self,
        ctx: &RequestContext,
        listeners: &RequestListeners,
    ) -> StageResult<Arc<ParsedDocument>> {
        let source = ctx.source.as_deref().unwrap_or_default();
        let query_hash = ctx.query_hash.as_deref().unwrap_or_default();

        if let Some(cache) = &self.document_cache {
            match cache.get(query_hash).await {
                Ok(Some(document)) => {
                    tracing::debug!("document cache hit");
                    return Ok(document);
                }
                Ok(None) => (),
                Err(err) => tracing::warn!("document cache lookup failed, parsing the query instead: {err}"),
            }
        }

        let parsing_end =
            listeners.invoke_did_start_hook(HookSet::PARSING_DID_START, |listener| listener.parsing_did_start(ctx));

        let parsed = {
            let _span = tracing::info_span!("parse").entered();
            ParsedDocument::parse(source)
        };

        let document = match parsed {
            Ok(document) => {
                parsing_end.end(None);
                document
            }
            Err(error) => {
                parsing_end.end(Some(&error));
                return Err(vec![error]);
            }
        };

        let validation_end = listeners.invoke_did_start_hook(HookSet::VALIDATION_DID_START, |listener| {
            listener.validation_did_start(ctx)
        });

        let errors = {
            let _span = tracing::info_span!("validate").entered();
            validation::validate(&self.schema, &document, &self.validation_rules)
        };

        validation_end.end(&errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        if let Some(cache) = self.document_cache.clone() {
            let (key, document) = (query_hash.to_string(), document.clone());

            tokio::spawn(async move {
                if let Err(err) = cache.insert(key, document).await {
                    tracing::warn!("could not write to the document cache: {err}");
                }
            });
        }

        Ok(document)
    }
}
