use error::{ErrorCode, GraphqlError};

use crate::{context::RequestContext, document::query_hash, engine::Engine};

impl Engine {
    /// Determines the query text of the request and its hash, retrieving it from the persisted
    /// query store when only a hash was sent.
    pub(super) async fn resolve_source(&self, ctx: &RequestContext) -> Result<(String, String), GraphqlError> {
        let query = ctx.request.query.as_deref().filter(|query| !query.is_empty());

        let Some(ext) = &ctx.request.extensions.persisted_query else {
            let Some(query) = query else {
                return Err(GraphqlError::new("Must provide query string.", ErrorCode::BadRequest));
            };

            return Ok((query.to_string(), query_hash(query)));
        };

        let Some(store) = &self.persisted_queries else {
            return Err(GraphqlError::new(
                "PersistedQueryNotSupported",
                ErrorCode::PersistedQueryNotSupported,
            ));
        };

        if ext.version != 1 {
            return Err(GraphqlError::new(
                "Unsupported persisted query version",
                ErrorCode::BadRequest,
            ));
        }

        let Some(query) = query else {
            return match store.get(&ext.sha256_hash).await {
                Ok(Some(query)) => {
                    ctx.metrics.set_persisted_query_hit(true);
                    Ok((query, ext.sha256_hash.clone()))
                }
                Ok(None) => Err(persisted_query_not_found()),
                Err(err) => {
                    tracing::warn!("could not read from the persisted query store: {err}");
                    Err(persisted_query_not_found())
                }
            };
        };

        let computed_hash = query_hash(query);
        if !computed_hash.eq_ignore_ascii_case(&ext.sha256_hash) {
            return Err(GraphqlError::new(
                "provided sha does not match query",
                ErrorCode::BadRequest,
            ));
        }

        ctx.metrics.set_persisted_query_register(true);

        Ok((query.to_string(), computed_hash))
    }

    /// Stores the query of the request in the background. The request never waits for it.
    pub(super) fn register_persisted_query(&self, ctx: &RequestContext) {
        let (Some(store), Some(source), Some(hash)) = (&self.persisted_queries, &ctx.source, &ctx.query_hash) else {
            return;
        };

        let (store, source, hash) = (store.clone(), source.clone(), hash.clone());

        tokio::spawn(async move {
            if let Err(err) = store.set(&hash, &source).await {
                tracing::warn!("could not register the persisted query: {err}");
            }
        });
    }
}

fn persisted_query_not_found() -> GraphqlError {
    GraphqlError::new("PersistedQueryNotFound", ErrorCode::PersistedQueryNotFound)
}
