pub mod document_cache;
pub mod kv;
pub mod persisted_queries;
