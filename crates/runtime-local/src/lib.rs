mod document_cache;
mod kv;

pub use document_cache::InMemoryDocumentCache;
pub use kv::InMemoryKvStore;
