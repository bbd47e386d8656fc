mod collector;
mod policy;

pub use collector::{CacheControlCollector, FieldCacheHint};
pub use policy::{CacheHint, CachePolicy, CacheScope, CacheablePolicy, PolicyUpdater};
