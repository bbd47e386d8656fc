use std::sync::{Arc, Mutex, PoisonError, Weak};

use engine::Schema;

/// Remembers the id of the last schema seen, hashing the printed schema once per schema
/// rather than once per request.
#[derive(Default)]
pub struct SchemaIdCache {
    last: Mutex<Option<(Weak<Schema>, String)>>,
}

impl SchemaIdCache {
    pub fn get(&self, schema: &Arc<Schema>) -> String {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((cached, id)) = last.as_ref() {
            if cached.upgrade().is_some_and(|cached| Arc::ptr_eq(&cached, schema)) {
                return id.clone();
            }
        }

        let id = schema.executable_schema_id();
        *last = Some((Arc::downgrade(schema), id.clone()));

        id
    }
}
