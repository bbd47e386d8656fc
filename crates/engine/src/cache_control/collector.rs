use std::sync::{Arc, Mutex, PoisonError};

use gateway_config::CacheControlConfig;

use super::{CacheHint, CachePolicy, PolicyUpdater};
use crate::{execution::FieldInfo, schema::Schema};

/// Derives a cache hint for every resolved field and folds them into the overall policy of the
/// response.
pub struct CacheControlCollector {
    schema: Arc<Schema>,
    default_max_age: u32,
    updater: Mutex<PolicyUpdater>,
}

/// Hint of a field being resolved. The resolver may refine it until the field ends.
#[derive(Debug, Clone)]
pub struct FieldCacheHint {
    policy: CachePolicy,
    inherit_max_age: bool,
    composite: bool,
    root: bool,
}

impl FieldCacheHint {
    pub fn replace(&mut self, hint: CacheHint) {
        self.policy.replace(hint);
    }

    pub fn restrict(&mut self, hint: CacheHint) {
        self.policy.restrict(hint);
    }

    pub fn hint(&self) -> CacheHint {
        self.policy.hint()
    }

    /// The hint folded into the response policy. Root fields and composite fields which do not
    /// inherit their maxAge fall back to the default maxAge. Scalars without a hint inherit the
    /// cacheability of their parent and contribute nothing.
    fn finalize(&self, default_max_age: u32) -> CacheHint {
        let mut policy = self.policy;

        if policy.max_age.is_none() && ((self.composite && !self.inherit_max_age) || self.root) {
            policy.restrict(CacheHint::max_age(default_max_age));
        }

        policy.hint()
    }
}

impl CacheControlCollector {
    pub fn new(schema: Arc<Schema>, config: &CacheControlConfig) -> Self {
        CacheControlCollector {
            schema,
            default_max_age: config.default_max_age,
            updater: Mutex::new(PolicyUpdater::default()),
        }
    }

    pub fn start_field(&self, info: &FieldInfo<'_>) -> FieldCacheHint {
        let field = self.schema.field(info.parent_type, info.field_name);
        let return_type = field
            .map(|field| field.ty.named.as_str())
            .unwrap_or_else(|| named_type(info.return_type));
        let return_type = self.schema.get_type(return_type);

        let mut policy = CachePolicy::new();
        let mut inherit_max_age = false;
        let composite = return_type.is_some_and(|ty| ty.kind.is_composite());

        if let Some(annotation) = return_type.filter(|ty| ty.kind.is_composite()).and_then(|ty| ty.cache_control) {
            policy.replace(CacheHint {
                max_age: annotation.max_age,
                scope: annotation.scope,
            });
            inherit_max_age = annotation.inherit_max_age;
        }

        if let Some(annotation) = field.and_then(|field| field.cache_control) {
            if annotation.inherit_max_age && policy.max_age.is_none() {
                inherit_max_age = true;

                if let Some(scope) = annotation.scope {
                    policy.replace(CacheHint::scope(scope));
                }
            } else {
                policy.replace(CacheHint {
                    max_age: annotation.max_age,
                    scope: annotation.scope,
                });
            }
        }

        FieldCacheHint {
            policy,
            inherit_max_age,
            composite,
            root: info.path.is_root_field(),
        }
    }

    pub fn end_field(&self, hint: &FieldCacheHint) {
        let hint = hint.finalize(self.default_max_age);
        self.updater.lock().unwrap_or_else(PoisonError::into_inner).update(hint);
    }

    /// Overall policy of the response, computed from every field that ended so far.
    pub fn finish(&self) -> CachePolicy {
        self.updater.lock().unwrap_or_else(PoisonError::into_inner).policy()
    }
}

fn named_type(ty: &str) -> &str {
    ty.trim_matches(|c| matches!(c, '[' | ']' | '!'))
}
