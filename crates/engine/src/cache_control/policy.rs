use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "lowercase")]
pub enum CacheScope {
    Public,
    Private,
}

/// Cache hint of a single field, or of a whole response when restored from a response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheHint {
    /// Seconds
    pub max_age: Option<u32>,
    pub scope: Option<CacheScope>,
}

impl CacheHint {
    pub fn max_age(max_age: u32) -> Self {
        CacheHint {
            max_age: Some(max_age),
            scope: None,
        }
    }

    pub fn scope(scope: CacheScope) -> Self {
        CacheHint {
            max_age: None,
            scope: Some(scope),
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: CacheScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// A cacheable policy, both dimensions are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheablePolicy {
    pub max_age: u32,
    pub scope: CacheScope,
}

impl fmt::Display for CacheablePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "max-age={}, {}", self.max_age, self.scope)
    }
}

/// Accumulator of cache hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: Option<u32>,
    pub scope: Option<CacheScope>,
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most restrictive wins: the smallest maxAge is kept and a private scope is never made
    /// public again.
    pub fn restrict(&mut self, hint: CacheHint) {
        if let Some(max_age) = hint.max_age {
            if self.max_age.is_none_or(|current| max_age < current) {
                self.max_age = Some(max_age);
            }
        }

        if let Some(scope) = hint.scope {
            if self.scope != Some(CacheScope::Private) {
                self.scope = Some(scope);
            }
        }
    }

    /// Overwrites every dimension defined by the hint.
    pub fn replace(&mut self, hint: CacheHint) {
        if let Some(max_age) = hint.max_age {
            self.max_age = Some(max_age);
        }

        if let Some(scope) = hint.scope {
            self.scope = Some(scope);
        }
    }

    pub fn policy_if_cacheable(&self) -> Option<CacheablePolicy> {
        match self.max_age {
            None | Some(0) => None,
            Some(max_age) => Some(CacheablePolicy {
                max_age,
                scope: self.scope.unwrap_or(CacheScope::Public),
            }),
        }
    }

    pub fn hint(&self) -> CacheHint {
        CacheHint {
            max_age: self.max_age,
            scope: self.scope,
        }
    }
}

impl From<CacheHint> for CachePolicy {
    fn from(hint: CacheHint) -> Self {
        CachePolicy {
            max_age: hint.max_age,
            scope: hint.scope,
        }
    }
}

/// Folds field hints into the overall policy of a response. Once a hint made the response
/// uncacheable nothing can make it cacheable again, so later hints are ignored.
#[derive(Debug, Default)]
pub struct PolicyUpdater {
    policy: CachePolicy,
    uncacheable: bool,
}

impl PolicyUpdater {
    pub fn update(&mut self, hint: CacheHint) {
        if self.uncacheable {
            return;
        }

        self.policy.restrict(hint);

        if self.policy.max_age == Some(0) {
            self.uncacheable = true;
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }
}
