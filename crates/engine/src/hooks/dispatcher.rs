use std::future::Future;

use error::GraphqlError;

use super::{FieldEnd, HookSet, ParsingEnd, ValidationEnd};
use crate::execution::FieldOutcome;

pub trait DeclaresHooks {
    fn declared_hooks(&self) -> HookSet;
}

/// Fans hooks out to an ordered list of listeners. The hooks of each listener are read once,
/// when the dispatcher is built.
pub struct HookDispatcher<L: ?Sized> {
    listeners: Vec<(Box<L>, HookSet)>,
}

impl<L: ?Sized> Default for HookDispatcher<L> {
    fn default() -> Self {
        HookDispatcher { listeners: Vec::new() }
    }
}

impl<L: ?Sized + DeclaresHooks> FromIterator<Box<L>> for HookDispatcher<L> {
    fn from_iter<I: IntoIterator<Item = Box<L>>>(iter: I) -> Self {
        HookDispatcher {
            listeners: iter
                .into_iter()
                .map(|listener| {
                    let hooks = listener.declared_hooks();
                    (listener, hooks)
                })
                .collect(),
        }
    }
}

impl<L: ?Sized> HookDispatcher<L> {
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    fn with_hook(&self, hook: HookSet) -> impl Iterator<Item = &L> {
        self.listeners
            .iter()
            .filter(move |(_, hooks)| hooks.contains(hook))
            .map(|(listener, _)| listener.as_ref())
    }

    /// Runs the hook of every listener concurrently and waits for all of them.
    pub async fn invoke_hook<'a, F, Fut>(&'a self, hook: HookSet, f: F)
    where
        F: FnMut(&'a L) -> Fut,
        Fut: Future<Output = ()>,
    {
        futures::future::join_all(self.with_hook(hook).map(f)).await;
    }

    /// Calls the start hooks in registration order. The returned [`DidEndHook`] calls the end
    /// callbacks in the reverse order.
    pub fn invoke_did_start_hook<'a, E>(&'a self, hook: HookSet, f: impl FnMut(&'a L) -> Option<E>) -> DidEndHook<E> {
        DidEndHook {
            callbacks: self.with_hook(hook).filter_map(f).collect(),
        }
    }

    /// Asks each listener in turn, the first answer wins and the remaining listeners are not
    /// called.
    pub async fn invoke_hook_until_some<'a, T, F, Fut>(&'a self, hook: HookSet, mut f: F) -> Option<T>
    where
        F: FnMut(&'a L) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for listener in self.with_hook(hook) {
            if let Some(value) = f(listener).await {
                return Some(value);
            }
        }

        None
    }

    /// Runs the hook of every listener concurrently. If any failed, the error of the first
    /// listener in registration order is returned.
    pub async fn try_invoke_hook<'a, E, F, Fut>(&'a self, hook: HookSet, f: F) -> Result<(), E>
    where
        F: FnMut(&'a L) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        futures::future::join_all(self.with_hook(hook).map(f))
            .await
            .into_iter()
            .collect()
    }

    /// Same as [`Self::invoke_hook`] but collects what each listener returned, in registration
    /// order.
    pub async fn collect_hook<'a, T, F, Fut>(&'a self, hook: HookSet, f: F) -> Vec<T>
    where
        F: FnMut(&'a L) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        futures::future::join_all(self.with_hook(hook).map(f))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Calls the hook of every listener in reverse registration order.
    pub fn invoke_hook_reversed<'a>(&'a self, hook: HookSet, mut f: impl FnMut(&'a L)) {
        for (listener, hooks) in self.listeners.iter().rev() {
            if hooks.contains(hook) {
                f(listener.as_ref());
            }
        }
    }
}

/// End callbacks collected by [`HookDispatcher::invoke_did_start_hook`]. The last registered
/// listener is the first to be notified.
#[must_use]
pub struct DidEndHook<E> {
    callbacks: Vec<E>,
}

impl<E> DidEndHook<E> {
    fn into_reversed(self) -> impl Iterator<Item = E> {
        self.callbacks.into_iter().rev()
    }
}

impl DidEndHook<ParsingEnd> {
    pub fn end(self, error: Option<&GraphqlError>) {
        for callback in self.into_reversed() {
            callback(error);
        }
    }
}

impl DidEndHook<ValidationEnd> {
    pub fn end(self, errors: &[GraphqlError]) {
        for callback in self.into_reversed() {
            callback(errors);
        }
    }
}

impl DidEndHook<FieldEnd> {
    pub fn end(self, outcome: FieldOutcome<'_>) {
        for callback in self.into_reversed() {
            callback(outcome);
        }
    }
}
