use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, warn};

use crate::handler::ErasedHandler;

struct Entry {
    id: u64,
    handler: ErasedHandler,
}

#[derive(Default)]
struct RegistryInner {
    handlers: RwLock<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

/// Channel name → handler map shared between the server and its connections.
///
/// Lookups clone the handler out so no lock is held across handler execution.
#[derive(Clone, Default)]
pub(crate) struct HandlerRegistry {
    inner: Arc<RegistryInner>,
}

impl HandlerRegistry {
    /// Insert `handler` for `channel`, replacing any existing handler.
    pub(crate) fn insert(&self, channel: &str, handler: ErasedHandler) -> Registration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string(), Entry { id, handler })
            .is_some();

        if replaced {
            warn!(channel, "replacing existing handler for channel");
        } else {
            debug!(channel, "registered handler");
        }

        Registration {
            registry: Arc::downgrade(&self.inner),
            channel: channel.to_string(),
            id,
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn get(&self, channel: &str) -> Option<ErasedHandler> {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// Remove whatever handler is bound to `channel`. Returns whether one was.
    pub(crate) fn remove(&self, channel: &str) -> bool {
        let removed = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel)
            .is_some();
        if removed {
            debug!(channel, "deregistered handler");
        }
        removed
    }
}

/// Token returned by [`IpcServer::register_handler`](crate::IpcServer::register_handler).
///
/// [`dispose`](Self::dispose) removes the handler it registered. Dropping the
/// token without disposing leaves the handler in place.
#[derive(Debug)]
pub struct Registration {
    registry: Weak<RegistryInner>,
    channel: String,
    id: u64,
    disposed: AtomicBool,
}

impl Registration {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Remove the registered handler. Idempotent.
    ///
    /// If the channel was re-registered since, the newer handler is kept.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(inner) = self.registry.upgrade() else {
            return;
        };

        let mut handlers = inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if handlers
            .get(&self.channel)
            .is_some_and(|entry| entry.id == self.id)
        {
            handlers.remove(&self.channel);
            debug!(channel = %self.channel, "disposed handler registration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{erase, handler_fn, HandlerError};
    use serde_json::{json, Value};

    fn constant(value: Value) -> ErasedHandler {
        erase(handler_fn(move |_| {
            let value = value.clone();
            async move { Ok::<_, HandlerError>(value) }
        }))
    }

    async fn call(registry: &HandlerRegistry, channel: &str) -> Option<Value> {
        let handler = registry.get(channel)?;
        Some(handler(Value::Null).await.expect("handler should succeed"))
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let registry = HandlerRegistry::default();
        let _registration = registry.insert("a", constant(json!(1)));
        assert_eq!(call(&registry, "a").await, Some(json!(1)));
        assert!(registry.get("b").is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_replaces() {
        let registry = HandlerRegistry::default();
        let _first = registry.insert("a", constant(json!(1)));
        let _second = registry.insert("a", constant(json!(2)));
        assert_eq!(call(&registry, "a").await, Some(json!(2)));
    }

    #[test]
    fn dispose_removes_and_is_idempotent() {
        let registry = HandlerRegistry::default();
        let registration = registry.insert("a", constant(json!(1)));

        registration.dispose();
        assert!(registration.is_disposed());
        assert!(registry.get("a").is_none());

        registration.dispose();
        assert!(registry.get("a").is_none());
    }

    #[tokio::test]
    async fn stale_token_does_not_evict_replacement() {
        let registry = HandlerRegistry::default();
        let first = registry.insert("a", constant(json!(1)));
        let _second = registry.insert("a", constant(json!(2)));

        first.dispose();
        assert_eq!(call(&registry, "a").await, Some(json!(2)));
    }

    #[test]
    fn second_dispose_does_not_touch_reregistered_channel() {
        let registry = HandlerRegistry::default();
        let first = registry.insert("a", constant(json!(1)));
        first.dispose();

        let _again = registry.insert("a", constant(json!(3)));
        first.dispose();
        assert!(registry.get("a").is_some());
    }

    #[test]
    fn remove_by_name() {
        let registry = HandlerRegistry::default();
        let registration = registry.insert("a", constant(json!(1)));
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));

        registration.dispose();
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn dispose_after_registry_dropped_is_noop() {
        let registry = HandlerRegistry::default();
        let registration = registry.insert("a", constant(json!(1)));
        drop(registry);
        registration.dispose();
        assert!(registration.is_disposed());
    }
}
