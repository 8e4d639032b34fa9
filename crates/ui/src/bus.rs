//! Message bus.
//!
//! A publish/subscribe relay keyed by event name. UI controls (URL submit,
//! refresh, color change, settings toggle) publish here and the relay
//! subscribes, so neither side holds a reference to the other.
//!
//! Besides exact names, handlers may subscribe to the universal wildcard `*`
//! or to a prefix pattern such as `setting.*`. Wildcard handlers receive the
//! published event name as their first argument.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Universal wildcard event name.
pub const WILDCARD: &str = "*";

/// Event handler.
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// A registered handler.
#[derive(Clone)]
struct Listener {
    id: u64,
    handler: Handler,
}

/// Handler tables, in subscription order.
#[derive(Default)]
struct Registry {
    events: IndexMap<String, Vec<Listener>>,
    next_id: u64,
}

impl Registry {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert(&mut self, event: &str, listener: Listener) {
        self.events.entry(event.to_string()).or_default().push(listener);
    }

    fn remove(&mut self, event: &str, id: u64) {
        if let Some(listeners) = self.events.get_mut(event) {
            listeners.retain(|l| l.id != id);
        }
    }

    /// Resolve every handler a publication of `event` reaches.
    fn plan(&self, event: &str) -> Vec<(Route, Vec<Handler>)> {
        let mut plan = Vec::new();
        let snapshot = |name: &str| -> Vec<Handler> {
            self.events
                .get(name)
                .map(|ls| ls.iter().map(|l| l.handler.clone()).collect())
                .unwrap_or_default()
        };

        plan.push((Route::Exact, snapshot(event)));

        if event.ends_with('*') {
            return plan;
        }

        plan.push((Route::Wildcard, snapshot(WILDCARD)));

        for (pattern, listeners) in &self.events {
            if pattern == WILDCARD || listeners.is_empty() {
                continue;
            }
            if pattern_matches(pattern, event) {
                plan.push((Route::Wildcard, snapshot(pattern)));
            }
        }

        plan
    }
}

/// How a handler receives its arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    /// Arguments passed through.
    Exact,
    /// Event name prepended to the arguments.
    Wildcard,
}

/// Whether a wildcard `pattern` matches a concrete event name.
///
/// The pattern's `.*` or `*` suffix is stripped and what remains must be a
/// strict prefix of the name, so `setting.*` also matches `settings`.
pub fn pattern_matches(pattern: &str, event: &str) -> bool {
    if event.ends_with('*') {
        return false;
    }

    let prefix = match pattern.strip_suffix(".*") {
        Some(prefix) => prefix,
        None => match pattern.strip_suffix('*') {
            Some(prefix) => prefix,
            None => return false,
        },
    };
    event != prefix && event.starts_with(prefix)
}

/// Process-wide publish/subscribe relay.
///
/// Cloning yields another handle to the same handler tables.
#[derive(Clone, Default)]
pub struct MessageBus {
    registry: Arc<Mutex<Registry>>,
}

impl MessageBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `event` (an exact name, `*`, or a prefix pattern).
    pub fn subscribe<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.allocate_id();
        registry.insert(event, Listener { id, handler: Arc::new(handler) });
        tracing::trace!(event, id, "subscribed");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            event: event.to_string(),
            id,
        }
    }

    /// Subscribe a handler that runs at most once.
    ///
    /// The subscription is removed before `handler` runs, so publishing the
    /// same event from inside `handler` does not trigger it again.
    pub fn once<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.allocate_id();
        let weak = Arc::downgrade(&self.registry);
        let name = event.to_string();
        let fired = AtomicBool::new(false);

        let wrapped = move |args: &[Value]| {
            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(registry) = weak.upgrade() {
                registry.lock().remove(&name, id);
            }
            handler(args);
        };

        registry.insert(event, Listener { id, handler: Arc::new(wrapped) });

        Subscription {
            registry: Arc::downgrade(&self.registry),
            event: event.to_string(),
            id,
        }
    }

    /// Publish `event` with `args`.
    ///
    /// Handlers run in subscription order: exact name, then `*`, then
    /// matching prefix patterns. All handler lists are snapshotted before the
    /// first handler runs, and no lock is held while handlers execute.
    pub fn publish(&self, event: &str, args: &[Value]) {
        let plan = self.registry.lock().plan(event);
        let count: usize = plan.iter().map(|(_, hs)| hs.len()).sum();
        tracing::trace!(event, handlers = count, "publishing");

        let mut prefixed: Option<Vec<Value>> = None;

        for (route, handlers) in plan {
            match route {
                Route::Exact => {
                    for handler in handlers {
                        handler(args);
                    }
                }
                Route::Wildcard => {
                    let with_name = prefixed.get_or_insert_with(|| {
                        let mut v = Vec::with_capacity(args.len() + 1);
                        v.push(Value::String(event.to_string()));
                        v.extend_from_slice(args);
                        v
                    });
                    for handler in handlers {
                        handler(with_name);
                    }
                }
            }
        }
    }

    /// Remove every handler.
    pub fn unsubscribe_all(&self) {
        let mut registry = self.registry.lock();
        for listeners in registry.events.values_mut() {
            listeners.clear();
        }
    }

    /// Number of handlers registered for exactly `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry.lock().events.get(event).map_or(0, Vec::len)
    }
}

/// Handle returned by [`MessageBus::subscribe`].
///
/// Dropping the handle keeps the handler registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Clone, Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event: String,
    id: u64,
}

impl Subscription {
    /// Remove the handler. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.event, self.id);
        }
    }

    /// The event name or pattern this handler listens on.
    pub fn event(&self) -> &str {
        &self.event
    }
}
