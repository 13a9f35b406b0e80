//! In-process publish/subscribe for domain events.
//!
//! The bus is an ordinary value: build one with [`EventBus::new`] and hand
//! clones of it to whatever needs to publish or subscribe. There is no global
//! instance.
//!
//! Delivery semantics:
//!
//! - Handlers registered for an event's kind run **sequentially**, each one
//!   awaited before the next starts, in registration order.
//! - A failing handler is logged and counted; the rest still run.
//! - No replay and no persistence. Events published with no subscribers are
//!   dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::{Event, EventHandler, FnHandler};

struct Registration<E: Event> {
    id: u64,
    handler: Arc<dyn EventHandler<E>>,
}

struct Registry<E: Event> {
    handlers: RwLock<HashMap<E::Kind, Vec<Registration<E>>>>,
    next_id: AtomicU64,
}

impl<E: Event> Registry<E> {
    // Every mutation is a single push or retain, so a poisoned table is still
    // consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<E::Kind, Vec<Registration<E>>>> {
        self.handlers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<E::Kind, Vec<Registration<E>>>> {
        self.handlers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, kind: E::Kind, id: u64) -> bool {
        let mut table = self.write();
        let Some(regs) = table.get_mut(&kind) else {
            return false;
        };
        let before = regs.len();
        regs.retain(|r| r.id != id);
        let removed = regs.len() != before;
        if regs.is_empty() {
            table.remove(&kind);
        }
        removed
    }
}

/// Outcome of a single [`EventBus::publish`] call.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that returned `Ok`.
    pub delivered: usize,
    /// Handlers that returned an error (already logged).
    pub failed: usize,
}

impl PublishReport {
    pub fn handled_by(&self) -> usize {
        self.delivered + self.failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Injectable event bus keyed by event kind.
///
/// Cloning is cheap and every clone shares the same handler table.
pub struct EventBus<E: Event> {
    inner: Arc<Registry<E>>,
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                handlers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler` for events of `kind`.
    ///
    /// The returned [`Subscription`] removes exactly this registration when
    /// [`Subscription::unsubscribe`] is called. Dropping it leaves the handler
    /// registered.
    pub fn subscribe<H>(&self, kind: E::Kind, handler: H) -> Subscription<E>
    where
        H: EventHandler<E> + 'static,
    {
        self.subscribe_arc(kind, Arc::new(handler))
    }

    /// Like [`EventBus::subscribe`], for a handler shared with other owners.
    pub fn subscribe_arc(&self, kind: E::Kind, handler: Arc<dyn EventHandler<E>>) -> Subscription<E> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(?kind, handler = handler.name(), id, "event handler subscribed");
        self.inner
            .write()
            .entry(kind)
            .or_default()
            .push(Registration { id, handler });

        Subscription {
            registry: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Register an async closure for events of `kind`.
    pub fn subscribe_fn<F, Fut>(&self, kind: E::Kind, name: &'static str, f: F) -> Subscription<E>
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(kind, FnHandler::new(name, f))
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// The handler list is snapshotted before the first handler runs, so a
    /// handler may subscribe or unsubscribe without deadlocking; such changes
    /// take effect from the next publish.
    pub async fn publish(&self, event: &E) -> PublishReport {
        let kind = event.kind();
        let handlers: Vec<Arc<dyn EventHandler<E>>> = {
            let table = self.inner.read();
            match table.get(&kind) {
                Some(regs) => regs.iter().map(|r| Arc::clone(&r.handler)).collect(),
                None => Vec::new(),
            }
        };

        let mut report = PublishReport::default();
        if handlers.is_empty() {
            tracing::debug!(event_type = event.event_type(), "no subscribers for event");
            return report;
        }

        for handler in handlers {
            match handler.handle(event).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        event_type = event.event_type(),
                        handler = handler.name(),
                        error = ?err,
                        "event handler failed"
                    );
                }
            }
        }

        tracing::debug!(
            event_type = event.event_type(),
            delivered = report.delivered,
            failed = report.failed,
            "event published"
        );
        report
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: E::Kind) -> usize {
        self.inner.read().get(&kind).map_or(0, Vec::len)
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Event> core::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kinds = self.inner.read().len();
        f.debug_struct("EventBus").field("kinds", &kinds).finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Holds only a weak reference to the bus, so it never keeps a dropped bus
/// alive.
pub struct Subscription<E: Event> {
    registry: Weak<Registry<E>>,
    kind: E::Kind,
    id: u64,
}

impl<E: Event> Subscription<E> {
    pub fn kind(&self) -> E::Kind {
        self.kind
    }

    /// Remove this handler from the bus.
    ///
    /// Returns `true` if it was still registered. Calling it again, or after
    /// the bus is gone, is a no-op returning `false`.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => {
                let removed = registry.remove(self.kind, self.id);
                if removed {
                    tracing::debug!(kind = ?self.kind, id = self.id, "event handler unsubscribed");
                }
                removed
            }
            None => false,
        }
    }
}

impl<E: Event> core::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}
