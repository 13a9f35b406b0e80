use std::future::Future;

use async_trait::async_trait;

use crate::Event;

/// Consumes events of one family.
///
/// Handlers are awaited one at a time by [`crate::EventBus::publish`]. A
/// returned error is logged by the bus and does not stop delivery to the
/// remaining handlers.
#[async_trait]
pub trait EventHandler<E>: Send + Sync
where
    E: Event,
{
    /// Name used in logs when the handler fails.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, event: &E) -> anyhow::Result<()>;
}

/// Adapts an async closure into an [`EventHandler`].
///
/// The closure receives an owned clone of the event, so the future it returns
/// never borrows from the publisher.
pub struct FnHandler<F> {
    name: &'static str,
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> core::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<E, F, Fut> EventHandler<E> for FnHandler<F>
where
    E: Event,
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(&self, event: &E) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}
