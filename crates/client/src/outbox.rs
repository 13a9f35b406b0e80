//! Routes placed orders to the API through the offline queue.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use storefront_events::{EventBus, EventHandler, Subscription};
use storefront_offline::{OfflineQueue, QueuedOperation};
use storefront_orders::{OrderEvent, OrderEventType, OrderPlaced};
use storefront_storage::KeyValueStore;

use crate::StorefrontError;
use crate::api::{CreateOrderRequest, ORDERS_PATH};

pub const CREATE_ORDER_OPERATION: &str = "order.create";

/// Queues an `order.create` API call for every placed order.
///
/// Orders always go through the queue, online or not; the sync worker
/// delivers them. [`crate::Storefront`] calls [`OrderOutbox::enqueue`] while
/// checking out so a failed write aborts the checkout; other shells can
/// [`attach`](OrderOutbox::attach) it to a bus instead.
pub struct OrderOutbox<S> {
    queue: Arc<OfflineQueue<S>>,
}

impl<S> OrderOutbox<S>
where
    S: KeyValueStore + 'static,
{
    pub fn new(queue: Arc<OfflineQueue<S>>) -> Self {
        Self { queue }
    }

    pub fn attach(self, bus: &EventBus<OrderEvent>) -> Subscription<OrderEvent> {
        bus.subscribe(OrderEventType::Placed, self)
    }

    /// Persist the `order.create` call for `placed`.
    pub fn enqueue(&self, placed: &OrderPlaced) -> Result<QueuedOperation, StorefrontError> {
        let payload = serde_json::to_value(CreateOrderRequest::from(placed))?;
        Ok(self
            .queue
            .enqueue(CREATE_ORDER_OPERATION, ORDERS_PATH, payload)?)
    }
}

#[async_trait]
impl<S> EventHandler<OrderEvent> for OrderOutbox<S>
where
    S: KeyValueStore + 'static,
{
    fn name(&self) -> &str {
        "order_outbox"
    }

    async fn handle(&self, event: &OrderEvent) -> anyhow::Result<()> {
        let OrderEvent::Placed(placed) = event else {
            return Ok(());
        };
        self.enqueue(placed)
            .with_context(|| format!("failed to queue order {}", placed.order_id))?;
        Ok(())
    }
}
