//! Client-side "my orders" read model fed from the order bus.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Money, OrderId};
use storefront_events::{Event, EventBus, EventHandler, Subscription};

use crate::{OrderEvent, OrderEventType, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub total: Money,
    pub line_count: usize,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Disposable projection of order events into per-order summaries.
///
/// Events for orders it never saw placed are ignored.
#[derive(Debug, Default)]
pub struct OrderHistory {
    orders: RwLock<HashMap<OrderId, OrderSummary>>,
}

impl OrderHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `history` to every order event type on `bus`.
    pub fn attach(history: Arc<Self>, bus: &EventBus<OrderEvent>) -> Vec<Subscription<OrderEvent>> {
        OrderEventType::ALL
            .into_iter()
            .map(|kind| {
                let handler: Arc<dyn EventHandler<OrderEvent>> = history.clone();
                bus.subscribe_arc(kind, handler)
            })
            .collect()
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderSummary> {
        let map = self.orders.read().ok()?;
        map.get(order_id).cloned()
    }

    /// All orders, newest first.
    pub fn list(&self) -> Vec<OrderSummary> {
        let map = match self.orders.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };
        let mut out: Vec<OrderSummary> = map.values().cloned().collect();
        out.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        out
    }

    fn apply(&self, event: &OrderEvent) {
        let Ok(mut map) = self.orders.write() else {
            return;
        };

        if let OrderEvent::Placed(e) = event {
            map.insert(
                e.order_id,
                OrderSummary {
                    order_id: e.order_id,
                    status: OrderStatus::Placed,
                    total: e.total,
                    line_count: e.lines.len(),
                    placed_at: e.occurred_at,
                    updated_at: e.occurred_at,
                },
            );
            return;
        }

        let Some(summary) = map.get_mut(&event.order_id()) else {
            tracing::debug!(order_id = %event.order_id(), "event for unknown order ignored");
            return;
        };
        summary.status = match event {
            OrderEvent::Placed(_) => OrderStatus::Placed,
            OrderEvent::Confirmed(_) => OrderStatus::Confirmed,
            OrderEvent::Paid(_) => OrderStatus::Paid,
            OrderEvent::Shipped(_) => OrderStatus::Shipped,
            OrderEvent::Delivered(_) => OrderStatus::Delivered,
            OrderEvent::Cancelled(_) => OrderStatus::Cancelled,
            OrderEvent::Refunded(_) => OrderStatus::Refunded,
        };
        summary.updated_at = event.occurred_at();
    }
}

#[async_trait]
impl EventHandler<OrderEvent> for OrderHistory {
    fn name(&self) -> &str {
        "order_history"
    }

    async fn handle(&self, event: &OrderEvent) -> anyhow::Result<()> {
        self.apply(event);
        Ok(())
    }
}
