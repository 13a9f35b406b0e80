//! Order domain events.
//!
//! The set of event types is closed ([`OrderEventType`]). On the wire an
//! event is `{ "event_type": "order.placed", "payload": { ... } }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Money, OrderId, TenantId};
use storefront_events::Event;

use crate::order::OrderLine;

/// The fixed set of order event types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderEventType {
    #[serde(rename = "order.placed")]
    Placed,
    #[serde(rename = "order.confirmed")]
    Confirmed,
    #[serde(rename = "order.paid")]
    Paid,
    #[serde(rename = "order.shipped")]
    Shipped,
    #[serde(rename = "order.delivered")]
    Delivered,
    #[serde(rename = "order.cancelled")]
    Cancelled,
    #[serde(rename = "order.refunded")]
    Refunded,
}

impl OrderEventType {
    pub const ALL: [OrderEventType; 7] = [
        OrderEventType::Placed,
        OrderEventType::Confirmed,
        OrderEventType::Paid,
        OrderEventType::Shipped,
        OrderEventType::Delivered,
        OrderEventType::Cancelled,
        OrderEventType::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventType::Placed => "order.placed",
            OrderEventType::Confirmed => "order.confirmed",
            OrderEventType::Paid => "order.paid",
            OrderEventType::Shipped => "order.shipped",
            OrderEventType::Delivered => "order.delivered",
            OrderEventType::Cancelled => "order.cancelled",
            OrderEventType::Refunded => "order.refunded",
        }
    }
}

impl core::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown order event type '{s}'"))
    }
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaid {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub amount: Money,
    pub payment_reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub tracking_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRefunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefunded {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum OrderEvent {
    #[serde(rename = "order.placed")]
    Placed(OrderPlaced),
    #[serde(rename = "order.confirmed")]
    Confirmed(OrderConfirmed),
    #[serde(rename = "order.paid")]
    Paid(OrderPaid),
    #[serde(rename = "order.shipped")]
    Shipped(OrderShipped),
    #[serde(rename = "order.delivered")]
    Delivered(OrderDelivered),
    #[serde(rename = "order.cancelled")]
    Cancelled(OrderCancelled),
    #[serde(rename = "order.refunded")]
    Refunded(OrderRefunded),
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::Placed(e) => e.order_id,
            OrderEvent::Confirmed(e) => e.order_id,
            OrderEvent::Paid(e) => e.order_id,
            OrderEvent::Shipped(e) => e.order_id,
            OrderEvent::Delivered(e) => e.order_id,
            OrderEvent::Cancelled(e) => e.order_id,
            OrderEvent::Refunded(e) => e.order_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            OrderEvent::Placed(e) => e.tenant_id,
            OrderEvent::Confirmed(e) => e.tenant_id,
            OrderEvent::Paid(e) => e.tenant_id,
            OrderEvent::Shipped(e) => e.tenant_id,
            OrderEvent::Delivered(e) => e.tenant_id,
            OrderEvent::Cancelled(e) => e.tenant_id,
            OrderEvent::Refunded(e) => e.tenant_id,
        }
    }
}

impl Event for OrderEvent {
    type Kind = OrderEventType;

    fn kind(&self) -> OrderEventType {
        match self {
            OrderEvent::Placed(_) => OrderEventType::Placed,
            OrderEvent::Confirmed(_) => OrderEventType::Confirmed,
            OrderEvent::Paid(_) => OrderEventType::Paid,
            OrderEvent::Shipped(_) => OrderEventType::Shipped,
            OrderEvent::Delivered(_) => OrderEventType::Delivered,
            OrderEvent::Cancelled(_) => OrderEventType::Cancelled,
            OrderEvent::Refunded(_) => OrderEventType::Refunded,
        }
    }

    fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed(e) => e.occurred_at,
            OrderEvent::Confirmed(e) => e.occurred_at,
            OrderEvent::Paid(e) => e.occurred_at,
            OrderEvent::Shipped(e) => e.occurred_at,
            OrderEvent::Delivered(e) => e.occurred_at,
            OrderEvent::Cancelled(e) => e.occurred_at,
            OrderEvent::Refunded(e) => e.occurred_at,
        }
    }
}
