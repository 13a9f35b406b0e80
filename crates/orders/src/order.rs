use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_cart::CartItem;
use storefront_core::{Aggregate, AggregateRoot, DomainError, Money, OrderId, ProductId, TenantId};

use crate::events::{
    OrderCancelled, OrderConfirmed, OrderDelivered, OrderEvent, OrderPaid, OrderPlaced,
    OrderRefunded, OrderShipped,
};

/// Order status lifecycle.
///
/// `Placed → Confirmed → Paid → Shipped → Delivered`, with `Cancelled`
/// reachable before payment and `Refunded` after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

/// Order line: a cart line frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

impl From<CartItem> for OrderLine {
    fn from(item: CartItem) -> Self {
        Self {
            product_id: item.id,
            name: item.name,
            unit_price: item.price,
            quantity: item.quantity,
        }
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    tenant_id: Option<TenantId>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total: Money,
    paid: Money,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            status: OrderStatus::Placed,
            lines: Vec::new(),
            total: Money::ZERO,
            paid: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn paid(&self) -> Money {
        self.paid
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, OrderStatus::Placed | OrderStatus::Confirmed)
    }

    pub fn is_refundable(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub amount: Money,
    pub payment_reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub tracking_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDelivered {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RefundOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ConfirmOrder(ConfirmOrder),
    RecordPayment(RecordPayment),
    ShipOrder(ShipOrder),
    MarkDelivered(MarkDelivered),
    CancelOrder(CancelOrder),
    RefundOrder(RefundOrder),
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::Placed(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.status = OrderStatus::Placed;
                self.lines = e.lines.clone();
                self.total = e.total;
                self.created = true;
            }
            OrderEvent::Confirmed(_) => self.status = OrderStatus::Confirmed,
            OrderEvent::Paid(e) => {
                self.status = OrderStatus::Paid;
                self.paid = e.amount;
            }
            OrderEvent::Shipped(_) => self.status = OrderStatus::Shipped,
            OrderEvent::Delivered(_) => self.status = OrderStatus::Delivered,
            OrderEvent::Cancelled(_) => self.status = OrderStatus::Cancelled,
            OrderEvent::Refunded(_) => self.status = OrderStatus::Refunded,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ConfirmOrder(cmd) => {
                self.ensure_target(cmd.tenant_id, cmd.order_id)?;
                self.ensure_status(OrderStatus::Placed, "only placed orders can be confirmed")?;
                Ok(vec![OrderEvent::Confirmed(OrderConfirmed {
                    tenant_id: cmd.tenant_id,
                    order_id: cmd.order_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            OrderCommand::RecordPayment(cmd) => self.handle_payment(cmd),
            OrderCommand::ShipOrder(cmd) => {
                self.ensure_target(cmd.tenant_id, cmd.order_id)?;
                self.ensure_status(OrderStatus::Paid, "only paid orders can be shipped")?;
                Ok(vec![OrderEvent::Shipped(OrderShipped {
                    tenant_id: cmd.tenant_id,
                    order_id: cmd.order_id,
                    tracking_number: cmd.tracking_number.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            OrderCommand::MarkDelivered(cmd) => {
                self.ensure_target(cmd.tenant_id, cmd.order_id)?;
                self.ensure_status(OrderStatus::Shipped, "only shipped orders can be delivered")?;
                Ok(vec![OrderEvent::Delivered(OrderDelivered {
                    tenant_id: cmd.tenant_id,
                    order_id: cmd.order_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            OrderCommand::CancelOrder(cmd) => {
                self.ensure_target(cmd.tenant_id, cmd.order_id)?;
                if !self.is_cancellable() {
                    return Err(DomainError::invariant(
                        "orders can only be cancelled before payment",
                    ));
                }
                Ok(vec![OrderEvent::Cancelled(OrderCancelled {
                    tenant_id: cmd.tenant_id,
                    order_id: cmd.order_id,
                    reason: cmd.reason.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            OrderCommand::RefundOrder(cmd) => self.handle_refund(cmd),
        }
    }
}

impl Order {
    fn ensure_target(&self, tenant_id: TenantId, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: OrderStatus, msg: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(msg));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already placed"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot place an order without lines"));
        }
        if cmd.lines.iter().any(|l| l.quantity == 0) {
            return Err(DomainError::validation("line quantity must be positive"));
        }

        let total: Money = cmd.lines.iter().map(OrderLine::line_total).sum();

        Ok(vec![OrderEvent::Placed(OrderPlaced {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            lines: cmd.lines.clone(),
            total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_payment(&self, cmd: &RecordPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.order_id)?;
        self.ensure_status(OrderStatus::Confirmed, "only confirmed orders can be paid")?;

        if cmd.amount != self.total {
            return Err(DomainError::validation(format!(
                "payment amount {} does not match order total {}",
                cmd.amount, self.total
            )));
        }

        Ok(vec![OrderEvent::Paid(OrderPaid {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            amount: cmd.amount,
            payment_reference: cmd.payment_reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refund(&self, cmd: &RefundOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.order_id)?;

        if !self.is_refundable() {
            return Err(DomainError::invariant("only paid orders can be refunded"));
        }
        if cmd.amount == Money::ZERO || cmd.amount > self.paid {
            return Err(DomainError::validation(
                "refund amount must be positive and at most the amount paid",
            ));
        }

        Ok(vec![OrderEvent::Refunded(OrderRefunded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }
}
