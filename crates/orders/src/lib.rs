//! Orders: the order event family, the order lifecycle aggregate, and
//! checkout (cart → placed order).
//!
//! Order events are published on an injected
//! [`EventBus<OrderEvent>`](storefront_events::EventBus); nothing here is
//! persisted.

pub mod checkout;
pub mod events;
pub mod history;
pub mod order;

pub use checkout::{Checkout, PlacedOrder};
pub use events::{
    OrderCancelled, OrderConfirmed, OrderDelivered, OrderEvent, OrderEventType, OrderPaid,
    OrderPlaced, OrderRefunded, OrderShipped,
};
pub use history::{OrderHistory, OrderSummary};
pub use order::{
    CancelOrder, ConfirmOrder, MarkDelivered, Order, OrderCommand, OrderLine, OrderStatus,
    PlaceOrder, RecordPayment, RefundOrder, ShipOrder,
};
