//! Checkout: turn the cart into a placed order and announce it.

use chrono::Utc;

use storefront_cart::{CartItem, CartService, CartStore};
use storefront_core::{Aggregate, DomainError, DomainResult, OrderId, TenantId};
use storefront_events::{EventBus, PublishReport};

use crate::{Order, OrderCommand, OrderEvent, OrderLine, OrderPlaced, PlaceOrder};

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    /// Delivery outcome of the `order.placed` event.
    pub report: PublishReport,
}

/// Places orders for one tenant and publishes the resulting events on the
/// injected bus.
#[derive(Debug, Clone)]
pub struct Checkout {
    tenant_id: TenantId,
    bus: EventBus<OrderEvent>,
}

impl Checkout {
    pub fn new(tenant_id: TenantId, bus: EventBus<OrderEvent>) -> Self {
        Self { tenant_id, bus }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Place an order for everything in `cart` and empty it.
    ///
    /// An empty cart is rejected and left untouched.
    pub async fn place_order<C>(&self, cart: &mut C) -> DomainResult<PlacedOrder>
    where
        C: CartService + ?Sized,
    {
        if cart.is_empty() {
            return Err(DomainError::validation("cannot check out an empty cart"));
        }
        let items = cart.take_items();
        self.finish(items).await
    }

    /// Same as [`Checkout::place_order`] for a cart behind a [`CartStore`];
    /// the lines are taken atomically so concurrent adds are never lost.
    pub async fn place_order_from_store<C>(&self, store: &CartStore<C>) -> DomainResult<PlacedOrder>
    where
        C: CartService,
    {
        self.place_order_from_store_with(store, |_| Ok::<(), DomainError>(()))
            .await
    }

    /// Like [`Checkout::place_order_from_store`], but hands the
    /// `order.placed` event to `commit` before anything is published.
    ///
    /// If `commit` fails the order is abandoned: the lines go back into the
    /// cart, nothing is published and the error is returned.
    pub async fn place_order_from_store_with<C, F, E>(
        &self,
        store: &CartStore<C>,
        commit: F,
    ) -> Result<PlacedOrder, E>
    where
        C: CartService,
        F: FnOnce(&OrderPlaced) -> Result<(), E>,
        E: From<DomainError>,
    {
        let items = store.take_items();
        if items.is_empty() {
            return Err(DomainError::validation("cannot check out an empty cart").into());
        }

        let (order, events) = match self.decide(&items) {
            Ok(decided) => decided,
            Err(err) => {
                store.restore_items(items);
                return Err(err.into());
            }
        };

        let placed = events.iter().find_map(|event| match event {
            OrderEvent::Placed(placed) => Some(placed),
            _ => None,
        });
        if let Some(placed) = placed {
            if let Err(err) = commit(placed) {
                tracing::warn!(
                    order_id = %order.id_typed(),
                    "checkout abandoned; lines returned to the cart"
                );
                store.restore_items(items);
                return Err(err);
            }
        }

        Ok(self.publish(order, &events).await)
    }

    async fn finish(&self, items: Vec<CartItem>) -> DomainResult<PlacedOrder> {
        let (order, events) = self.decide(&items)?;
        Ok(self.publish(order, &events).await)
    }

    fn decide(&self, items: &[CartItem]) -> DomainResult<(Order, Vec<OrderEvent>)> {
        let order_id = OrderId::new();
        let mut order = Order::empty(order_id);
        let events = order.execute(&OrderCommand::PlaceOrder(PlaceOrder {
            tenant_id: self.tenant_id,
            order_id,
            lines: items.iter().cloned().map(OrderLine::from).collect(),
            occurred_at: Utc::now(),
        }))?;
        Ok((order, events))
    }

    async fn publish(&self, order: Order, events: &[OrderEvent]) -> PlacedOrder {
        let mut report = PublishReport::default();
        for event in events {
            let r = self.bus.publish(event).await;
            report.delivered += r.delivered;
            report.failed += r.failed;
        }

        tracing::info!(
            order_id = %order.id_typed(),
            total = %order.total(),
            lines = order.lines().len(),
            "order placed"
        );
        PlacedOrder { order, report }
    }
}
