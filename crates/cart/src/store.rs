//! Reactive cart container for UI layers.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use storefront_core::{Money, ProductId};

use crate::{CartItem, CartProduct, CartService, PersistenceStatus};

/// Everything a cart widget renders, recomputed after every mutation.
///
/// Only `items` is persisted (by the wrapped service); the rest is derived or
/// transient UI state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub total: Money,
    pub item_count: u64,
    /// Whether the cart drawer is open.
    pub is_open: bool,
    pub persistence: PersistenceStatus,
}

struct State<C> {
    cart: C,
    is_open: bool,
}

/// Wraps a [`CartService`] and notifies subscribers on every change.
///
/// Subscribers get a `watch` receiver: they always see the latest snapshot,
/// and intermediate snapshots may be skipped if they fall behind.
///
/// Mutations call the wrapped service under a `std::sync::Mutex`, so a
/// service that persists to disk blocks the calling thread for the write.
/// Async callers with slow storage should mutate from
/// `tokio::task::spawn_blocking`.
pub struct CartStore<C> {
    state: Mutex<State<C>>,
    tx: watch::Sender<CartSnapshot>,
}

impl<C> CartStore<C>
where
    C: CartService,
{
    pub fn new(cart: C) -> Self {
        let state = State {
            cart,
            is_open: false,
        };
        let (tx, _rx) = watch::channel(snapshot_of(&state));
        Self {
            state: Mutex::new(state),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> CartSnapshot {
        self.tx.borrow().clone()
    }

    pub fn add_item(&self, product: CartProduct) -> CartSnapshot {
        self.update(|s| s.cart.add_item(product)).1
    }

    pub fn remove_item(&self, id: &ProductId) -> CartSnapshot {
        self.update(|s| s.cart.remove_item(id)).1
    }

    pub fn update_quantity(&self, id: &ProductId, quantity: i64) -> CartSnapshot {
        self.update(|s| s.cart.update_quantity(id, quantity)).1
    }

    pub fn clear(&self) -> CartSnapshot {
        self.update(|s| s.cart.clear()).1
    }

    pub fn set_open(&self, open: bool) -> CartSnapshot {
        self.update(|s| s.is_open = open).1
    }

    pub fn toggle_open(&self) -> CartSnapshot {
        self.update(|s| s.is_open = !s.is_open).1
    }

    /// Atomically remove every line and return them (checkout).
    pub fn take_items(&self) -> Vec<CartItem> {
        self.update(|s| s.cart.take_items()).0
    }

    /// Return lines taken by [`CartStore::take_items`] to the cart.
    pub fn restore_items(&self, items: Vec<CartItem>) -> CartSnapshot {
        self.update(|s| s.cart.restore_items(items)).1
    }

    /// Run `f` against the wrapped service, then publish.
    pub fn with_cart<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        self.update(|s| f(&mut s.cart)).0
    }

    fn lock(&self) -> MutexGuard<'_, State<C>> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn update<R>(&self, f: impl FnOnce(&mut State<C>) -> R) -> (R, CartSnapshot) {
        let mut state = self.lock();
        let out = f(&mut *state);
        let snapshot = snapshot_of(&*state);
        // Published while still locked so snapshots reach subscribers in
        // mutation order.
        self.tx.send_replace(snapshot.clone());
        (out, snapshot)
    }
}

impl<C> core::fmt::Debug for CartStore<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CartStore")
            .field("snapshot", &*self.tx.borrow())
            .finish()
    }
}

fn snapshot_of<C: CartService>(state: &State<C>) -> CartSnapshot {
    CartSnapshot {
        items: state.cart.items().to_vec(),
        total: state.cart.total(),
        item_count: state.cart.item_count(),
        is_open: state.is_open,
        persistence: state.cart.persistence().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoredCartService;
    use storefront_storage::InMemoryStore;

    fn product(id: &str, price: u64) -> CartProduct {
        CartProduct::new(ProductId::new(id).unwrap(), id, Money::from_minor(price))
    }

    fn store() -> CartStore<StoredCartService<InMemoryStore>> {
        CartStore::new(StoredCartService::empty(InMemoryStore::new()))
    }

    #[test]
    fn snapshot_reflects_mutations() {
        let store = store();
        store.add_item(product("a", 300));
        let snap = store.add_item(product("a", 300));
        assert_eq!(snap.item_count, 2);
        assert_eq!(snap.total, Money::from_minor(600));
        assert_eq!(store.snapshot(), snap);
    }

    #[tokio::test]
    async fn subscribers_are_notified() {
        let store = store();
        let mut rx = store.subscribe();
        assert!(rx.borrow_and_update().items.is_empty());

        store.add_item(product("a", 100));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().items.len(), 1);

        store.toggle_open();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_open);
    }

    #[test]
    fn drawer_state_is_not_persisted() {
        let shared = std::sync::Arc::new(InMemoryStore::new());
        let store = CartStore::new(StoredCartService::empty(std::sync::Arc::clone(&shared)));
        store.add_item(product("a", 100));
        store.set_open(true);

        let reloaded = CartStore::new(StoredCartService::load(shared));
        let snap = reloaded.snapshot();
        assert_eq!(snap.items.len(), 1);
        assert!(!snap.is_open);
    }

    #[test]
    fn take_items_clears_and_publishes() {
        let store = store();
        store.add_item(product("a", 100));
        let rx = store.subscribe();

        let taken = store.take_items();
        assert_eq!(taken.len(), 1);
        assert!(rx.has_changed().unwrap());
        assert!(store.snapshot().items.is_empty());
    }

    #[test]
    fn restored_lines_are_published() {
        let store = store();
        store.add_item(product("a", 100));
        let taken = store.take_items();
        let rx = store.subscribe();

        let snap = store.restore_items(taken);
        assert!(rx.has_changed().unwrap());
        assert_eq!(snap.item_count, 1);
        assert_eq!(snap.total, Money::from_minor(100));
    }

    #[test]
    fn with_cart_exposes_the_service() {
        let store = store();
        store.add_item(product("a", 100));
        let total = store.with_cart(|cart| cart.total());
        assert_eq!(total, Money::from_minor(100));
    }
}
