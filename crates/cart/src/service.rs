//! Cart operations and the store-backed implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Money, ProductId};
use storefront_storage::{KeyValueStore, save_json};

use crate::schema::{self, CART_STORAGE_KEY, PersistedCart};
use crate::{CartError, CartItem, CartProduct};

/// Whether the in-memory cart matches what is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PersistenceStatus {
    Clean,
    /// The last write failed; the in-memory cart is ahead of storage until a
    /// later write succeeds.
    Dirty { error: String, since: DateTime<Utc> },
}

impl PersistenceStatus {
    pub fn is_dirty(&self) -> bool {
        matches!(self, PersistenceStatus::Dirty { .. })
    }
}

/// Cart operations.
///
/// Mutations never fail: they always apply in memory. Implementations that
/// persist report durability through [`CartService::persistence`].
pub trait CartService: Send {
    /// Lines in the order they were first added.
    fn items(&self) -> &[CartItem];

    /// Add one unit of `product`: bumps the existing line's quantity, or
    /// appends a new line with quantity 1.
    fn add_item(&mut self, product: CartProduct);

    /// Remove the line for `id`. No-op if absent.
    fn remove_item(&mut self, id: &ProductId);

    /// Set the quantity of the line for `id`. Quantities below 1 remove the
    /// line. No-op if absent.
    fn update_quantity(&mut self, id: &ProductId, quantity: i64);

    fn clear(&mut self);

    fn persistence(&self) -> &PersistenceStatus;

    /// `Σ price × quantity`, in minor units.
    fn total(&self) -> Money {
        let total: Money = self.items().iter().map(CartItem::line_total).sum();
        if total.is_saturated() {
            tracing::warn!("cart total saturated");
        }
        total
    }

    /// Total number of units across all lines.
    fn item_count(&self) -> u64 {
        self.items().iter().map(|i| u64::from(i.quantity)).sum()
    }

    fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Remove and return every line (checkout).
    fn take_items(&mut self) -> Vec<CartItem> {
        let items = self.items().to_vec();
        self.clear();
        items
    }

    /// Put back lines returned by [`CartService::take_items`] when checkout
    /// is abandoned. Lines added in the meantime keep their place and have
    /// the returned quantity added to them.
    fn restore_items(&mut self, items: Vec<CartItem>) {
        for item in items {
            let existing = self
                .items()
                .iter()
                .find(|line| line.id == item.id)
                .map_or(0, |line| line.quantity);
            let quantity = existing.saturating_add(item.quantity);
            let id = item.id.clone();
            self.add_item(CartProduct {
                id: item.id,
                name: item.name,
                price: item.price,
                image_url: item.image_url,
            });
            self.update_quantity(&id, i64::from(quantity));
        }
    }
}

/// [`CartService`] persisted to a [`KeyValueStore`] under
/// [`CART_STORAGE_KEY`], rewriting the whole document after each change.
#[derive(Debug)]
pub struct StoredCartService<S> {
    store: S,
    items: Vec<CartItem>,
    persistence: PersistenceStatus,
}

impl<S> StoredCartService<S>
where
    S: KeyValueStore,
{
    /// Load the persisted cart, migrating older documents.
    pub fn try_load(store: S) -> Result<Self, CartError> {
        let items = schema::load(&store)?;
        tracing::debug!(lines = items.len(), "cart loaded");
        Ok(Self {
            store,
            items,
            persistence: PersistenceStatus::Clean,
        })
    }

    /// Like [`StoredCartService::try_load`], but starts with an empty cart
    /// when the stored document cannot be read.
    pub fn load(store: S) -> Self {
        match schema::load(&store) {
            Ok(items) => Self {
                store,
                items,
                persistence: PersistenceStatus::Clean,
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to load cart; starting empty");
                Self::empty(store)
            }
        }
    }

    /// Start with an empty cart without reading `store`.
    pub fn empty(store: S) -> Self {
        Self {
            store,
            items: Vec::new(),
            persistence: PersistenceStatus::Clean,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn position(&self, id: &ProductId) -> Option<usize> {
        self.items.iter().position(|i| &i.id == id)
    }

    fn persist(&mut self) {
        let doc = PersistedCart::current(self.items.clone());
        match save_json(&self.store, CART_STORAGE_KEY, &doc) {
            Ok(()) => {
                if self.persistence.is_dirty() {
                    tracing::info!("cart persistence recovered");
                }
                self.persistence = PersistenceStatus::Clean;
            }
            Err(err) => {
                tracing::error!(error = %err, lines = self.items.len(), "failed to persist cart");
                let since = match &self.persistence {
                    PersistenceStatus::Dirty { since, .. } => *since,
                    PersistenceStatus::Clean => Utc::now(),
                };
                self.persistence = PersistenceStatus::Dirty {
                    error: err.to_string(),
                    since,
                };
            }
        }
    }
}

impl<S> CartService for StoredCartService<S>
where
    S: KeyValueStore,
{
    fn items(&self) -> &[CartItem] {
        &self.items
    }

    fn add_item(&mut self, product: CartProduct) {
        match self.position(&product.id) {
            Some(idx) => {
                let line = &mut self.items[idx];
                line.quantity = line.quantity.saturating_add(1);
            }
            None => self.items.push(product.into_item()),
        }
        self.persist();
    }

    fn remove_item(&mut self, id: &ProductId) {
        let Some(idx) = self.position(id) else {
            return;
        };
        self.items.remove(idx);
        self.persist();
    }

    fn update_quantity(&mut self, id: &ProductId, quantity: i64) {
        if quantity < 1 {
            self.remove_item(id);
            return;
        }
        let Some(idx) = self.position(id) else {
            return;
        };
        self.items[idx].quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.persist();
    }

    fn clear(&mut self) {
        self.items.clear();
        self.persist();
    }

    fn persistence(&self) -> &PersistenceStatus {
        &self.persistence
    }
}
