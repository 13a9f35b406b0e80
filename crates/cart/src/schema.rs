//! Versioned persisted cart document.
//!
//! Current layout (version 1), stored under [`CART_STORAGE_KEY`]:
//!
//! ```json
//! { "version": 1, "updated_at": "2026-01-01T00:00:00Z",
//!   "items": [{ "id": "sku-1", "name": "Mug", "price": 1250, "quantity": 2 }] }
//! ```
//!
//! Version 0 is everything written before the document was versioned:
//!
//! - a bare JSON array of items under [`LEGACY_CART_KEY`]
//! - `{ "state": { "items": [...] }, "version": 0 }` under [`CART_STORAGE_KEY`]
//!
//! Version 0 items carry the price as a decimal in major units (`12.5`), an
//! `image` field, and ids that may be numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storefront_core::{Money, ProductId};
use storefront_storage::{KeyValueStore, save_json};

use crate::{CartError, CartItem, SchemaError};

pub const CART_STORAGE_KEY: &str = "cart-storage";
pub const LEGACY_CART_KEY: &str = "cart_items";
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    pub version: u32,
    pub items: Vec<CartItem>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedCart {
    pub fn current(items: Vec<CartItem>) -> Self {
        Self {
            version: CURRENT_VERSION,
            items,
            updated_at: Utc::now(),
        }
    }
}

/// A stored document brought up to [`CURRENT_VERSION`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migrated {
    pub cart: PersistedCart,
    /// Version found in storage.
    pub from_version: u64,
    /// Lines dropped (invalid) or merged (duplicate id) while normalizing.
    pub repaired: usize,
}

impl Migrated {
    /// Whether the stored bytes differ from what would be written now.
    pub fn needs_rewrite(&self) -> bool {
        self.from_version != u64::from(CURRENT_VERSION) || self.repaired > 0
    }
}

/// Parse a stored document of any known version.
pub fn migrate(raw: &str) -> Result<Migrated, SchemaError> {
    let value: Value = serde_json::from_str(raw).map_err(SchemaError::Malformed)?;

    match value {
        Value::Array(items) => Ok(from_v0(items, 0)),
        Value::Object(mut map) => {
            let version = map.get("version").and_then(Value::as_u64).unwrap_or(0);
            if version > u64::from(CURRENT_VERSION) {
                return Err(SchemaError::UnsupportedVersion {
                    found: version,
                    supported: CURRENT_VERSION,
                });
            }

            if version == u64::from(CURRENT_VERSION) && !map.contains_key("state") {
                let cart: PersistedCart =
                    serde_json::from_value(Value::Object(map)).map_err(SchemaError::Malformed)?;
                let (items, repaired) = normalize(cart.items);
                return Ok(Migrated {
                    cart: PersistedCart { items, ..cart },
                    from_version: version,
                    repaired,
                });
            }

            let items = match map.remove("state") {
                Some(Value::Object(mut state)) => state.remove("items"),
                _ => map.remove("items"),
            };
            match items {
                Some(Value::Array(items)) => Ok(from_v0(items, version)),
                None | Some(Value::Null) => Ok(from_v0(Vec::new(), version)),
                Some(_) => Err(SchemaError::Malformed(serde::de::Error::custom(
                    "`items` must be an array",
                ))),
            }
        }
        _ => Err(SchemaError::Malformed(serde::de::Error::custom(
            "expected a JSON array or object",
        ))),
    }
}

/// Load the cart from `store`, migrating and re-persisting older documents.
///
/// A legacy [`LEGACY_CART_KEY`] entry is only consulted when there is no
/// [`CART_STORAGE_KEY`] document, and is removed once its contents have been
/// rewritten in the current format.
pub fn load<S>(store: &S) -> Result<Vec<CartItem>, CartError>
where
    S: KeyValueStore + ?Sized,
{
    if let Some(raw) = store.get(CART_STORAGE_KEY)? {
        let migrated = migrate(&raw)?;
        if migrated.needs_rewrite() {
            tracing::info!(
                from_version = migrated.from_version,
                repaired = migrated.repaired,
                "migrating persisted cart"
            );
            if let Err(err) = save_json(store, CART_STORAGE_KEY, &migrated.cart) {
                tracing::error!(error = %err, "failed to rewrite migrated cart");
            }
        }
        return Ok(migrated.cart.items);
    }

    let Some(raw) = store.get(LEGACY_CART_KEY)? else {
        return Ok(Vec::new());
    };

    let migrated = migrate(&raw)?;
    tracing::info!(
        items = migrated.cart.items.len(),
        repaired = migrated.repaired,
        "migrating legacy cart key"
    );
    match save_json(store, CART_STORAGE_KEY, &migrated.cart) {
        Ok(()) => {
            if let Err(err) = store.remove(LEGACY_CART_KEY) {
                tracing::warn!(error = %err, "failed to remove legacy cart key");
            }
        }
        // Keep the legacy key so the next load retries.
        Err(err) => tracing::error!(error = %err, "failed to persist migrated legacy cart"),
    }
    Ok(migrated.cart.items)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyId {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
struct LegacyItem {
    id: LegacyId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: f64,
    #[serde(default = "one")]
    quantity: f64,
    #[serde(default, alias = "image_url", alias = "imageUrl")]
    image: Option<String>,
}

fn one() -> f64 {
    1.0
}

impl LegacyItem {
    fn into_item(self) -> Option<CartItem> {
        let id = match self.id {
            LegacyId::Text(s) => s,
            LegacyId::Number(n) => n.to_string(),
        };
        let id = ProductId::new(id).ok()?;

        if !self.price.is_finite() || self.price < 0.0 {
            return None;
        }
        let quantity = self.quantity.trunc();
        if !quantity.is_finite() || quantity < 1.0 {
            return None;
        }

        Some(CartItem {
            id,
            name: self.name,
            // `as` saturates for out-of-range floats.
            price: Money::from_minor((self.price * 100.0).round() as u64),
            quantity: quantity as u32,
            image_url: self.image,
        })
    }
}

fn from_v0(raw_items: Vec<Value>, from_version: u64) -> Migrated {
    let total = raw_items.len();
    let items: Vec<CartItem> = raw_items
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<LegacyItem>(v) {
            Ok(item) => item.into_item(),
            Err(err) => {
                tracing::warn!(error = %err, "dropping unreadable legacy cart line");
                None
            }
        })
        .collect();
    let unreadable = total - items.len();

    let (items, repaired) = normalize(items);
    Migrated {
        cart: PersistedCart::current(items),
        from_version,
        repaired: repaired + unreadable,
    }
}

/// Enforce the line invariants: quantity >= 1 and one line per product id.
/// Duplicates are merged into the first occurrence by summing quantities.
fn normalize(items: Vec<CartItem>) -> (Vec<CartItem>, usize) {
    let mut out: Vec<CartItem> = Vec::with_capacity(items.len());
    let mut repaired = 0;
    for item in items {
        if item.quantity < 1 {
            repaired += 1;
            continue;
        }
        match out.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                repaired += 1;
            }
            None => out.push(item),
        }
    }
    (out, repaired)
}
