//! Client-side shopping cart.
//!
//! - [`CartService`]: the cart operations (add / remove / update / clear / total)
//! - [`StoredCartService`]: a `CartService` persisted to a key/value store
//! - [`schema`]: the versioned on-disk document and its migrations
//! - [`CartStore`]: reactive wrapper that pushes a [`CartSnapshot`] on every mutation

pub mod error;
pub mod item;
pub mod schema;
pub mod service;
pub mod store;

pub use error::{CartError, SchemaError};
pub use item::{CartItem, CartProduct};
pub use schema::{CART_STORAGE_KEY, CURRENT_VERSION, LEGACY_CART_KEY, PersistedCart};
pub use service::{CartService, PersistenceStatus, StoredCartService};
pub use store::{CartSnapshot, CartStore};
