//! `storefront-storage`: string key/value persistence for client state.
//!
//! The storefront keeps its durable client state (cart, offline queue, fetch
//! cache) in a flat key/value namespace, the way a browser keeps it in
//! `localStorage`. This crate provides that abstraction plus two backends:
//!
//! - [`InMemoryStore`]: tests/dev, with an optional byte quota to simulate a
//!   full store.
//! - [`FileStore`]: one JSON file per key under a (tenant-scoped) directory.

pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use error::StorageError;
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::{KeyValueStore, load_json, save_json};
