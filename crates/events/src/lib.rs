//! In-process domain events: the `Event` contract and an injectable `EventBus`.

pub mod bus;
pub mod event;
pub mod handler;

pub use bus::{EventBus, PublishReport, Subscription};
pub use event::Event;
pub use handler::{EventHandler, FnHandler};
