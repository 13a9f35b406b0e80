//! `storefront-offline`
//!
//! **Responsibility:** keep the storefront usable while the network is not.
//!
//! - [`OfflineMode`]: shared connectivity flag
//! - [`OfflineQueue`]: durable FIFO of API writes recorded while offline
//! - [`SyncWorker`]: replays the queue with exponential backoff
//! - [`FetchCache`]: cache-first / network-first response caching

pub mod connectivity;
pub mod fetch_cache;
pub mod queue;
pub mod sync;

pub use connectivity::{ConnectivityState, OfflineError, OfflineMode};
pub use fetch_cache::{
    CachedResponse, FetchCache, FetchError, FetchOutcome, FetchSource, FetchStrategy,
    FetchedResponse, Fetcher,
};
pub use queue::{OFFLINE_QUEUE_KEY, OfflineQueue, OperationStatus, QueueError, QueuedOperation};
pub use sync::{Backoff, OperationSink, ShutdownHandle, SyncError, SyncReport, SyncWorker};
