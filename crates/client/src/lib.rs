//! `storefront-client`
//!
//! Wires the storefront building blocks into one per-tenant context:
//!
//! - a persisted, reactive cart ([`Cart`])
//! - checkout publishing order events on an injected bus
//! - an outbox that queues every placed order for the API
//! - a sync worker replaying the queue when online
//! - a fetch cache in front of the API for catalog reads
//!
//! Nothing here is global: open as many [`Storefront`]s as there are
//! tenants, each with its own storage directory.

pub mod api;
pub mod config;
pub mod outbox;

use std::sync::Arc;

use thiserror::Error;

use storefront_cart::{CartStore, StoredCartService};
use storefront_core::{DomainError, TenantId};
use storefront_events::{EventBus, Subscription};
use storefront_offline::{
    FetchCache, FetchError, FetchOutcome, OfflineMode, OfflineQueue, QueueError, ShutdownHandle,
    SyncWorker,
};
use storefront_orders::{Checkout, OrderEvent, OrderHistory, PlacedOrder};
use storefront_storage::{FileStore, StorageError};

pub use api::{ApiClient, ApiError, CreateOrderLine, CreateOrderRequest, Product};
pub use config::{ClientConfig, ConfigError};
pub use outbox::{CREATE_ORDER_OPERATION, OrderOutbox};

/// Storage shared by everything belonging to one tenant.
pub type TenantStore = Arc<FileStore>;

/// The cart as the UI sees it.
pub type Cart = CartStore<StoredCartService<TenantStore>>;

#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unexpected response from {url}: {message}")]
    Response { url: String, message: String },
}

/// Per-tenant storefront context.
pub struct Storefront {
    config: ClientConfig,
    cart: Cart,
    bus: EventBus<OrderEvent>,
    checkout: Checkout,
    history: Arc<OrderHistory>,
    queue: Arc<OfflineQueue<TenantStore>>,
    offline: Arc<OfflineMode>,
    api: ApiClient,
    outbox: OrderOutbox<TenantStore>,
    fetch_cache: FetchCache<TenantStore>,
    subscriptions: Vec<Subscription<OrderEvent>>,
}

impl Storefront {
    /// Open the tenant's local state under `config.data_dir` and wire it up.
    pub fn open(config: ClientConfig) -> Result<Self, StorefrontError> {
        let api = ApiClient::from_config(&config);
        Self::open_with(config, api)
    }

    pub fn open_with(config: ClientConfig, api: ApiClient) -> Result<Self, StorefrontError> {
        let tenant_id = config.tenant_id;
        let store: TenantStore = Arc::new(FileStore::for_tenant(&config.data_dir, tenant_id)?);

        let cart = CartStore::new(StoredCartService::load(store.clone()));
        let queue = Arc::new(OfflineQueue::open(store.clone(), tenant_id)?);
        let max_age = chrono::Duration::from_std(config.fetch_max_age)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let fetch_cache = FetchCache::new(store, max_age);

        let bus = EventBus::new();
        let history = Arc::new(OrderHistory::new());
        let subscriptions = OrderHistory::attach(history.clone(), &bus);
        let outbox = OrderOutbox::new(queue.clone());

        tracing::info!(
            tenant_id = %tenant_id,
            data_dir = %config.data_dir.display(),
            api_url = %config.api_url,
            "storefront opened"
        );

        Ok(Self {
            checkout: Checkout::new(tenant_id, bus.clone()),
            config,
            cart,
            bus,
            history,
            queue,
            offline: Arc::new(OfflineMode::new()),
            api,
            outbox,
            fetch_cache,
            subscriptions,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.config.tenant_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The order event bus; subscribe here to react to checkouts.
    pub fn events(&self) -> &EventBus<OrderEvent> {
        &self.bus
    }

    pub fn history(&self) -> &OrderHistory {
        &self.history
    }

    pub fn queue(&self) -> &OfflineQueue<TenantStore> {
        &self.queue
    }

    pub fn offline(&self) -> &OfflineMode {
        &self.offline
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Place an order for the cart contents. The order reaches the API via
    /// the offline queue.
    ///
    /// The `order.create` call is queued before the order is announced. If
    /// it cannot be persisted the checkout fails and the cart keeps its lines.
    pub async fn checkout(&self) -> Result<PlacedOrder, StorefrontError> {
        let placed = self
            .checkout
            .place_order_from_store_with(&self.cart, |placed| {
                self.outbox.enqueue(placed).map(|_| ())
            })
            .await?;
        if !placed.report.all_succeeded() {
            tracing::warn!(
                order_id = %placed.order.id_typed(),
                failed = ?placed.report.failed,
                "order placed but some subscribers failed"
            );
        }
        Ok(placed)
    }

    /// `GET` through the fetch cache using the strategy the URL calls for.
    pub async fn fetch(&self, path: &str) -> Result<FetchOutcome, FetchError> {
        self.fetch_cache.get(&self.api, &self.api.url(path)).await
    }

    /// The product catalog; served from cache when the API is unreachable.
    pub async fn products(&self) -> Result<Vec<Product>, StorefrontError> {
        let outcome = self.fetch(api::PRODUCTS_PATH).await?;
        if !(200..300).contains(&outcome.status) {
            return Err(StorefrontError::Response {
                url: self.api.url(api::PRODUCTS_PATH),
                message: format!("status {}", outcome.status),
            });
        }
        serde_json::from_str(&outcome.body).map_err(|e| StorefrontError::Response {
            url: self.api.url(api::PRODUCTS_PATH),
            message: e.to_string(),
        })
    }

    /// A worker replaying this tenant's queue to the API.
    pub fn sync_worker(&self) -> SyncWorker<TenantStore> {
        SyncWorker::new(
            self.queue.clone(),
            Arc::new(self.api.clone()),
            self.offline.clone(),
        )
        .with_interval(self.config.sync_interval)
    }

    /// Spawn the sync worker on the current runtime.
    pub fn start_sync(&self) -> (tokio::task::JoinHandle<()>, ShutdownHandle) {
        let worker = self.sync_worker();
        let shutdown = worker.shutdown_handle();
        (worker.spawn(), shutdown)
    }

    /// Detach the internal subscribers from the bus.
    pub fn close(self) {
        for sub in &self.subscriptions {
            sub.unsubscribe();
        }
        tracing::info!(tenant_id = %self.config.tenant_id, "storefront closed");
    }
}

impl core::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Storefront")
            .field("tenant_id", &self.config.tenant_id)
            .field("data_dir", &self.config.data_dir)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}
