use std::sync::Arc;

use storefront_cart::CartProduct;
use storefront_client::{
    ApiClient, CREATE_ORDER_OPERATION, ClientConfig, Storefront, StorefrontError,
};
use storefront_core::{DomainError, Money, ProductId, TenantId};
use storefront_offline::{OFFLINE_QUEUE_KEY, OperationStatus, QueueError};
use storefront_orders::{OrderEventType, OrderStatus};

fn mug() -> CartProduct {
    CartProduct::new(ProductId::new("mug").unwrap(), "Mug", Money::from_minor(1250))
}

fn config(dir: &tempfile::TempDir, tenant_id: TenantId) -> ClientConfig {
    ClientConfig::new(tenant_id, dir.path())
}

fn open(config: ClientConfig) -> Storefront {
    // Nothing listens here; these tests never reach the network.
    let api = ApiClient::new("http://127.0.0.1:9", config.tenant_id);
    Storefront::open_with(config, api).unwrap()
}

#[tokio::test]
async fn checkout_queues_order_and_empties_cart() {
    let dir = tempfile::tempdir().unwrap();
    let storefront = open(config(&dir, TenantId::new()));

    storefront.cart().add_item(mug());
    storefront.cart().add_item(mug());
    assert_eq!(storefront.cart().snapshot().total, Money::from_minor(2500));

    let placed = storefront.checkout().await.unwrap();
    let order_id = placed.order.id_typed();
    assert!(placed.report.all_succeeded());
    assert!(storefront.cart().snapshot().items.is_empty());

    let summary = storefront.history().get(&order_id).unwrap();
    assert_eq!(summary.status, OrderStatus::Placed);

    let pending = storefront.queue().list_pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, CREATE_ORDER_OPERATION);
    assert_eq!(pending[0].status, OperationStatus::Pending);
    assert_eq!(pending[0].payload["total"], 2500);
}

#[tokio::test]
async fn empty_cart_checkout_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let storefront = open(config(&dir, TenantId::new()));

    let err = storefront.checkout().await.unwrap_err();
    assert!(matches!(
        err,
        StorefrontError::Domain(DomainError::Validation(_))
    ));
    assert!(storefront.queue().is_empty());
}

#[tokio::test]
async fn cart_and_queue_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let tenant_id = TenantId::new();

    {
        let storefront = open(config(&dir, tenant_id));
        storefront.cart().add_item(mug());
        storefront.checkout().await.unwrap();
        storefront.cart().add_item(mug());
        storefront.close();
    }

    let reopened = open(config(&dir, tenant_id));
    let snapshot = reopened.cart().snapshot();
    assert_eq!(snapshot.item_count, 1);
    assert_eq!(reopened.queue().len(), 1);
}

#[tokio::test]
async fn tenants_do_not_share_state() {
    let dir = tempfile::tempdir().unwrap();
    let acme = open(config(&dir, TenantId::new()));
    let globex = open(config(&dir, TenantId::new()));

    acme.cart().add_item(mug());

    assert_eq!(acme.cart().snapshot().item_count, 1);
    assert!(globex.cart().snapshot().items.is_empty());
}

#[tokio::test]
async fn extra_subscribers_see_placed_orders() {
    let dir = tempfile::tempdir().unwrap();
    let storefront = open(config(&dir, TenantId::new()));
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

    let sink = seen.clone();
    let _sub = storefront
        .events()
        .subscribe_fn(OrderEventType::Placed, "analytics", move |event| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(event.order_id());
                anyhow::Ok(())
            }
        });

    storefront.cart().add_item(mug());
    let placed = storefront.checkout().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![placed.order.id_typed()]);
    // order history plus the extra subscriber
    assert_eq!(placed.report.delivered, 2);
}

#[tokio::test]
async fn checkout_fails_and_keeps_the_cart_when_the_order_cannot_be_queued() {
    let dir = tempfile::tempdir().unwrap();
    let tenant_id = TenantId::new();
    let storefront = open(config(&dir, tenant_id));
    storefront.cart().add_item(mug());

    // A directory where the queue file belongs makes every queue write fail.
    let queue_file = dir
        .path()
        .join("tenants")
        .join(tenant_id.to_string())
        .join(format!("{OFFLINE_QUEUE_KEY}.json"));
    let _ = std::fs::remove_file(&queue_file);
    std::fs::create_dir_all(queue_file.join("occupied")).unwrap();

    let err = storefront.checkout().await.unwrap_err();
    assert!(matches!(err, StorefrontError::Queue(QueueError::Storage(_))));

    let snapshot = storefront.cart().snapshot();
    assert_eq!(snapshot.item_count, 1);
    assert_eq!(snapshot.total, Money::from_minor(1250));
    assert!(storefront.queue().is_empty());
    assert!(storefront.history().list().is_empty());
}
