use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use serde_json::json;

use storefront_cart::CartProduct;
use storefront_client::api::{ORDERS_PATH, PRODUCTS_PATH};
use storefront_client::{ApiClient, ApiError, ClientConfig, CreateOrderRequest, Storefront};
use storefront_core::{Money, OrderId, ProductId, TenantId};
use storefront_offline::{
    FetchSource, OfflineQueue, OperationSink, OperationStatus, QueuedOperation, SyncError,
};
use storefront_storage::InMemoryStore;

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: String,
}

/// Canned responses keyed by `"METHOD /path"`; everything else is a 404.
#[derive(Clone, Default)]
struct Stub {
    routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Stub {
    fn respond(&self, method: Method, path: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{method} {path}"), (status, body.into()));
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, [(header::HeaderName, &'static str); 2], String) {
    let key = format!("{method} {}", uri.path());
    stub.requests.lock().unwrap().push(Recorded {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    });
    let (status, body) = stub
        .routes
        .lock()
        .unwrap()
        .get(&key)
        .cloned()
        .unwrap_or((404, "not found".to_string()));

    (
        StatusCode::from_u16(status).unwrap(),
        [
            (header::CONTENT_TYPE, "application/json"),
            // No pooled connections outlive `stop()`.
            (header::CONNECTION, "close"),
        ],
        body,
    )
}

struct TestServer {
    base_url: String,
    stub: Stub,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    async fn spawn() -> Self {
        let stub = Stub::default();
        let app = Router::new().fallback(record).with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            stub,
            handle: Some(handle),
        }
    }

    /// Shut the listener so later requests fail to connect.
    async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

fn header_value<'a>(request: &'a Recorded, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

fn queued_order(tenant_id: TenantId) -> QueuedOperation {
    let queue = OfflineQueue::open(InMemoryStore::new(), tenant_id).unwrap();
    queue
        .enqueue("order.create", ORDERS_PATH, json!({"order_id": "o-1"}))
        .unwrap()
}

const CATALOG: &str = r#"[
    {"id": "mug", "name": "Mug", "price": 1250, "image_url": "/mug.png"},
    {"id": "tee", "name": "T-shirt", "price": 2000}
]"#;

#[tokio::test]
async fn get_products_sends_tenant_and_bearer_headers() {
    let server = TestServer::spawn().await;
    server.stub.respond(Method::GET, PRODUCTS_PATH, 200, CATALOG);
    let tenant_id = TenantId::new();
    let api = ApiClient::new(&server.base_url, tenant_id).with_token("s3cret");

    let products = api.get_products().await.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].id, ProductId::new("mug").unwrap());
    assert_eq!(products[1].price, Money::from_minor(2000));

    let requests = server.stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(requests[0].path, PRODUCTS_PATH);
    assert_eq!(header_value(&requests[0], "authorization"), Some("Bearer s3cret"));
    let tenant = tenant_id.to_string();
    assert_eq!(header_value(&requests[0], "x-tenant-id"), Some(tenant.as_str()));
}

#[tokio::test]
async fn catalog_with_blank_product_id_is_refused() {
    let server = TestServer::spawn().await;
    server.stub.respond(
        Method::GET,
        PRODUCTS_PATH,
        200,
        r#"[{"id": "", "name": "Ghost", "price": 1}]"#,
    );
    let api = ApiClient::new(&server.base_url, TenantId::new());

    assert!(matches!(api.get_products().await, Err(ApiError::Network(_))));
}

#[tokio::test]
async fn create_order_posts_json_and_surfaces_error_statuses() {
    let server = TestServer::spawn().await;
    let api = ApiClient::new(&server.base_url, TenantId::new());
    let request = CreateOrderRequest {
        order_id: OrderId::new(),
        lines: Vec::new(),
        total: Money::from_minor(0),
    };

    server.stub.respond(Method::POST, ORDERS_PATH, 201, "{}");
    api.create_order(&request).await.unwrap();

    let requests = server.stub.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(header_value(&requests[0], "content-type"), Some("application/json"));
    assert_eq!(header_value(&requests[0], "authorization"), None);
    assert_eq!(header_value(&requests[0], "idempotency-key"), None);
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body["order_id"], request.order_id.to_string());

    server.stub.respond(Method::POST, ORDERS_PATH, 503, "maintenance");
    match api.create_order(&request).await {
        Err(err @ ApiError::Status { status: 503, .. }) => assert!(err.is_transient()),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn replayed_operations_carry_their_id_as_idempotency_key() {
    let server = TestServer::spawn().await;
    server.stub.respond(Method::POST, ORDERS_PATH, 201, "{}");
    let tenant_id = TenantId::new();
    let api = ApiClient::new(&server.base_url, tenant_id).with_token("s3cret");
    let op = queued_order(tenant_id);

    api.send(&op).await.unwrap();

    let requests = server.stub.requests();
    assert_eq!(requests[0].path, ORDERS_PATH);
    let key = op.id.to_string();
    assert_eq!(header_value(&requests[0], "idempotency-key"), Some(key.as_str()));
    assert_eq!(header_value(&requests[0], "authorization"), Some("Bearer s3cret"));
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body, op.payload);
}

#[tokio::test]
async fn client_errors_are_rejected_and_server_errors_transient() {
    let server = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let api = ApiClient::new(&server.base_url, tenant_id);
    let op = queued_order(tenant_id);

    server.stub.respond(Method::POST, ORDERS_PATH, 422, "invalid line");
    match api.send(&op).await {
        Err(SyncError::Rejected { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message, "invalid line");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    server.stub.respond(Method::POST, ORDERS_PATH, 503, "maintenance");
    assert!(matches!(api.send(&op).await, Err(SyncError::Transient(_))));

    server.stub.respond(Method::POST, ORDERS_PATH, 429, "slow down");
    assert!(matches!(api.send(&op).await, Err(SyncError::Transient(_))));
}

#[tokio::test]
async fn unreachable_server_reads_as_offline() {
    let mut server = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let api = ApiClient::new(&server.base_url, tenant_id);
    let op = queued_order(tenant_id);

    server.stop().await;

    assert!(matches!(api.send(&op).await, Err(SyncError::Offline(_))));
    assert!(!api.health().await);
}

#[tokio::test]
async fn catalog_is_served_from_cache_once_the_server_is_down() {
    let mut server = TestServer::spawn().await;
    server.stub.respond(Method::GET, PRODUCTS_PATH, 200, CATALOG);
    let dir = tempfile::tempdir().unwrap();
    let tenant_id = TenantId::new();
    let storefront = Storefront::open_with(
        ClientConfig::new(tenant_id, dir.path()),
        ApiClient::new(&server.base_url, tenant_id),
    )
    .unwrap();

    let online = storefront.products().await.unwrap();
    assert_eq!(online.len(), 2);
    assert_eq!(
        storefront.fetch(PRODUCTS_PATH).await.unwrap().source,
        FetchSource::Network
    );

    server.stop().await;

    let offline = storefront.products().await.unwrap();
    assert_eq!(offline, online);
    assert_eq!(
        storefront.fetch(PRODUCTS_PATH).await.unwrap().source,
        FetchSource::CacheFallback
    );

    let mug = CartProduct::from(offline[0].clone());
    storefront.cart().add_item(mug);
    assert_eq!(storefront.cart().snapshot().total, Money::from_minor(1250));
}

#[tokio::test]
async fn catalog_error_status_is_reported() {
    let server = TestServer::spawn().await;
    server.stub.respond(Method::GET, PRODUCTS_PATH, 500, "boom");
    let dir = tempfile::tempdir().unwrap();
    let tenant_id = TenantId::new();
    let storefront = Storefront::open_with(
        ClientConfig::new(tenant_id, dir.path()),
        ApiClient::new(&server.base_url, tenant_id),
    )
    .unwrap();

    assert!(matches!(
        storefront.products().await,
        Err(storefront_client::StorefrontError::Response { .. })
    ));
}

#[tokio::test]
async fn checkout_reaches_the_server_through_the_sync_worker() {
    let server = TestServer::spawn().await;
    server.stub.respond(Method::POST, ORDERS_PATH, 201, "{}");
    let dir = tempfile::tempdir().unwrap();
    let tenant_id = TenantId::new();
    let storefront = Storefront::open_with(
        ClientConfig::new(tenant_id, dir.path()),
        ApiClient::new(&server.base_url, tenant_id).with_token("s3cret"),
    )
    .unwrap();

    storefront.cart().add_item(CartProduct::new(
        ProductId::new("mug").unwrap(),
        "Mug",
        Money::from_minor(1250),
    ));
    let placed = storefront.checkout().await.unwrap();
    let queued = storefront.queue().list_pending();
    assert_eq!(queued.len(), 1);

    let report = storefront.sync_worker().sync_once().await.unwrap();
    assert_eq!(report.synced, vec![queued[0].id]);
    assert_eq!(
        storefront.queue().get(queued[0].id).unwrap().status,
        OperationStatus::Synced
    );

    let requests = server.stub.requests();
    assert_eq!(requests.len(), 1);
    let key = queued[0].id.to_string();
    assert_eq!(header_value(&requests[0], "idempotency-key"), Some(key.as_str()));
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body["order_id"], placed.order.id_typed().to_string());
    assert_eq!(body["total"], 1250);
}
