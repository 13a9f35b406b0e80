//! HTTP client for the storefront API (`/api/v1/...`).

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_cart::CartProduct;
use storefront_core::{Money, OperationId, OrderId, ProductId, TenantId};
use storefront_offline::{
    FetchError, FetchedResponse, Fetcher, OfflineError, OperationSink, QueuedOperation, SyncError,
};
use storefront_orders::OrderPlaced;

use crate::ClientConfig;

pub const ORDERS_PATH: &str = "/api/v1/orders";
pub const PRODUCTS_PATH: &str = "/api/v1/products";
const HEALTH_PATH: &str = "/health";
const TENANT_HEADER: &str = "X-Tenant-ID";
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("api returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl ApiError {
    /// Whether repeating the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Status { status, .. } => is_transient_status(*status),
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(e) if e.is_connect() || e.is_timeout() => {
                SyncError::Offline(OfflineError::Offline)
            }
            ApiError::Status { status, body } if !is_transient_status(status) => {
                SyncError::Rejected {
                    status,
                    message: body,
                }
            }
            other => SyncError::Transient(other.to_string()),
        }
    }
}

/// A catalog product as listed by `GET /api/v1/products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<Product> for CartProduct {
    fn from(product: Product) -> Self {
        CartProduct {
            id: product.id,
            name: product.name,
            price: product.price,
            image_url: product.image_url,
        }
    }
}

/// Body of `POST /api/v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub order_id: OrderId,
    pub lines: Vec<CreateOrderLine>,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl From<&OrderPlaced> for CreateOrderRequest {
    fn from(placed: &OrderPlaced) -> Self {
        Self {
            order_id: placed.order_id,
            lines: placed
                .lines
                .iter()
                .map(|line| CreateOrderLine {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            total: placed.total,
        }
    }
}

/// Storefront API client scoped to one tenant.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tenant_id: TenantId,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tenant_id: TenantId) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant_id,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let client = Self::new(config.api_url.clone(), config.tenant_id);
        match &config.api_token {
            Some(token) => client.with_token(token.clone()),
            None => client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through; paths are joined onto the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, self.url(path))
            .header(TENANT_HEADER, self.tenant_id.to_string());
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Check connectivity by hitting the health endpoint.
    pub async fn health(&self) -> bool {
        self.request(Method::GET, HEALTH_PATH).send().await.is_ok()
    }

    pub async fn get_products(&self) -> Result<Vec<Product>, ApiError> {
        let resp = checked(self.request(Method::GET, PRODUCTS_PATH).send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn create_order(&self, order: &CreateOrderRequest) -> Result<(), ApiError> {
        self.post_json(ORDERS_PATH, order, None).await
    }

    /// `POST` a JSON body. `idempotency_key` lets the server drop replays.
    pub async fn post_json<T>(
        &self,
        path: &str,
        body: &T,
        idempotency_key: Option<OperationId>,
    ) -> Result<(), ApiError>
    where
        T: Serialize + ?Sized,
    {
        let mut req = self.request(Method::POST, path).json(body);
        if let Some(key) = idempotency_key {
            req = req.header(IDEMPOTENCY_HEADER, key.to_string());
        }
        checked(req.send().await?).await?;
        Ok(())
    }
}

async fn checked(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl OperationSink for ApiClient {
    async fn send(&self, operation: &QueuedOperation) -> Result<(), SyncError> {
        self.post_json(&operation.endpoint, &operation.payload, Some(operation.id))
            .await
            .map_err(SyncError::from)
    }

    async fn is_reachable(&self) -> bool {
        self.health().await
    }
}

#[async_trait]
impl Fetcher for ApiClient {
    async fn fetch(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        let resp = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.text().await.map_err(|e| FetchError::network(url, e))?;

        Ok(FetchedResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
