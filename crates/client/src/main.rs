//! Headless sync agent: replays the tenant's offline queue until Ctrl-C.

use storefront_client::{ClientConfig, Storefront};
use storefront_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let format = std::env::var("STOREFRONT_LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    storefront_observability::init_with_format(format);

    let config = ClientConfig::from_env()?;
    let storefront = Storefront::open(config)?;

    let (worker, shutdown) = storefront.start_sync();
    tracing::info!(
        tenant_id = %storefront.tenant_id(),
        pending = storefront.queue().list_pending().len(),
        "sync agent running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    shutdown.shutdown();
    worker.await?;

    storefront.close();
    Ok(())
}
