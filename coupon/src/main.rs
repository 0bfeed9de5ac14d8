use std::net::SocketAddr;
use std::sync::Arc;

use common::error::{ApiError, ApiResult};
use common::StorageKind;

use coupon::models::{MemoryCouponStore, PgCouponStore};
use coupon::router;
use coupon::service::CouponService;

#[tokio::main]
async fn main() -> ApiResult<()> {
    common::init_logger();

    let config = common::application_config().await;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ApiError::Internal(format!("invalid listen address: {}", e)))?;

    let app = match config.storage {
        StorageKind::Postgres => {
            let store = PgCouponStore::new(common::pgsql::connect(&config.postgres).await?);
            if config.postgres.run_migrations {
                store.migrate().await?;
                tracing::info!("migrations applied");
            }
            router::routers(Arc::new(CouponService::new(store)))
        }
        StorageKind::Memory => {
            tracing::warn!("using in-memory storage, data is lost on restart");
            router::routers(Arc::new(CouponService::new(MemoryCouponStore::new())))
        }
    };

    tracing::info!("coupon-srv run at: {} ({:?} storage)", addr, config.storage);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("ctrl-c listener err: {}", e);
    }
    tracing::info!("shutting down");
}
