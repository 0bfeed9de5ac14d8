use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::application::PostgresConfig;
use crate::error::ApiResult;

pub type ConnPool = sqlx::PgPool;

/// 创建连接池
pub async fn connect(cfg: &PostgresConfig) -> ApiResult<ConnPool> {
    let conn_pool = PgPoolOptions::new()
        .max_connections(cfg.pool_size)
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .connect(&cfg.dsn())
        .await?;

    tracing::info!(
        "postgres pool ready: {}:{}/{} (size {})",
        cfg.host,
        cfg.port,
        cfg.db_name,
        cfg.pool_size
    );
    Ok(conn_pool)
}
