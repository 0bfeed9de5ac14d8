use std::sync::Arc;

use async_once::AsyncOnce;
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::value::Value;

use crate::error::{ApiError, ApiResult};

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "COUPON_CONFIG";
const DEFAULT_CONFIG: &str = "application.yaml";
const EXAMPLE_CONFIG: &str = ".example.yaml";

lazy_static! {
    pub static ref APP_CONFIG: AsyncOnce<Arc<Application>> = AsyncOnce::new(async {
        match Application::init().await {
            Ok(application) => Arc::new(application),
            Err(e) => {
                tracing::error!("application load err: {}", e);
                std::process::exit(-1);
            }
        }
    });
}

/// 获取系统配置
pub async fn application_config() -> Arc<Application> {
    APP_CONFIG.get().await.clone()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Application {
    // 服务地址
    pub host: String,
    // 服务端口
    pub port: u16,
    pub storage: StorageKind,
    pub postgres: PostgresConfig,
}

/// 优惠券存储后端
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl Application {
    pub async fn init() -> ApiResult<Self> {
        let cfg = Application::file_get_content().await?;
        Self::from_value(&cfg)
    }

    pub fn from_yaml(content: &str) -> ApiResult<Self> {
        Self::from_value(&serde_yaml::from_str::<Value>(content)?)
    }

    fn from_value(cfg: &Value) -> ApiResult<Self> {
        Ok(Application {
            host: Self::analysis::<String>("host", cfg)?,
            port: Self::analysis::<u16>("port", cfg)?,
            storage: Self::analysis::<StorageKind>("storage", cfg)?,
            postgres: Self::analysis::<PostgresConfig>("postgres", cfg)?,
        })
    }

    fn analysis<T: DeserializeOwned>(key: &str, value: &Value) -> ApiResult<T> {
        let val = match value.get(key) {
            Some(value) => value,
            None => return Err(ApiError::Internal(format!("config key `{}` is missing", key))),
        };
        Ok(serde_yaml::from_value::<T>(val.clone())?)
    }

    /// 读取文件内容, 文件不存在时从示例配置创建
    async fn file_get_content() -> ApiResult<Value> {
        let filename = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
        match tokio::fs::read(&filename).await {
            Ok(file_content) => serde_yaml::from_slice::<Value>(file_content.as_slice()).map_err(|e| {
                tracing::error!("please check ./{}, err: {}", filename, e);
                ApiError::from(e)
            }),
            Err(_e) => {
                tracing::warn!("./{} not found, creating it from {}", filename, EXAMPLE_CONFIG);
                match tokio::fs::copy(EXAMPLE_CONFIG, &filename).await {
                    Ok(_) => {
                        tracing::warn!("./{} created, fill in the settings and restart", filename);
                        Err(ApiError::Internal("config file created, please fill it in".to_string()))
                    }
                    Err(e) => {
                        tracing::error!("no example config found, err: {}", e);
                        Err(ApiError::from(e))
                    }
                }
            }
        }
    }
}

/// postgres 数据库配置参数
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub db_name: String,
    pub pool_size: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_acquire_timeout() -> u64 {
    30
}

impl PostgresConfig {
    pub fn dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.db_name
        )
    }
}
