use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

use crate::ApiResponse;

/// 返回资源类型
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// 系统定义错误
/// Error    业务错误, 调用方可以修正, 统一返回 400
/// Internal 存储或运行环境错误, 返回 500
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ApiError {
    Error(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Error(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Error(msg) | ApiError::Internal(msg) => msg,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Error(err) => write!(f, "{}", err),
            ApiError::Internal(err) => write!(f, "internal error: {}", err),
        }
    }
}

impl std::error::Error for ApiError {}

/// 错误响应体, path 由中间件补全
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub timestamp: DateTime<Local>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: Option<String>,
}

impl ErrorBody {
    pub fn new(err: &ApiError, path: Option<String>) -> Self {
        let status = err.status();
        ErrorBody {
            timestamp: Local::now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or_default().to_string(),
            message: err.message().to_string(),
            path,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = ApiResponse::new(self.status(), ErrorBody::new(&self, None)).json();
        // 留给 request_path 中间件重新渲染
        response.extensions_mut().insert(self);
        response
    }
}

pub fn format_errors(errors: ValidationErrors) -> Vec<HashMap<String, String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, err)| {
            let message = err
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<String>>()
                .join(",");

            let mut map_data = HashMap::new();
            map_data.insert(field.to_owned(), message);
            map_data
        })
        .collect::<Vec<HashMap<String, String>>>()
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages = format_errors(errors)
            .into_iter()
            .flat_map(|item| item.into_iter())
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect::<Vec<String>>();
        messages.sort();

        ApiError::Error(messages.join("; "))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for ApiError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<serde_yaml::Error> for ApiError {
    fn from(e: serde_yaml::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Error(e.to_string())
    }
}

impl From<&str> for ApiError {
    fn from(e: &str) -> Self {
        ApiError::Error(e.to_string())
    }
}
