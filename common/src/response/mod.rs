use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub use coupon::ResCoupon;

pub mod coupon;

/// 统一 JSON 响应, 状态码由调用方决定
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        Self { status, data }
    }

    /// 200
    pub fn ok(data: T) -> Self {
        Self::new(StatusCode::OK, data)
    }

    /// 201
    pub fn created(data: T) -> Self {
        Self::new(StatusCode::CREATED, data)
    }

    /// 这里必须返回一个 [`Response`] 才能和错误分支合并
    pub fn json(&self) -> Response {
        match serde_json::to_vec(&self.data) {
            Ok(body) => (
                self.status,
                [
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                    (header::CONTENT_TYPE, "application/json; charset=UTF-8"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("response serialize err: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        self.json()
    }
}
