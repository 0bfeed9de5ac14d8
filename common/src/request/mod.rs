use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::Request;
use axum::{async_trait, Json};

use crate::error::ApiError;

pub use coupon::ReqCoupon;

pub mod coupon;

/// JSON 请求体提取, 解析失败时返回统一错误体而不是 axum 默认的纯文本
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for JsonBody<T>
where
    B: Send + 'static,
    S: Send + Sync,
    T: 'static,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(inner)) => Ok(Self(inner)),
            Err(rejection) => Err(ApiError::Error(format!(
                "invalid request body: {}",
                rejection.body_text()
            ))),
        }
    }
}
