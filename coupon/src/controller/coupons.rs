use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::Path;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use uuid::Uuid;
use validator::Validate;

use common::error::ApiError;
use common::{ApiResponse, JsonBody, ReqCoupon};

use crate::models::CouponStore;
use crate::service::CouponService;

pub struct CouponController;

impl CouponController {
    // 列表
    pub async fn index<S: CouponStore>(
        Extension(service): Extension<Arc<CouponService<S>>>,
    ) -> Response {
        match service.list_valid_coupon().await {
            Ok(coupons) => ApiResponse::ok(coupons).json(),
            Err(e) => e.into_response(),
        }
    }

    // 创建
    pub async fn create<S: CouponStore>(
        Extension(service): Extension<Arc<CouponService<S>>>,
        JsonBody(inner): JsonBody<ReqCoupon>,
    ) -> Response {
        if let Err(e) = inner.validate() {
            return ApiError::from(e).into_response();
        }

        match service.create(inner).await {
            Ok(coupon) => ApiResponse::created(coupon).json(),
            Err(e) => e.into_response(),
        }
    }

    // 删除
    pub async fn delete<S: CouponStore>(
        Extension(service): Extension<Arc<CouponService<S>>>,
        id: Result<Path<Uuid>, PathRejection>,
    ) -> Response {
        let id = match id {
            Ok(Path(id)) => id,
            Err(e) => {
                return ApiError::Error(format!("invalid coupon id: {}", e.body_text()))
                    .into_response()
            }
        };

        match service.delete_by_id(id).await {
            Ok(bool_val) => ApiResponse::ok(bool_val).json(),
            Err(e) => e.into_response(),
        }
    }
}
