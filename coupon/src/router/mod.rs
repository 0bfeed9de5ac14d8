use std::sync::Arc;

use axum::middleware as AxumMiddleware;
use axum::routing::{delete, get};
use axum::{Extension, Router};

use crate::controller::CouponController;
use crate::middleware;
use crate::models::CouponStore;
use crate::service::CouponService;

pub fn routers<S: CouponStore>(service: Arc<CouponService<S>>) -> Router {
    Router::new()
        .route(
            "/coupon",
            get(CouponController::index::<S>).post(CouponController::create::<S>),
        )
        .route("/coupon/:id", delete(CouponController::delete::<S>))
        .layer(Extension(service))
        .layer(AxumMiddleware::from_fn(middleware::request_path))
}
