use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use common::error::{ApiError, ErrorBody};
use common::ApiResponse;

/// 给错误响应补上请求路径, 同时记录访问日志
pub async fn request_path<B>(req: Request<B>, next: Next<B>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = next.run(req).await;
    let err = response.extensions_mut().remove::<ApiError>();
    let response = match err {
        Some(err) => ApiResponse::new(err.status(), ErrorBody::new(&err, Some(path.clone()))).json(),
        None => response,
    };

    tracing::debug!("{} {} -> {}", method, path, response.status());
    response
}
