//! HTTP metrics middleware for capturing all request/response metrics
//!
//! This middleware captures metrics for ALL HTTP responses including those
//! produced before a handler runs: pre-flight answers, 401s from the auth
//! layer, 404 and 405 from routing, and 408 from the timeout layer.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records HTTP request metrics for all responses
///
/// Applied as the outermost layer.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn handler_200() -> &'static str {
        "OK"
    }

    async fn handler_401() -> (StatusCode, &'static str) {
        (StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    fn test_app() -> Router {
        Router::new()
            .route("/success", get(handler_200))
            .route("/denied", get(handler_401))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    #[tokio::test]
    async fn test_middleware_passes_responses_through() {
        for (uri, status) in [
            ("/success", StatusCode::OK),
            ("/denied", StatusCode::UNAUTHORIZED),
            ("/nonexistent", StatusCode::NOT_FOUND),
        ] {
            let request = HttpRequest::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .expect("request builder should succeed");

            let response = test_app()
                .oneshot(request)
                .await
                .expect("request should succeed");
            assert_eq!(response.status(), status);
        }
    }
}
