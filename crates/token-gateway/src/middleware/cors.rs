//! CORS middleware.
//!
//! Answers every pre-flight (`OPTIONS`) request directly, before routing and
//! authentication, and stamps `Access-Control-Allow-Origin: *` on every other
//! response.
//!
//! Header values are fixed strings so clients see exactly:
//!
//! ```text
//! Access-Control-Allow-Origin: *
//! Access-Control-Allow-Headers: Authorization, Content-Type
//! Access-Control-Allow-Methods: GET, POST, OPTIONS
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::Response,
};

const ALLOW_ORIGIN: HeaderValue = HeaderValue::from_static("*");
const ALLOW_HEADERS: HeaderValue = HeaderValue::from_static("Authorization, Content-Type");
const ALLOW_METHODS: HeaderValue = HeaderValue::from_static("GET, POST, OPTIONS");

/// Middleware that short-circuits pre-flight requests and adds the allow-origin
/// header to all responses.
///
/// Applied outside the auth layer so pre-flight never needs a token.
pub async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        tracing::debug!(target: "gw.middleware.cors", path = %request.uri().path(), "Pre-flight request");
        return preflight_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN);
    response
}

fn preflight_response() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN);
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS);
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
    response
}
