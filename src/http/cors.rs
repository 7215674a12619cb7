//! CORS handling: every response carries
//! `Access-Control-Allow-Origin: *`; pre-flight `OPTIONS` echoes the
//! client's requested method/headers back in the matching allow headers.
//! Reimplemented locally rather than pulled in from `tower_http::cors`'s
//! default policy builder, to match this exact echo behavior.

use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

pub async fn allow_any_origin<B>(request: Request<B>, next: Next<B>) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("access-control-allow-origin", HeaderValue::from_static("*"));
    response
}

pub async fn preflight(headers: HeaderMap) -> impl IntoResponse {
    let allow_methods = headers
        .get("access-control-request-method")
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("POST, GET, OPTIONS"));

    let allow_headers = headers
        .get("access-control-request-headers")
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("content-type"));

    (
        [
            ("access-control-allow-origin", HeaderValue::from_static("*")),
            ("access-control-allow-methods", allow_methods),
            ("access-control-allow-headers", allow_headers),
        ],
        "",
    )
}
