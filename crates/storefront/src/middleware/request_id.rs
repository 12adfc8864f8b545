//! Request ID middleware for request correlation.
//!
//! Every request gets an ID, taken from an upstream `x-request-id` header or
//! generated as a UUID v4. It is recorded on the tracing span, tagged on the
//! Sentry scope and echoed in the response, so a failed checkout reported by a
//! client can be matched to its logs and its Sentry event.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream request ID accepted; longer values are replaced.
const MAX_UPSTREAM_ID_LENGTH: usize = 128;

fn upstream_id(request: &Request) -> Option<String> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_UPSTREAM_ID_LENGTH)
        .map(String::from)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = upstream_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use axum::{Router, body::Body, middleware::from_fn, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn(request_id_middleware))
    }

    async fn request_id_for(header: Option<&str>) -> String {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(REQUEST_ID_HEADER, value);
        }
        let response = app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn test_upstream_id_is_kept() {
        assert_eq!(request_id_for(Some("abc-123")).await, "abc-123");
    }

    #[tokio::test]
    async fn test_missing_or_oversized_id_is_generated() {
        let generated = request_id_for(None).await;
        assert!(Uuid::parse_str(&generated).is_ok());

        let oversized = "x".repeat(MAX_UPSTREAM_ID_LENGTH + 1);
        let replaced = request_id_for(Some(&oversized)).await;
        assert!(Uuid::parse_str(&replaced).is_ok());
    }
}
