use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use timedate_origin::OriginMatcher;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::MakeSpan;
use tracing::{error, warn};
use uuid::Uuid;

use crate::config::CorsConfig;
use crate::error::ErrorEnvelope;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Span maker that tags each request with the caller's `X-Request-ID`, or a
/// fresh UUID when none was sent.
#[derive(Clone)]
pub struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request_id(request.headers());
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Adds the fixed browser-hardening headers to every response.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    response
}

/// Completes error bodies produced by [`ApiError`](crate::error::ApiError)
/// with the request path and method, and logs them.
pub async fn error_envelope(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let Some(envelope) = response.extensions().get::<ErrorEnvelope>().cloned() else {
        return response;
    };

    let envelope = ErrorEnvelope {
        path,
        method,
        ..envelope
    };
    error!(
        code = envelope.code,
        path = %envelope.path,
        method = %envelope.method,
        "Request failed: {}",
        envelope.message
    );

    let (parts, _) = response.into_parts();
    (parts.status, Json(envelope)).into_response()
}

/// CORS layer whose origin check is the configured [`OriginMatcher`].
pub fn cors_layer(cors: &CorsConfig, matcher: Arc<OriginMatcher>) -> CorsLayer {
    let methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| match m.parse::<Method>() {
            Ok(method) => Some(method),
            Err(_) => {
                warn!("Ignoring invalid CORS method: {:?}", m);
                None
            }
        })
        .collect();
    let headers: Vec<HeaderName> = cors
        .allowed_headers
        .iter()
        .filter_map(|h| match h.parse::<HeaderName>() {
            Ok(name) => Some(name),
            Err(_) => {
                warn!("Ignoring invalid CORS header: {:?}", h);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|o| matcher.is_allowed(o))
                    .unwrap_or(false)
            },
        ))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(cors.allow_credentials)
        .max_age(cors.max_age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_cors() -> CorsConfig {
        CorsConfig {
            allowed_origins: vec!["https://*.domain.com".to_string()],
            allowed_methods: vec!["GET".to_string(), "NOT A METHOD".to_string()],
            allowed_headers: vec!["Content-Type".to_string()],
            allow_credentials: true,
            max_age: Duration::from_secs(600),
        }
    }

    fn app() -> Router {
        let cors = test_cors();
        let matcher = Arc::new(OriginMatcher::compile(&cors.allowed_origins));
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&cors, matcher))
            .layer(axum::middleware::from_fn(security_headers))
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let h = response.headers();
        assert_eq!(h["x-content-type-options"], "nosniff");
        assert_eq!(h["x-frame-options"], "DENY");
        assert_eq!(h["x-xss-protection"], "1; mode=block");
    }

    #[tokio::test]
    async fn test_cors_allows_matching_origin() {
        let response = app()
            .oneshot(
                Request::get("/")
                    .header("Origin", "https://app.domain.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.domain.com"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }

    #[tokio::test]
    async fn test_cors_omits_header_for_foreign_origin() {
        let response = app()
            .oneshot(
                Request::get("/")
                    .header("Origin", "https://domain.com.evil.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .get("access-control-allow-origin")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/")
                    .header("Origin", "https://app.domain.com")
                    .header("Access-Control-Request-Method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["access-control-max-age"], "600");
        assert_eq!(response.headers()["access-control-allow-methods"], "GET");
    }

    #[test]
    fn test_request_id_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("abc-123"));
        assert_eq!(request_id(&headers), "abc-123");
    }

    #[test]
    fn test_request_id_generated_when_missing() {
        let mut headers = HeaderMap::new();
        let generated = request_id(&headers);
        assert!(Uuid::parse_str(&generated).is_ok());

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(""));
        assert_ne!(request_id(&headers), "");
    }
}
