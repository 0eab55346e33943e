use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::Config;

/// sha256 hash of the api key, attached to the router as an Extension
#[derive(Clone)]
pub struct ApiKeyHash(pub String);

// api key validation for the upload api
pub async fn validate_api_key(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    // hash injected during router setup
    let expected = req
        .extensions()
        .get::<ApiKeyHash>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .0
        .clone();

    let provided_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing X-API-Key header");
            StatusCode::UNAUTHORIZED
        })?;

    if Config::hash_api_key(provided_key) != expected {
        tracing::warn!("🚫 Invalid API key attempt");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

/// headers for the public artifact host
pub async fn add_security_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    response
}
