use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::Config;
use crate::handlers::{health_check, upload};
use crate::middleware::{add_security_headers, validate_api_key, ApiKeyHash};
use crate::state::AppState;
use crate::utils::shutdown_signal;

// build the public artifact server: read-only static serving over files_dir
pub fn build_public_router(files_dir: &Path) -> Router {
    tracing::debug!("Building public router for directory: {:?}", files_dir);
    Router::new()
        .fallback_service(ServeDir::new(files_dir))
        .layer(axum::middleware::from_fn(add_security_headers))
        .layer(CompressionLayer::new().gzip(true).br(true).zstd(true))
        .layer(TraceLayer::new_for_http())
}

/// build the upload api router
pub fn build_api_router(state: Arc<AppState>, config: &Config) -> Router {
    tracing::debug!(
        "Building api router with max upload size: {} bytes",
        config.max_upload_size
    );

    // configure rate limiting
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2) // Burst size
            .burst_size(5)
            .finish()
            .unwrap(),
    );

    // configure cors
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_origin(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/upload", post(upload))
        .route("/health", get(health_check))
        .layer(axum::middleware::from_fn(validate_api_key))
        .layer(Extension(ApiKeyHash(config.api_key_hash.clone())))
        // axum multipart honors DefaultBodyLimit, not the tower-http layer
        .layer(axum::extract::DefaultBodyLimit::max(config.max_upload_size))
        .layer(RequestBodyLimitLayer::new(config.max_upload_size))
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start both public and api servers
pub async fn start_servers(
    public_app: Router,
    api_app: Router,
    public_addr: SocketAddr,
    api_addr: SocketAddr,
) {
    tracing::info!("Starting servers...");

    let public_listener = tokio::net::TcpListener::bind(public_addr)
        .await
        .expect("Failed to bind public server");

    let api_listener = tokio::net::TcpListener::bind(api_addr)
        .await
        .expect("Failed to bind api server");

    tracing::debug!("Public listener bound to {}", public_addr);
    tracing::debug!("Api listener bound to {}", api_addr);

    let public_server = axum::serve(
        public_listener,
        public_app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true);

    let api_server = axum::serve(
        api_listener,
        api_app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true);

    tracing::info!("Servers running and ready to accept connections");
    let _ = tokio::join!(
        async {
            if let Err(e) = public_server.await {
                tracing::error!("Public server error: {}", e);
            }
        },
        async {
            if let Err(e) = api_server.await {
                tracing::error!("Api server error: {}", e);
            }
        }
    );
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("Bulkdrop starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!(
        "📡 PUBLIC ARTIFACT SERVER: http://{}:{}",
        config.public_host,
        config.public_port
    );
    tracing::info!(
        "🔐 UPLOAD API SERVER: http://{}:{}",
        config.api_host,
        config.api_port
    );
    tracing::info!(
        "📁 Committing artifacts to: {:?}",
        config
            .files_dir
            .canonicalize()
            .unwrap_or(config.files_dir.clone())
    );
    tracing::info!(
        "⏱️  Session TTL: {:?}, reaper interval: {:?}",
        config.session_ttl,
        config.reaper_interval
    );
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
