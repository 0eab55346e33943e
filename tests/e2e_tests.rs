use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use tokio_util::sync::CancellationToken;

use bulkdrop::config::Config;
use bulkdrop::handlers::upload;
use bulkdrop::middleware::{validate_api_key, ApiKeyHash};
use bulkdrop::session::SessionState;
use bulkdrop::state::AppState;
use bulkdrop::uploader::{ChunkUploader, UploadClientError, UploadOptions};

const API_KEY: &str = "test-key";

fn test_state(dir: &Path) -> Arc<AppState> {
    let config = Config {
        files_dir: dir.to_path_buf(),
        public_host: "127.0.0.1".to_string(),
        public_port: 4848,
        api_host: "127.0.0.1".to_string(),
        api_port: 4849,
        max_upload_size: 100 * 1024 * 1024,
        worker_threads: 1,
        api_key_hash: Config::hash_api_key(API_KEY),
        cors_origins: vec![],
        rate_limit_per_minute: 60,
        session_ttl: Duration::from_secs(3600),
        reaper_interval: Duration::from_secs(3600),
        public_base_url: None,
        path_service_url: None,
    };
    Arc::new(AppState::new(config))
}

fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .layer(axum::middleware::from_fn(validate_api_key))
        .layer(axum::Extension(ApiKeyHash(Config::hash_api_key(API_KEY))))
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .with_state(state)
}

async fn spawn_app(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/upload", addr)
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_chunked_upload_end_to_end() {
    let server_dir = tempfile::tempdir().unwrap();
    let state = test_state(server_dir.path());
    let endpoint = spawn_app(api_router(state.clone())).await;

    // 10000 bytes at 4096 per chunk gives 3 chunks
    let client_dir = tempfile::tempdir().unwrap();
    let source = client_dir.path().join("video.mp4");
    let contents = patterned(10_000);
    std::fs::write(&source, &contents).unwrap();

    let progress: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let progress_sink = progress.clone();
    let options = UploadOptions {
        progress: Some(Box::new(move |p| {
            progress_sink.lock().unwrap().push(p);
        })),
        ..Default::default()
    };

    let uploader = ChunkUploader::new(&endpoint)
        .with_api_key(API_KEY)
        .with_chunk_size(4096);
    let response = uploader.upload(&source, "e2e-1", &options).await.unwrap();

    assert!(response.success);
    assert_eq!(response.file_size, 10_000);
    assert_eq!(response.object_name, "video.mp4");
    assert_eq!(response.upload_id.as_deref(), Some("e2e-1"));
    assert_eq!(response.total_chunks, Some(3));

    let committed = std::fs::read(server_dir.path().join("video.mp4")).unwrap();
    assert_eq!(committed, contents);
    assert!(state.registry.is_empty());

    // progress never decreases and ends at 100
    let events = progress.lock().unwrap().clone();
    assert_eq!(events, vec![33, 67, 100]);
}

#[tokio::test]
async fn test_empty_file_uploads_as_one_chunk() {
    let server_dir = tempfile::tempdir().unwrap();
    let state = test_state(server_dir.path());
    let endpoint = spawn_app(api_router(state)).await;

    let client_dir = tempfile::tempdir().unwrap();
    let source = client_dir.path().join("empty.dat");
    std::fs::write(&source, b"").unwrap();

    let uploader = ChunkUploader::new(&endpoint).with_api_key(API_KEY);
    let response = uploader
        .upload(&source, "e2e-empty", &UploadOptions::default())
        .await
        .unwrap();

    assert_eq!(response.file_size, 0);
    assert_eq!(response.total_chunks, Some(1));
    let committed = std::fs::read(server_dir.path().join("empty.dat")).unwrap();
    assert!(committed.is_empty());
}

#[tokio::test]
async fn test_object_name_override() {
    let server_dir = tempfile::tempdir().unwrap();
    let state = test_state(server_dir.path());
    let endpoint = spawn_app(api_router(state)).await;

    let client_dir = tempfile::tempdir().unwrap();
    let source = client_dir.path().join("raw.bin");
    std::fs::write(&source, b"payload").unwrap();

    let options = UploadOptions {
        object_name: Some("archive/2026/raw.bin".to_string()),
        ..Default::default()
    };
    let uploader = ChunkUploader::new(&endpoint).with_api_key(API_KEY);
    let response = uploader.upload(&source, "e2e-key", &options).await.unwrap();

    assert_eq!(response.object_name, "archive/2026/raw.bin");
    assert!(server_dir.path().join("archive/2026/raw.bin").exists());
}

async fn flaky(
    State(counter): State<Arc<AtomicU32>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
    if n >= 2 {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(next.run(request).await)
}

#[tokio::test]
async fn test_retries_exhausted_leaves_session_resumable_state() {
    let server_dir = tempfile::tempdir().unwrap();
    let state = test_state(server_dir.path());

    // every request after the first one fails, including the client's abort
    let counter = Arc::new(AtomicU32::new(0));
    let app = Router::new()
        .route("/upload", post(upload))
        .layer(axum::middleware::from_fn_with_state(counter, flaky))
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .with_state(state.clone());
    let endpoint = spawn_app(app).await;

    let client_dir = tempfile::tempdir().unwrap();
    let source = client_dir.path().join("big.bin");
    std::fs::write(&source, patterned(10_000)).unwrap();

    let uploader = ChunkUploader::new(&endpoint)
        .with_chunk_size(4096)
        .with_retry_policy(2, Duration::from_millis(10));
    let err = uploader
        .upload(&source, "e2e-flaky", &UploadOptions::default())
        .await
        .unwrap_err();

    match err {
        UploadClientError::RetriesExhausted {
            chunk, attempts, ..
        } => {
            assert_eq!(chunk, 2);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }

    // the abort was best-effort and also failed, so the server still holds
    // the session with only chunk 1
    let session = state.registry.get("e2e-flaky").unwrap();
    assert_eq!(session.state, SessionState::Receiving);
    assert_eq!(session.received_chunks.len(), 1);
    assert!(session.received_chunks.contains(&1));
}

#[tokio::test]
async fn test_cancellation_aborts_server_session() {
    let server_dir = tempfile::tempdir().unwrap();
    let state = test_state(server_dir.path());
    let endpoint = spawn_app(api_router(state.clone())).await;

    let client_dir = tempfile::tempdir().unwrap();
    let source = client_dir.path().join("big.bin");
    std::fs::write(&source, patterned(10_000)).unwrap();

    // cancel as soon as the first chunk is acknowledged
    let cancel = CancellationToken::new();
    let trip = cancel.clone();
    let options = UploadOptions {
        progress: Some(Box::new(move |_| trip.cancel())),
        cancel,
        ..Default::default()
    };

    let uploader = ChunkUploader::new(&endpoint)
        .with_api_key(API_KEY)
        .with_chunk_size(4096);
    let err = uploader
        .upload(&source, "e2e-cancel", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadClientError::Cancelled));

    // the abort already went out before upload() returned
    assert!(state.registry.get("e2e-cancel").is_none());
    assert!(!server_dir.path().join(".chunks/e2e-cancel").exists());
    assert!(!server_dir.path().join("big.bin").exists());
}

#[tokio::test]
async fn test_wrong_api_key_is_rejected() {
    let server_dir = tempfile::tempdir().unwrap();
    let state = test_state(server_dir.path());
    let endpoint = spawn_app(api_router(state.clone())).await;

    let client_dir = tempfile::tempdir().unwrap();
    let source = client_dir.path().join("secret.bin");
    std::fs::write(&source, b"data").unwrap();

    let uploader = ChunkUploader::new(&endpoint)
        .with_api_key("not-the-key")
        .with_retry_policy(0, Duration::from_millis(10));
    let err = uploader
        .upload(&source, "e2e-auth", &UploadOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadClientError::RetriesExhausted { .. }));
    assert!(state.registry.is_empty());
}
