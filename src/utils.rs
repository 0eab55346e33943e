use std::path::{Component, Path};

use crate::error::UploadError;

/// file extensions we refuse to store, lowercase
const BLOCKED_EXTENSIONS: &[&str] = &["exe", "dll", "com", "bat", "cmd", "scr", "msi", "ps1"];

/// strip anything that could be used for directory traversal or shell games,
/// keeping alphanumerics, dots, dashes and underscores
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-' || *c == '_')
        .collect();

    // no hidden files / relative components
    cleaned.trim_start_matches('.').to_string()
}

/// upload ids are client-supplied; reduce them to `[A-Za-z0-9_-]`
pub fn sanitize_upload_id(raw: &str) -> Result<String, UploadError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if cleaned.is_empty() {
        return Err(UploadError::Validation(format!(
            "invalid upload_id: {:?}",
            raw
        )));
    }
    Ok(cleaned)
}

/// check a sanitized filename against the extension denylist
pub fn has_blocked_extension(filename: &str) -> bool {
    filename
        .rsplit('.')
        .next()
        .map(|ext| BLOCKED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
        && filename.contains('.')
}

/// validate a destination key before it is joined under the artifact root
///
/// keys may contain subdirectories (the path service produces them) but must
/// stay relative and free of parent-dir components
pub fn validate_object_key(key: &str) -> Result<(), UploadError> {
    if key.is_empty() {
        return Err(UploadError::Validation("empty object key".to_string()));
    }

    let path = Path::new(key);
    if path.is_absolute() {
        return Err(UploadError::Validation(format!(
            "absolute object key not allowed: {}",
            key
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                return Err(UploadError::Validation(format!(
                    "object key escapes the artifact root: {}",
                    key
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

/// wait for ctrl-c or SIGTERM so axum can drain in-flight requests
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
