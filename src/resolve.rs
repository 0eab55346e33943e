use std::time::Duration;

use serde_json::Value;

use crate::error::UploadError;
use crate::utils::validate_object_key;

const PATH_SERVICE_TIMEOUT: Duration = Duration::from_secs(15);

/// work out the destination key for an upload
///
/// precedence: `path_payload` (delegated to the external path service, joined
/// with the filename) over `object_name` over the sanitized filename. called
/// once per session; the result is immutable afterwards.
pub async fn resolve_destination_key(
    http: &reqwest::Client,
    path_service_url: Option<&str>,
    object_name: Option<&str>,
    path_payload: Option<&str>,
    filename: &str,
) -> Result<String, UploadError> {
    let key = match path_payload {
        Some(payload) => {
            let base = resolve_with_path_service(http, path_service_url, payload).await?;
            format!("{}/{}", base.trim_end_matches('/'), filename)
        }
        None => match object_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => filename.to_string(),
        },
    };

    validate_object_key(&key)?;
    Ok(key)
}

/// hand an opaque path_payload to the configured path service and return the
/// base path it computes; the payload's business rules live entirely on the
/// other side of this call
async fn resolve_with_path_service(
    http: &reqwest::Client,
    path_service_url: Option<&str>,
    payload: &str,
) -> Result<String, UploadError> {
    let parsed: Value = serde_json::from_str(payload)
        .map_err(|e| UploadError::Validation(format!("invalid JSON in path_payload: {}", e)))?;

    if parsed.get("path_key").map(|v| v.is_null()).unwrap_or(true) {
        return Err(UploadError::Validation(
            "path_key is mandatory when path_payload is provided".to_string(),
        ));
    }

    let url = path_service_url.ok_or_else(|| {
        UploadError::Internal("path service URL is not configured".to_string())
    })?;

    let response = http
        .post(url)
        .timeout(PATH_SERVICE_TIMEOUT)
        .json(&parsed)
        .send()
        .await
        .map_err(|e| UploadError::PathService(format!("could not reach path service: {}", e)))?;

    if !response.status().is_success() {
        return Err(UploadError::PathService(format!(
            "path service failed with {}",
            response.status()
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| UploadError::PathService(format!("bad path service response: {}", e)))?;

    body.get("path")
        .and_then(|p| p.as_str())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .ok_or_else(|| {
            UploadError::PathService("path service response missing 'path' field".to_string())
        })
}
