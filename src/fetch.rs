use std::time::Duration;

use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::error::UploadError;
use crate::utils::sanitize_filename;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// a remote file being streamed in from a public url
pub struct RemoteFile {
    /// safe filename derived from the url path
    pub filename: String,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

/// derive a storable filename from the last segment of the url path
pub fn filename_from_url(url: &str) -> String {
    let name = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(|s| s.to_string()))
        })
        .map(|s| sanitize_filename(&s))
        .unwrap_or_default();

    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}

/// start streaming a public url; the body is not buffered, the caller pipes
/// the reader into the blob store
pub async fn fetch_public_url(
    http: &reqwest::Client,
    url: &str,
) -> Result<RemoteFile, UploadError> {
    let filename = filename_from_url(url);
    tracing::info!(url = %url, filename = %filename, "Downloading file from public URL");

    let response = http
        .get(url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await
        .map_err(|e| UploadError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .error_for_status()
        .map_err(|e| UploadError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let stream = response
        .bytes_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

    Ok(RemoteFile {
        filename,
        reader: Box::new(StreamReader::new(stream)),
    })
}
