//! Fetching source media over HTTP.

use std::path::Path;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Download `url` into `dest`, refusing anything larger than `max_bytes`.
///
/// Every failure to obtain the bytes (bad URL, transport error, non-2xx
/// status, empty body) is reported as [`MediaError::SourceUnavailable`].
/// Returns the number of bytes written.
pub async fn download_source(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    max_bytes: u64,
) -> MediaResult<u64> {
    let parsed = Url::parse(url).map_err(|e| MediaError::source_unavailable(url, e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(MediaError::source_unavailable(
            url,
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }

    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| MediaError::source_unavailable(url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::source_unavailable(url, format!("HTTP {}", status)));
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(MediaError::resource_exceeded(format!(
                "source {} is {} bytes, limit is {}",
                url, len, max_bytes
            )));
        }
    }

    let mut file = File::create(dest).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| MediaError::source_unavailable(url, e.to_string()))?;
        written += chunk.len() as u64;
        if written > max_bytes {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(MediaError::resource_exceeded(format!(
                "source {} exceeded {} bytes",
                url, max_bytes
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if written == 0 {
        return Err(MediaError::source_unavailable(url, "empty response body"));
    }

    debug!(url, bytes = written, "Downloaded source");
    Ok(written)
}
