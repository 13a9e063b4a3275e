//! Archive Fetcher: spools a remote archive into request-scoped storage.

use futures_util::StreamExt;
use reqwest::{Response, StatusCode};
use std::path::Path;

use crate::error::{GatewayError, GatewayResult};
use crate::github::GithubClient;
use crate::io::TransientBlob;

/// Result of asking the raw endpoint for an archive
#[derive(Debug)]
pub enum FetchOutcome {
    /// The whole body, spooled to disk, plus its declared length
    Archive { blob: TransientBlob, size: u64 },
    /// Any non-200 answer, to be relayed to the client as is
    Upstream(Response),
}

/// Download `url` into a [`TransientBlob`] created in `temp_dir`.
///
/// A missing or non-positive `Content-Length` is rejected before any storage
/// is allocated. On a transfer error the partial blob is dropped, which
/// deletes its file.
#[tracing::instrument(skip(client, temp_dir))]
pub async fn fetch_archive(
    client: &GithubClient,
    url: &str,
    temp_dir: &Path,
) -> GatewayResult<FetchOutcome> {
    let response = client.get_archive(url).await?;

    if response.status() != StatusCode::OK {
        tracing::debug!(status = %response.status(), "relaying upstream answer");
        return Ok(FetchOutcome::Upstream(response));
    }

    let size = declared_length(&response)?;

    let mut blob = TransientBlob::create_in(temp_dir, client.repository())?;
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| GatewayError::Transfer(e.to_string()))?;
        blob.append(&chunk)
            .map_err(|e| GatewayError::Transfer(e.to_string()))?;
    }
    blob.seal()
        .map_err(|e| GatewayError::Transfer(e.to_string()))?;

    if blob.len() != size {
        return Err(GatewayError::Transfer(format!(
            "expected {size} bytes, received {}",
            blob.len()
        )));
    }

    tracing::debug!(size, path = %blob.path().display(), "archive spooled");
    Ok(FetchOutcome::Archive { blob, size })
}

/// `Content-Length` as announced by the upstream; must be present and positive
fn declared_length(response: &Response) -> GatewayResult<u64> {
    let raw = response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match raw.and_then(|s| s.parse::<i64>().ok()) {
        Some(len) if len > 0 => Ok(len as u64),
        _ => Err(GatewayError::InvalidArchiveDeclaration(
            raw.unwrap_or("-1").to_string(),
        )),
    }
}
