use axum::extract::State;
use axum::http::{HeaderMap, Uri, header};
use axum::response::Response;

use super::{AppState, forward};
use crate::error::GatewayResult;
use crate::fetch::{FetchOutcome, fetch_archive};
use crate::request::{JavadocRequest, decode_path};
use crate::serve::serve_entry;
use crate::zip::ArchiveIndex;

/// `GET /{repo}/javadoc/{category}/{g1}/{g2}/{artifact}/{version}!/{path}`
///
/// One full fetch, index, serve cycle per request; the spooled archive is
/// gone once the response body has been sent (or abandoned).
#[tracing::instrument(name = "javadoc", skip_all, fields(path = %uri.path()))]
pub(super) async fn handle(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    let path = decode_path(uri.path())?;
    let JavadocRequest {
        mut coordinate,
        inner_path,
    } = JavadocRequest::parse(&path)?;

    if coordinate.wants_latest() {
        coordinate.version = state
            .latest_version(&coordinate.category, &coordinate.dependency_path())
            .await?;
    }

    let url = state.github.archive_url(&coordinate);
    let (blob, size) = match fetch_archive(&state.github, &url, &state.config.temp_dir).await? {
        FetchOutcome::Archive { blob, size } => (blob, size),
        FetchOutcome::Upstream(response) => {
            tracing::info!(status = %response.status(), %url, "archive not served upstream");
            return Ok(forward(response));
        }
    };

    let index = ArchiveIndex::build(&blob).await?;
    tracing::debug!(entries = index.len(), size, "archive indexed");

    let response = serve_entry(
        blob,
        &index,
        &inner_path,
        headers.get(header::IF_MODIFIED_SINCE),
        state.config.conditional_policy,
    )
    .await?;

    tracing::info!(status = %response.status(), entry = %inner_path, version = %coordinate.version, "javadoc served");
    Ok(response)
}
