use axum::extract::State;
use axum::http::Uri;
use axum::response::Response;

use super::{AppState, forward};
use crate::error::{GatewayError, GatewayResult};
use crate::request::{DependencyRequest, decode_path};

/// `GET /{repo}/shields/{category}/{group...}/{artifact}.{ext}`
///
/// Proxies the badge service's image for the latest version.
#[tracing::instrument(name = "shields", skip_all, fields(path = %uri.path()))]
pub(super) async fn handle(State(state): State<AppState>, uri: Uri) -> GatewayResult<Response> {
    let path = decode_path(uri.path())?;
    let Some(dot) = path.rfind('.') else {
        return Err(GatewayError::BadRequest(format!(
            "Invalid dependency path, file extension expected: {path}\n"
        )));
    };
    let (resource, ext) = (&path[..dot], &path[dot + 1..]);

    let dependency = DependencyRequest::parse(resource)?;
    let latest = state
        .latest_version(&dependency.category, &dependency.dependency_path())
        .await?;

    let badge = state.github.shield_url(&dependency.category, &latest, ext);
    let response = state.github.get(&badge).await?;

    tracing::info!(%latest, status = %response.status(), "badge proxied");
    Ok(forward(response))
}
