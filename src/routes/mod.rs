//! HTTP surface: one handler per route family, wired by [`router`].

mod javadoc;
mod pom;
mod shields;

pub use pom::{PomInfo, render_pom_page};

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderName, Method, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::github::GithubClient;

/// Immutable state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub github: GithubClient,
}

impl AppState {
    pub fn new(config: Config) -> reqwest::Result<Self> {
        let github = GithubClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            github,
        })
    }

    /// Latest version of a dependency; no version at all is a 404
    async fn latest_version(&self, category: &str, dependency_path: &str) -> GatewayResult<String> {
        self.github
            .resolve_latest(category, dependency_path)
            .await?
            .ok_or_else(|| GatewayError::NoSuchVersion(format!("{category}/{dependency_path}")))
    }
}

/// Build the gateway's router. Route prefixes are fixed here, from the
/// configured repository name.
pub fn router(state: AppState) -> Router {
    let shields = state.config.prefix("shields");
    let pom = state.config.prefix("pom");
    let javadoc = state.config.prefix("javadoc");

    Router::new()
        .route(&format!("{shields}*path"), get(shields::handle).fallback(bad_request))
        .route(&format!("{pom}*path"), get(pom::handle).fallback(bad_request))
        .route(&format!("{javadoc}*path"), get(javadoc::handle).fallback(bad_request))
        .fallback(bad_request)
        .with_state(state)
}

async fn bad_request(method: Method, uri: Uri) -> GatewayError {
    GatewayError::BadRequest(format!("Bad request: {method} {}\n", uri.path()))
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ]
    .contains(name)
}

/// Relay an upstream answer verbatim: status, end-to-end headers and a
/// streamed body.
pub(crate) fn forward(upstream: reqwest::Response) -> Response {
    let mut builder = Response::builder().status(upstream.status());

    if let Some(headers) = builder.headers_mut() {
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) {
                headers.append(name.clone(), value.clone());
            }
        }
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .unwrap_or_else(|e| GatewayError::Upstream(e.to_string()).into_response())
}
