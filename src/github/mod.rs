//! Outbound side of the gateway: the GitHub listing API, the raw file
//! endpoint and the badge service.

mod listing;

pub use listing::{ChunkReader, MAX_LISTING_BYTES, NO_VERSION, latest_version_from};

use reqwest::{Client, Response};
use std::time::Duration;

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::request::ArchiveCoordinate;

/// HTTP client bound to one artifact repository.
///
/// Cheap to share: the underlying connection pool is reference counted.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    user: String,
    repository: String,
    api_base: String,
    raw_base: String,
    shields_base: String,
    upstream_timeout: Duration,
    archive_timeout: Duration,
}

impl GithubClient {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            user: config.github_user.clone(),
            repository: config.github_repository.clone(),
            api_base: config.api_base.clone(),
            raw_base: config.raw_base.clone(),
            shields_base: config.shields_base.clone(),
            upstream_timeout: config.upstream_timeout,
            archive_timeout: config.archive_timeout,
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Directory listing of `<category>/<dependency_path>`
    pub fn listing_url(&self, category: &str, dependency_path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}/{}",
            self.api_base, self.user, self.repository, category, dependency_path
        )
    }

    /// Raw URL of a file below the repository's `master` branch
    pub fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/master/{}",
            self.raw_base, self.user, self.repository, path
        )
    }

    /// Raw URL of the Javadoc jar for `coordinate`
    pub fn archive_url(&self, coordinate: &ArchiveCoordinate) -> String {
        self.raw_url(&format!(
            "{}/{}",
            coordinate.base_path(),
            coordinate.archive_file_name()
        ))
    }

    /// Badge image showing `version`: green for releases, blue otherwise
    pub fn shield_url(&self, category: &str, version: &str, ext: &str) -> String {
        let color = if category == "releases" { "green" } else { "blue" };
        format!(
            "{}/badge/{}-{}-{}.{}",
            self.shields_base,
            self.repository,
            version.replace('-', "--"),
            color,
            ext
        )
    }

    /// GET bounded by the short upstream timeout
    pub async fn get(&self, url: &str) -> GatewayResult<Response> {
        self.send(url, self.upstream_timeout).await
    }

    /// GET bounded by the archive download timeout
    pub async fn get_archive(&self, url: &str) -> GatewayResult<Response> {
        self.send(url, self.archive_timeout).await
    }

    async fn send(&self, url: &str, timeout: Duration) -> GatewayResult<Response> {
        tracing::debug!(%url, "outbound GET");
        self.http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(GatewayError::UpstreamUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GithubClient {
        GithubClient::new(&Config::new("zengularity", "entrepot")).unwrap()
    }

    #[test]
    fn composes_listing_url() {
        assert_eq!(
            client().listing_url("releases", "org/example/lib_2.12"),
            "https://api.github.com/repos/zengularity/entrepot/contents/releases/org/example/lib_2.12"
        );
    }

    #[test]
    fn shield_url_escapes_dashes_and_picks_color() {
        let client = client();
        assert_eq!(
            client.shield_url("releases", "1.0.0", "svg"),
            "https://img.shields.io/badge/entrepot-1.0.0-green.svg"
        );
        assert_eq!(
            client.shield_url("snapshots", "1.1.0-SNAPSHOT", "png"),
            "https://img.shields.io/badge/entrepot-1.1.0--SNAPSHOT-blue.png"
        );
    }
}
