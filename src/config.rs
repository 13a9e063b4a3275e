//! Runtime configuration shared (read-only) by every request.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// What to do with an `If-Modified-Since` header that is not an HTTP date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionalPolicy {
    /// Fail the request with a server error
    #[default]
    Strict,
    /// Serve the entry as if no conditional header had been sent
    Lenient,
}

/// Gateway configuration, built once at startup and captured by the router.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    /// Owner (user or organization) of the artifact repository
    pub github_user: String,
    /// Artifact repository name, also the first segment of every route
    pub github_repository: String,
    /// Base of the directory-listing API, e.g. `https://api.github.com`
    pub api_base: String,
    /// Base of the raw-file endpoint, e.g. `https://raw.githubusercontent.com`
    pub raw_base: String,
    /// Base of the badge service, e.g. `https://img.shields.io`
    pub shields_base: String,
    /// Where archives are spooled while a request is served
    pub temp_dir: PathBuf,
    pub connect_timeout: Duration,
    /// Bound on listing and badge calls
    pub upstream_timeout: Duration,
    /// Bound on the whole archive download
    pub archive_timeout: Duration,
    pub conditional_policy: ConditionalPolicy,
}

impl Config {
    /// Defaults pointing at the public GitHub and shields.io endpoints
    pub fn new(github_user: impl Into<String>, github_repository: impl Into<String>) -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 9000)),
            github_user: github_user.into(),
            github_repository: github_repository.into(),
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            shields_base: "https://img.shields.io".to_string(),
            temp_dir: std::env::temp_dir(),
            connect_timeout: Duration::from_secs(10),
            upstream_timeout: Duration::from_secs(30),
            archive_timeout: Duration::from_secs(300),
            conditional_policy: ConditionalPolicy::Strict,
        }
    }

    /// Route prefix for a handler kind, e.g. `/entrepot/javadoc/`
    pub fn prefix(&self, kind: &str) -> String {
        format!("/{}/{}/", self.github_repository, kind)
    }
}
