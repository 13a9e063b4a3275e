use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ConditionalPolicy, Config};

#[derive(Parser, Debug)]
#[command(name = "entrepot-gateway")]
#[command(version)]
#[command(about = "Serve badges, usage pages and Javadoc files from a GitHub-hosted Maven repository", long_about = None)]
#[command(after_help = "Examples:\n  \
  entrepot-gateway --bind 127.0.0.1:9000\n  \
  entrepot-gateway --github-user acme --github-repository artifacts --lenient-conditional")]
pub struct Cli {
    /// Address to bind
    #[arg(long, env = "ENTREPOT_BIND", default_value = "0.0.0.0:9000")]
    pub bind: SocketAddr,

    /// GitHub user name (or organization)
    #[arg(long, env = "ENTREPOT_GITHUB_USER", default_value = "zengularity")]
    pub github_user: String,

    /// GitHub repository (not prefixed by the user)
    #[arg(long, env = "ENTREPOT_GITHUB_REPOSITORY", default_value = "entrepot")]
    pub github_repository: String,

    /// Base URL of the contents listing API
    #[arg(long, env = "ENTREPOT_API_BASE", default_value = "https://api.github.com")]
    pub api_base: String,

    /// Base URL of the raw file endpoint
    #[arg(long, env = "ENTREPOT_RAW_BASE", default_value = "https://raw.githubusercontent.com")]
    pub raw_base: String,

    /// Base URL of the badge service
    #[arg(long, env = "ENTREPOT_SHIELDS_BASE", default_value = "https://img.shields.io")]
    pub shields_base: String,

    /// Directory for transient archive files (default: system temp dir)
    #[arg(long, env = "ENTREPOT_TEMP_DIR", value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Connect timeout for outbound calls, in seconds
    #[arg(long, env = "ENTREPOT_CONNECT_TIMEOUT", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Timeout for listing and badge calls, in seconds
    #[arg(long, env = "ENTREPOT_UPSTREAM_TIMEOUT", default_value_t = 30)]
    pub upstream_timeout: u64,

    /// Timeout for a whole archive download, in seconds
    #[arg(long, env = "ENTREPOT_ARCHIVE_TIMEOUT", default_value_t = 300)]
    pub archive_timeout: u64,

    /// Treat a malformed If-Modified-Since header as absent instead of failing
    #[arg(long, env = "ENTREPOT_LENIENT_CONDITIONAL")]
    pub lenient_conditional: bool,
}

impl Cli {
    pub fn config(&self) -> Config {
        let mut config = Config::new(&self.github_user, &self.github_repository);
        config.bind = self.bind;
        config.api_base = trim_base(&self.api_base);
        config.raw_base = trim_base(&self.raw_base);
        config.shields_base = trim_base(&self.shields_base);
        if let Some(dir) = &self.temp_dir {
            config.temp_dir = dir.clone();
        }
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        config.upstream_timeout = Duration::from_secs(self.upstream_timeout);
        config.archive_timeout = Duration::from_secs(self.archive_timeout);
        config.conditional_policy = if self.lenient_conditional {
            ConditionalPolicy::Lenient
        } else {
            ConditionalPolicy::Strict
        };
        config
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_public_endpoints() {
        let cli = Cli::parse_from(["entrepot-gateway"]);
        let config = cli.config();

        assert_eq!(config.github_user, "zengularity");
        assert_eq!(config.github_repository, "entrepot");
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.conditional_policy, ConditionalPolicy::Strict);
        assert_eq!(config.prefix("javadoc"), "/entrepot/javadoc/");
    }

    #[test]
    fn overrides_are_applied() {
        let cli = Cli::parse_from([
            "entrepot-gateway",
            "--github-repository",
            "artifacts",
            "--raw-base",
            "http://127.0.0.1:8080/",
            "--archive-timeout",
            "5",
            "--lenient-conditional",
        ]);
        let config = cli.config();

        assert_eq!(config.github_repository, "artifacts");
        assert_eq!(config.raw_base, "http://127.0.0.1:8080");
        assert_eq!(config.archive_timeout, Duration::from_secs(5));
        assert_eq!(config.conditional_policy, ConditionalPolicy::Lenient);
    }
}
