//! Process bootstrap: bind, serve, shut down on Ctrl-C.

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::routes::{AppState, router};

/// Human-readable summary of the routes, printed at startup
pub fn banner(config: &Config) -> String {
    let repo = &config.github_repository;
    format!(
        "\
# GitHub as Maven repository

Bound to {bind}

Routes:

  GET /{repo}/shields/(releases|snapshots)/{{a_group}}/{{an_artifact}}.{{ext}}
  => Serve informational shields indicating the latest version
     for the managed dependencies.

  GET /{repo}/pom/(releases|snapshots)/{{a_group}}/{{an_artifact}}
  => Serve HTML guide about how to use the specified dependency.

  GET /{repo}/javadoc/(releases|snapshots)/{{a_group}}/{{an_artifact}}/{{version}}!/path/inside/javadoc-jar/file.ext
  => Serve the contents from the Javadoc JAR ('latest' resolves the newest version)

  Placeholders:

  - a_group: Maven groupId, with / as separator (not .)
  - an_artifact: Maven artifactId, ended with _{{scalaBinary}}
    for the Scala dependencies (e.g. benji-core_2.12)
  - ext: File extension for the shield image (e.g. svg, png)
",
        bind = config.bind,
    )
}

/// Serve the gateway on `config.bind` until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    serve(listener, config).await
}

/// Serve the gateway on an already bound listener until Ctrl-C
pub async fn serve(listener: TcpListener, config: Config) -> Result<()> {
    let state = AppState::new(config).context("failed to build HTTP client")?;
    let app = router(state);

    tracing::info!(addr = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("server error")
}
