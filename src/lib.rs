//! # entrepot-gateway
//!
//! A read-only HTTP gateway over a GitHub repository used as a Maven-style
//! artifact store (`releases|snapshots/<group>/<artifact>/<version>/...`).
//!
//! Three route families are served below `/{repository}/`:
//!
//! - `shields/...`: a badge showing the latest version, proxied from a badge service
//! - `pom/...`: an HTML page explaining how to depend on the artifact
//! - `javadoc/...!/path`: one file out of the artifact's Javadoc jar
//!
//! The Javadoc route downloads the jar into a request-scoped temporary file,
//! indexes its ZIP central directory without decompressing anything, and
//! streams the one requested entry back, honoring `If-Modified-Since`.
//!
//! ## Example
//!
//! ```no_run
//! use entrepot_gateway::{AppState, Config, router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("zengularity", "entrepot");
//!     let app = router(AppState::new(config)?);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:9000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod github;
pub mod io;
pub mod request;
pub mod routes;
pub mod serve;
pub mod server;
pub mod zip;

pub use cli::Cli;
pub use config::{ConditionalPolicy, Config};
pub use error::{GatewayError, GatewayResult};
pub use github::GithubClient;
pub use io::{ReadAt, TransientBlob};
pub use routes::{AppState, router};
pub use zip::{ArchiveEntry, ArchiveFormatError, ArchiveIndex, EntryReader};
