//! Gateway error taxonomy and its mapping onto HTTP responses.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::zip::ArchiveFormatError;

/// Result alias used by the request handlers
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Every way a gateway request can fail.
///
/// Each variant maps to one status code; the body is always the plain-text
/// `Display` message.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed request path
    #[error("{0}")]
    BadRequest(String),

    /// An outbound call could not be completed (DNS, connect, timeout)
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] reqwest::Error),

    /// The listing endpoint answered with something unusable
    #[error("unexpected upstream response: {0}")]
    Upstream(String),

    /// The listing holds no version for the dependency
    #[error("Dependency not found: {0}")]
    NoSuchVersion(String),

    /// The archive response declared no usable length
    #[error("Invalid javadoc size: {0}")]
    InvalidArchiveDeclaration(String),

    /// Copying the archive body into temporary storage failed
    #[error("failed to transfer archive: {0}")]
    Transfer(String),

    #[error(transparent)]
    ArchiveFormat(#[from] ArchiveFormatError),

    /// The requested path is absent from the archive
    #[error("Path '{0}' not found in Javadoc jar")]
    EntryNotFound(String),

    /// `If-Modified-Since` is not an HTTP date
    #[error("invalid If-Modified-Since header: {0}")]
    ConditionalHeaderParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoSuchVersion(_) | Self::EntryNotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable(_)
            | Self::Upstream(_)
            | Self::InvalidArchiveDeclaration(_)
            | Self::Transfer(_)
            | Self::ArchiveFormat(_)
            | Self::ConditionalHeaderParse(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "request rejected");
        }

        (
            status,
            [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())],
            message,
        )
            .into_response()
    }
}
