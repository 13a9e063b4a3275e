use std::io;
use thiserror::Error;

/// Structural problems found while indexing or opening an archive
#[derive(Debug, Error)]
pub enum ArchiveFormatError {
    #[error("Not a valid ZIP file")]
    NotZip,

    #[error("Invalid ZIP64 format")]
    InvalidZip64,

    #[error("Invalid Central Directory File Header")]
    InvalidCentralDirectory,

    #[error("Invalid Local File Header")]
    InvalidLocalHeader,

    #[error("Truncated archive: {0}")]
    Truncated(&'static str),

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("I/O error while reading archive: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ArchiveFormatError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ArchiveFormatError::Truncated("unexpected end of data")
        } else {
            ArchiveFormatError::Io(err)
        }
    }
}
