use async_trait::async_trait;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use super::ReadAt;

/// Request-scoped, disk-backed storage for one fetched archive.
///
/// The backing file lives in a caller-chosen directory and is removed when the
/// blob (or the [`BlobReader`] it turns into) is dropped, whatever the exit path.
pub struct TransientBlob {
    file: NamedTempFile,
    len: u64,
}

impl TransientBlob {
    /// Create an empty blob in `dir`, named after `prefix`
    pub fn create_in(dir: &Path, prefix: &str) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".jar")
            .tempfile_in(dir)?;
        Ok(Self { file, len: 0 })
    }

    /// Append a chunk of the archive body
    pub fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk)?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Flush buffered writes so positional reads see the whole body
    pub fn seal(&mut self) -> io::Result<()> {
        self.file.as_file_mut().flush()?;
        self.file.as_file().sync_data()
    }

    /// Number of bytes written so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the backing file (only meaningful while the blob is alive)
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Consume the blob into a sequential reader positioned at `offset`.
    ///
    /// Ownership of the backing file moves with it: the file is deleted once
    /// the reader is dropped.
    pub fn into_reader(mut self, offset: u64) -> io::Result<BlobReader> {
        self.file.as_file_mut().seek(SeekFrom::Start(offset))?;
        Ok(BlobReader { file: self.file })
    }
}

impl std::fmt::Debug for TransientBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientBlob")
            .field("path", &self.file.path())
            .field("len", &self.len)
            .finish()
    }
}

#[async_trait]
impl ReadAt for TransientBlob {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || offset >= self.len {
            return Ok(0);
        }
        positional_read(self.file.as_file(), offset, buf)
    }

    fn size(&self) -> u64 {
        self.len
    }
}

#[cfg(unix)]
fn positional_read(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn positional_read(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(not(any(unix, windows)))]
fn positional_read(_file: &File, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "positional reads are not available on this platform",
    ))
}

/// Sequential reader over a blob's backing file; deletes the file on drop
pub struct BlobReader {
    file: NamedTempFile,
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.as_file_mut().read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_back_appended_chunks_at_any_offset() {
        let dir = tempfile::tempdir().unwrap();
        let mut blob = TransientBlob::create_in(dir.path(), "entrepot").unwrap();
        blob.append(b"hello ").unwrap();
        blob.append(b"world").unwrap();
        blob.seal().unwrap();

        assert_eq!(blob.len(), 11);
        let mut buf = [0u8; 5];
        blob.read_exact_at(6, &mut buf).await.unwrap();
        assert_eq!(&buf, b"world");

        // Reads past the end are short, not errors
        let mut tail = [0u8; 4];
        assert_eq!(blob.read_at(11, &mut tail).await.unwrap(), 0);
        assert!(blob.read_exact_at(9, &mut tail).await.is_err());
    }

    #[test]
    fn backing_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let blob = TransientBlob::create_in(dir.path(), "entrepot").unwrap();
        let path = blob.path().to_path_buf();
        assert!(path.exists());

        drop(blob);
        assert!(!path.exists());
    }

    #[test]
    fn reader_owns_the_file_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut blob = TransientBlob::create_in(dir.path(), "entrepot").unwrap();
        blob.append(b"0123456789").unwrap();
        blob.seal().unwrap();
        let path = blob.path().to_path_buf();

        let mut reader = blob.into_reader(4).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "456789");
        assert!(path.exists());

        drop(reader);
        assert!(!path.exists());
    }
}
