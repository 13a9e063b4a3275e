//! ZIP archive indexing and entry extraction.
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! [`ArchiveIndex`] reads the EOCD first, then the Central Directory, and
//! keeps only entry metadata. Entry bytes are decompressed lazily by
//! [`EntryReader`] when an entry is actually served.
//!
//! ## Supported Features
//!
//! - ZIP64 extensions for archives > 4GB
//! - STORED and DEFLATE compression methods
//! - Extended timestamp (0x5455) modification times, MS-DOS times otherwise
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod entry;
mod error;
mod index;
mod parser;
mod structures;

pub use entry::EntryReader;
pub use error::ArchiveFormatError;
pub use index::ArchiveIndex;
pub use parser::ZipParser;
pub use structures::*;

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::io::{self, Cursor, Write};

    use crate::io::ReadAt;

    /// In-memory archive source for parser tests
    pub struct MemorySource(pub Vec<u8>);

    #[async_trait]
    impl ReadAt for MemorySource {
        async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            let start = (offset as usize).min(self.0.len());
            let n = buf.len().min(self.0.len() - start);
            buf[..n].copy_from_slice(&self.0[start..start + n]);
            Ok(n)
        }

        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    pub fn build_archive(files: &[(&str, &[u8], ::zip::CompressionMethod)]) -> Vec<u8> {
        build_archive_with_comment(files, "")
    }

    /// Write `files` into a fresh archive, every entry dated 2021-01-01T00:00:00Z
    pub fn build_archive_with_comment(
        files: &[(&str, &[u8], ::zip::CompressionMethod)],
        comment: &str,
    ) -> Vec<u8> {
        let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        let modified = ::zip::DateTime::from_date_and_time(2021, 1, 1, 0, 0, 0).unwrap();

        for (name, data, method) in files {
            let options = ::zip::write::SimpleFileOptions::default()
                .compression_method(*method)
                .last_modified_time(modified);
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }

        if !comment.is_empty() {
            writer.set_comment(comment);
        }
        writer.finish().unwrap().into_inner()
    }
}
