use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::{self, Read};

use crate::io::TransientBlob;

use super::error::ArchiveFormatError;
use super::structures::{ArchiveEntry, CompressionMethod};

/// Decompressing reader over a single archive entry.
///
/// Owns the blob it reads from, so dropping the reader releases the archive's
/// temporary storage. At end of data the CRC-32 and length recorded in the
/// central directory are checked; a mismatch surfaces as `InvalidData`.
pub struct EntryReader {
    inner: Box<dyn Read + Send>,
    path: String,
    crc: Crc,
    expected_crc: u32,
    expected_size: u64,
}

impl EntryReader {
    /// Open `entry`, whose data starts at `data_offset` within `blob`.
    ///
    /// # Errors
    ///
    /// [`ArchiveFormatError::UnsupportedCompression`] for anything other than
    /// STORED or DEFLATE. The blob is dropped (and deleted) on failure.
    pub fn open(
        blob: TransientBlob,
        entry: &ArchiveEntry,
        data_offset: u64,
    ) -> Result<Self, ArchiveFormatError> {
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            return Err(ArchiveFormatError::UnsupportedCompression(method));
        }

        let raw = blob.into_reader(data_offset)?.take(entry.compressed_size);
        let inner: Box<dyn Read + Send> = match entry.compression_method {
            CompressionMethod::Deflate => Box::new(DeflateDecoder::new(raw)),
            _ => Box::new(raw),
        };

        Ok(Self {
            inner,
            path: entry.path.clone(),
            crc: Crc::new(),
            expected_crc: entry.crc32,
            expected_size: entry.uncompressed_size,
        })
    }

    fn verify(&self) -> io::Result<()> {
        if u64::from(self.crc.amount()) != self.expected_size & 0xFFFF_FFFF
            || self.crc.sum() != self.expected_crc
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checksum mismatch for '{}'", self.path),
            ));
        }
        Ok(())
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.verify()?;
        }
        self.crc.update(&buf[..n]);
        Ok(n)
    }
}
