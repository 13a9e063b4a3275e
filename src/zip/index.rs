use std::collections::HashMap;

use crate::io::ReadAt;

use super::error::ArchiveFormatError;
use super::parser::ZipParser;
use super::structures::ArchiveEntry;

/// Entry metadata of one archive, keyed by the exact in-archive path.
///
/// Holds no entry data: offsets point into the source the index was built
/// from, so the two must be kept (and dropped) together.
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    entries: HashMap<String, ArchiveEntry>,
}

impl ArchiveIndex {
    /// Parse the central directory of `source` into an index.
    ///
    /// When a name appears more than once, the last record wins.
    pub async fn build<R: ReadAt>(source: &R) -> Result<Self, ArchiveFormatError> {
        let parser = ZipParser::new(source);
        let records = parser.read_central_directory().await?;

        let mut entries = HashMap::with_capacity(records.len());
        for entry in records {
            entries.insert(entry.path.clone(), entry);
        }

        Ok(Self { entries })
    }

    /// Exact-match lookup; no path normalization is applied
    pub fn get(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
