use std::fmt;

use crate::types::InternalKey;

/// Descriptor of one table file: its number, size and key range.
///
/// Created when a table is finalized and never changed afterwards; levels
/// share descriptors through `Arc`.
#[derive(Clone, PartialEq, Eq)]
pub struct FileMetaData {
    file_number: u64,
    file_size: u64,
    smallest: InternalKey,
    largest: InternalKey,
}

impl FileMetaData {
    pub fn new(file_number: u64, file_size: u64, smallest: InternalKey, largest: InternalKey) -> Self {
        Self {
            file_number,
            file_size,
            smallest,
            largest,
        }
    }

    pub fn file_number(&self) -> u64 {
        self.file_number
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Smallest internal key stored in the file.
    pub fn smallest(&self) -> &InternalKey {
        &self.smallest
    }

    /// Largest internal key stored in the file.
    pub fn largest(&self) -> &InternalKey {
        &self.largest
    }
}

impl fmt::Debug for FileMetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} ({} bytes) [{:?} .. {:?}]",
            self.file_number, self.file_size, self.smallest, self.largest
        )
    }
}
