use std::sync::Arc;

use bytes::Bytes;

use super::FileMetaData;
use crate::types::LookupKey;

/// Outcome of a point lookup that hit an entry for the key.
///
/// Absence (no entry at all) is `None` at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Found { key: LookupKey, value: Bytes },
    /// The newest visible entry is a tombstone. Terminal for the lookup.
    Deleted { key: LookupKey },
}

impl LookupResult {
    pub fn key(&self) -> &LookupKey {
        match self {
            LookupResult::Found { key, .. } | LookupResult::Deleted { key } => key,
        }
    }

    pub fn value(&self) -> Option<&Bytes> {
        match self {
            LookupResult::Found { value, .. } => Some(value),
            LookupResult::Deleted { .. } => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, LookupResult::Deleted { .. })
    }
}

/// Scratch record filled by [`Level::get`](super::Level::get).
///
/// When a lookup has to read more than one file of a level, the first file
/// that was read without result is recorded here. The surrounding engine
/// charges it a seek and compacts it once it has wasted too many.
#[derive(Debug, Clone, Default)]
pub struct ReadStats {
    pub seek_file: Option<Arc<FileMetaData>>,
    pub seek_file_level: Option<u32>,
}

impl ReadStats {
    pub fn clear(&mut self) {
        self.seek_file = None;
        self.seek_file_level = None;
    }
}
