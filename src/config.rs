//! Format constants and reader options.

use std::fmt;
use std::sync::Arc;

use crate::comparator::{BytewiseComparator, Comparator};

/// Number of levels in the tree.
pub const NUM_LEVELS: u32 = 7;

/// Level-0 compaction is started when we hit this many files.
pub const L0_COMPACTION_TRIGGER: usize = 4;

/// Writes are slowed down once level 0 holds this many files.
pub const L0_SLOWDOWN_WRITES_TRIGGER: usize = 8;

/// Writes stop once level 0 holds this many files.
pub const L0_STOP_WRITES_TRIGGER: usize = 12;

/// Highest level a flushed memtable may be pushed to when it overlaps nothing.
pub const MAX_MEM_COMPACT_LEVEL: u32 = 2;

/// Options shared by the table readers and the table cache.
#[derive(Clone)]
pub struct Options {
    /// Recompute the checksum of every data block read.
    /// The index block is always verified.
    pub verify_checksums: bool,

    /// Orders user keys. The internal-key order is derived from it.
    pub comparator: Arc<dyn Comparator>,

    /// Extension of table files inside the table directory.
    pub table_file_extension: String,

    /// Most tables the table cache keeps open at once.
    pub max_open_files: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            comparator: Arc::new(BytewiseComparator),
            table_file_extension: "ldb".to_string(),
            max_open_files: 1000,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("verify_checksums", &self.verify_checksums)
            .field("comparator", &self.comparator.name())
            .field("table_file_extension", &self.table_file_extension)
            .field("max_open_files", &self.max_open_files)
            .finish()
    }
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }
}

/// Builder for [`Options`].
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.options.verify_checksums = verify;
        self
    }

    pub fn comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.options.comparator = comparator;
        self
    }

    pub fn table_file_extension(mut self, ext: impl Into<String>) -> Self {
        self.options.table_file_extension = ext.into();
        self
    }

    pub fn max_open_files(mut self, max_open_files: u64) -> Self {
        self.options.max_open_files = max_open_files;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}
