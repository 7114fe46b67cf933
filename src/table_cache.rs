use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use moka::sync::Cache;
use tracing::debug;

use crate::comparator::{Comparator, InternalKeyComparator};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::level::FileMetaData;
use crate::sstable::{table_file_name, Table};

/// Hands out iterators over table files by file number.
///
/// Levels only ever talk to tables through this trait. `new_iterator` may do
/// blocking file IO.
pub trait TableCache: Send + Sync {
    /// Unpositioned iterator over the file's entries (encoded internal keys).
    fn new_iterator(&self, file: &FileMetaData) -> Result<Box<dyn StorageIterator + Send>>;
}

/// [`TableCache`] over a directory of table files named `{number:06}.{ext}`.
///
/// Tables are opened on first use. At most `Options::max_open_files` stay
/// cached; the least useful ones are dropped when it fills up. A dropped
/// table closes its file once the last iterator over it goes away.
pub struct FileTableCache {
    dir: PathBuf,
    options: Options,
    comparator: Arc<dyn Comparator>,
    tables: Cache<u64, Arc<Table>>,
}

impl FileTableCache {
    pub fn new(dir: impl AsRef<Path>, options: Options) -> Self {
        let comparator: Arc<dyn Comparator> =
            Arc::new(InternalKeyComparator::new(Arc::clone(&options.comparator)));
        let tables = Cache::new(options.max_open_files);
        Self {
            dir: dir.as_ref().to_path_buf(),
            options,
            comparator,
            tables,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, file_number: u64) -> PathBuf {
        self.dir
            .join(table_file_name(file_number, &self.options.table_file_extension))
    }

    /// Open table for `file`, opening it if it is not cached yet.
    pub fn find_table(&self, file: &FileMetaData) -> Result<Arc<Table>> {
        if let Some(table) = self.tables.get(&file.file_number()) {
            return Ok(table);
        }

        // Opened outside the cache; a racing opener may win the insert.
        let table = Arc::new(self.open_table(file)?);
        let entry = self.tables.entry(file.file_number()).or_insert(table);
        Ok(entry.into_value())
    }

    /// First entry of `file` with key >= `internal_key`.
    pub fn get(&self, file: &FileMetaData, internal_key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.find_table(file)?.get(internal_key)
    }

    /// Drops the cached table for `file_number`, if any.
    pub fn evict(&self, file_number: u64) {
        if self.tables.contains_key(&file_number) {
            self.tables.invalidate(&file_number);
            debug!(file_number, "evicted table");
        }
    }

    /// Number of cached tables, after pending evictions are applied.
    pub fn len(&self) -> usize {
        self.tables.run_pending_tasks();
        self.tables.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn open_table(&self, file: &FileMetaData) -> Result<Table> {
        let path = self.table_path(file.file_number());
        let handle = File::open(&path)?;
        let actual_size = handle.metadata()?.len();
        if actual_size != file.file_size() {
            return Err(Error::corruption(format!(
                "{} is {actual_size} bytes, expected {}",
                path.display(),
                file.file_size()
            )));
        }
        Table::open(
            path.display().to_string(),
            handle,
            Arc::clone(&self.comparator),
            self.options.verify_checksums,
        )
    }
}

impl TableCache for FileTableCache {
    fn new_iterator(&self, file: &FileMetaData) -> Result<Box<dyn StorageIterator + Send>> {
        Ok(Box::new(self.find_table(file)?.iter()))
    }
}
