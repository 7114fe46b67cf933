use std::sync::Arc;

use super::StorageIterator;
use crate::comparator::InternalKeyComparator;
use crate::error::Result;
use crate::level::{find_file, FileMetaData};
use crate::table_cache::TableCache;
use crate::types::InternalKey;

/// Concatenates the tables of one level, opening each through the
/// [`TableCache`] only when iteration reaches it.
///
/// For sorted levels the result is one ordered sequence. Level 0 files are
/// walked in list order without merging.
pub struct LevelIterator {
    level_number: u32,
    files: Arc<[Arc<FileMetaData>]>,
    table_cache: Arc<dyn TableCache>,
    comparator: InternalKeyComparator,
    file_index: usize,
    current: Option<Box<dyn StorageIterator + Send>>,
}

impl LevelIterator {
    pub fn new(
        level_number: u32,
        files: Arc<[Arc<FileMetaData>]>,
        table_cache: Arc<dyn TableCache>,
        comparator: InternalKeyComparator,
    ) -> Self {
        let file_index = files.len();
        Self {
            level_number,
            files,
            table_cache,
            comparator,
            file_index,
            current: None,
        }
    }

    /// File the iterator is currently reading, if any.
    pub fn current_file(&self) -> Option<&Arc<FileMetaData>> {
        self.current.as_ref().and(self.files.get(self.file_index))
    }

    fn open_file(&mut self, index: usize) -> Result<()> {
        self.file_index = index.min(self.files.len());
        self.current = None;
        if let Some(file) = self.files.get(self.file_index) {
            self.current = Some(self.table_cache.new_iterator(file)?);
        }
        Ok(())
    }

    /// Runs `op`; a failure drops the current file and leaves the iterator
    /// invalid.
    fn or_reset(&mut self, op: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let result = op(self);
        if result.is_err() {
            self.current = None;
            self.file_index = self.files.len();
        }
        result
    }

    fn seek_files(&mut self, target: &[u8]) -> Result<()> {
        let mut index = if self.level_number == 0 {
            0
        } else {
            find_file(&self.comparator, &self.files, &InternalKey::decode(target)?)
        };
        loop {
            self.open_file(index)?;
            match self.current.as_mut() {
                Some(iter) => {
                    iter.seek(target)?;
                    if iter.is_valid() {
                        return Ok(());
                    }
                }
                None => return Ok(()),
            }
            index += 1;
        }
    }

    /// Steps to later files while the current one has nothing left.
    fn skip_empty_files_forward(&mut self) -> Result<()> {
        while self.current.as_ref().is_some_and(|iter| !iter.is_valid()) {
            self.open_file(self.file_index + 1)?;
            if let Some(iter) = self.current.as_mut() {
                iter.seek_to_first()?;
            }
        }
        Ok(())
    }
}

impl StorageIterator for LevelIterator {
    fn key(&self) -> &[u8] {
        match &self.current {
            Some(iter) => iter.key(),
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match &self.current {
            Some(iter) => iter.value(),
            None => &[],
        }
    }

    fn is_valid(&self) -> bool {
        self.current.as_ref().is_some_and(|iter| iter.is_valid())
    }

    fn next(&mut self) -> Result<()> {
        self.or_reset(|level_iter| {
            if let Some(iter) = level_iter.current.as_mut() {
                iter.next()?;
                level_iter.skip_empty_files_forward()?;
            }
            Ok(())
        })
    }

    fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.or_reset(|level_iter| level_iter.seek_files(target))
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.or_reset(|level_iter| {
            level_iter.open_file(0)?;
            if let Some(iter) = level_iter.current.as_mut() {
                iter.seek_to_first()?;
            }
            level_iter.skip_empty_files_forward()
        })
    }
}
