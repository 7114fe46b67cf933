//! Per-level file index.
//!
//! Level 0 holds files flushed straight from memory; their key ranges may
//! overlap, so a lookup has to consider every file that covers the key.
//! Levels 1 and up hold disjoint files sorted by key, so at most one file can
//! contain a given key and a binary search finds it.
//!
//! A [`Level`] is an immutable member of a point-in-time view of the file
//! layout. Adding a file yields a new `Level` and leaves the old one intact
//! for readers that still hold it.

mod file_meta;
mod lookup;

pub use file_meta::FileMetaData;
pub use lookup::{LookupResult, ReadStats};

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::comparator::InternalKeyComparator;
use crate::config::NUM_LEVELS;
use crate::error::{Error, Result};
use crate::iterator::{LevelIterator, StorageIterator};
use crate::table_cache::TableCache;
use crate::types::{parse_internal_key, InternalKey, LookupKey, ValueType, MAX_SEQUENCE_NUMBER};

/// Index of the first file whose largest key is >= `target`, or
/// `files.len()` if there is none. `files` must be sorted by largest key.
pub fn find_file(
    comparator: &InternalKeyComparator,
    files: &[Arc<FileMetaData>],
    target: &InternalKey,
) -> usize {
    files.partition_point(|file| comparator.compare_keys(file.largest(), target) == Ordering::Less)
}

#[derive(Clone)]
pub struct Level {
    level_number: u32,
    files: Arc<[Arc<FileMetaData>]>,
    table_cache: Arc<dyn TableCache>,
    comparator: InternalKeyComparator,
}

impl Level {
    /// Wraps `files` as level `level_number`.
    ///
    /// For levels >= 1 the files must already be sorted by largest key with
    /// disjoint ranges; [`LevelBuilder`] takes care of the sorting. A level
    /// number of [`NUM_LEVELS`] or more is an invalid argument.
    pub fn new(
        level_number: u32,
        files: Vec<Arc<FileMetaData>>,
        table_cache: Arc<dyn TableCache>,
        comparator: InternalKeyComparator,
    ) -> Result<Self> {
        if level_number >= NUM_LEVELS {
            return Err(Error::invalid_argument(format!(
                "level {level_number} out of range (max {})",
                NUM_LEVELS - 1
            )));
        }
        Ok(Self::from_sorted(level_number, files, table_cache, comparator))
    }

    fn from_sorted(
        level_number: u32,
        files: Vec<Arc<FileMetaData>>,
        table_cache: Arc<dyn TableCache>,
        comparator: InternalKeyComparator,
    ) -> Self {
        if level_number > 0 {
            debug_assert!(
                files.windows(2).all(|pair| {
                    comparator.compare_keys(pair[0].largest(), pair[1].smallest()) == Ordering::Less
                }),
                "files of level {level_number} overlap or are out of order"
            );
        }
        Self {
            level_number,
            files: files.into(),
            table_cache,
            comparator,
        }
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    pub fn files(&self) -> &[Arc<FileMetaData>] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn comparator(&self) -> &InternalKeyComparator {
        &self.comparator
    }

    /// Looks `key` up in this level.
    ///
    /// `Ok(None)` means no file of the level holds an entry for the user key
    /// at or below the lookup sequence. A tombstone is reported as
    /// [`LookupResult::Deleted`] and ends the lookup.
    ///
    /// `stats` is cleared first. If more than one file had to be read, it
    /// ends up naming the first file that was read in vain.
    pub fn get(&self, key: &LookupKey, stats: &mut ReadStats) -> Result<Option<LookupResult>> {
        stats.clear();
        if self.files.is_empty() {
            return Ok(None);
        }

        let candidates = self.candidates(key);
        trace!(
            level = self.level_number,
            candidates = candidates.len(),
            ?key,
            "level lookup"
        );

        let mut last_file_read: Option<&Arc<FileMetaData>> = None;
        for file in candidates {
            if stats.seek_file.is_none() {
                if let Some(previous) = last_file_read {
                    stats.seek_file = Some(Arc::clone(previous));
                    stats.seek_file_level = Some(self.level_number);
                }
            }
            last_file_read = Some(file);

            let mut iter = self.table_cache.new_iterator(file)?;
            iter.seek(key.encoded_internal_key())?;
            if !iter.is_valid() {
                continue;
            }

            let (user_key, _, value_type) = parse_internal_key(iter.key())?;
            if self.comparator.compare_user_keys(user_key, key.user_key()) != Ordering::Equal {
                continue;
            }

            let result = match value_type {
                ValueType::Value => LookupResult::Found {
                    key: key.clone(),
                    value: Bytes::copy_from_slice(iter.value()),
                },
                ValueType::Deletion => LookupResult::Deleted { key: key.clone() },
            };
            trace!(
                level = self.level_number,
                file = file.file_number(),
                deleted = result.is_deleted(),
                "level lookup hit"
            );
            return Ok(Some(result));
        }

        trace!(level = self.level_number, "level lookup miss");
        Ok(None)
    }

    /// Files that may hold `key`, in the order they must be consulted.
    fn candidates(&self, key: &LookupKey) -> Vec<&Arc<FileMetaData>> {
        if self.level_number == 0 {
            let user_key = key.user_key();
            let mut candidates: Vec<_> = self
                .files
                .iter()
                .filter(|file| {
                    self.comparator.compare_user_keys(user_key, file.smallest().user_key())
                        != Ordering::Less
                        && self.comparator.compare_user_keys(user_key, file.largest().user_key())
                            != Ordering::Greater
                })
                .collect();
            // Newer files hold newer data.
            candidates.sort_by(|a, b| b.file_number().cmp(&a.file_number()));
            return candidates;
        }

        let index = find_file(&self.comparator, &self.files, key.internal_key());
        match self.files.get(index) {
            Some(file)
                if self
                    .comparator
                    .compare_user_keys(key.user_key(), file.smallest().user_key())
                    != Ordering::Less =>
            {
                vec![file]
            }
            _ => Vec::new(),
        }
    }

    /// Whether any file of the level overlaps the user-key range
    /// `[smallest_user_key, largest_user_key]`.
    pub fn some_file_overlaps_range(&self, smallest_user_key: &[u8], largest_user_key: &[u8]) -> bool {
        if self.level_number == 0 {
            return self.files.iter().any(|file| {
                self.comparator.compare_user_keys(smallest_user_key, file.largest().user_key())
                    != Ordering::Greater
                    && self.comparator.compare_user_keys(largest_user_key, file.smallest().user_key())
                        != Ordering::Less
            });
        }

        let target = InternalKey::new(
            Bytes::copy_from_slice(smallest_user_key),
            MAX_SEQUENCE_NUMBER,
            ValueType::Value,
        );
        let index = find_file(&self.comparator, &self.files, &target);
        match self.files.get(index) {
            Some(file) => {
                self.comparator
                    .compare_user_keys(file.smallest().user_key(), largest_user_key)
                    != Ordering::Greater
            }
            None => false,
        }
    }

    /// New level holding this level's files plus `file`.
    ///
    /// For levels >= 1 the file is inserted at its sorted position; level 0
    /// keeps insertion order. `self` is left unchanged.
    pub fn add_file(&self, file: Arc<FileMetaData>) -> Level {
        let mut files = self.files.to_vec();
        if self.level_number == 0 {
            files.push(file);
        } else {
            let index = find_file(&self.comparator, &files, file.largest());
            files.insert(index, file);
        }
        Level::from_sorted(
            self.level_number,
            files,
            Arc::clone(&self.table_cache),
            self.comparator.clone(),
        )
    }

    /// Iterator over every entry of the level, file after file.
    pub fn iter(&self) -> LevelIterator {
        LevelIterator::new(
            self.level_number,
            Arc::clone(&self.files),
            Arc::clone(&self.table_cache),
            self.comparator.clone(),
        )
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("level_number", &self.level_number)
            .field("files", &self.files)
            .finish()
    }
}

/// Collects files and builds a [`Level`] once.
pub struct LevelBuilder {
    level_number: u32,
    files: Vec<Arc<FileMetaData>>,
    table_cache: Arc<dyn TableCache>,
    comparator: InternalKeyComparator,
}

impl LevelBuilder {
    pub fn new(level_number: u32, table_cache: Arc<dyn TableCache>, comparator: InternalKeyComparator) -> Self {
        Self {
            level_number,
            files: Vec::new(),
            table_cache,
            comparator,
        }
    }

    /// Starts from the files of an existing level.
    pub fn from_level(level: &Level) -> Self {
        Self {
            level_number: level.level_number,
            files: level.files.to_vec(),
            table_cache: Arc::clone(&level.table_cache),
            comparator: level.comparator.clone(),
        }
    }

    pub fn add_file(mut self, file: Arc<FileMetaData>) -> Self {
        self.files.push(file);
        self
    }

    /// Drops the file numbered `file_number`, if present.
    pub fn remove_file(mut self, file_number: u64) -> Self {
        self.files.retain(|file| file.file_number() != file_number);
        self
    }

    pub fn build(mut self) -> Result<Level> {
        if self.level_number > 0 {
            let comparator = &self.comparator;
            self.files
                .sort_by(|a, b| comparator.compare_keys(a.largest(), b.largest()));
        }
        Level::new(self.level_number, self.files, self.table_cache, self.comparator)
    }
}
