// Shared fixtures for the integration tests: a table file writer built on
// BlockBuilder and an in-memory TableCache.
#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::BufMut;
use parking_lot::Mutex;

use lsm_store::coding::masked_crc32c;
use lsm_store::comparator::{Comparator, InternalKeyComparator};
use lsm_store::error::Result;
use lsm_store::iterator::StorageIterator;
use lsm_store::level::FileMetaData;
use lsm_store::sstable::{BlockBuilder, BlockHandle, CompressionType, Footer};
use lsm_store::table_cache::TableCache;
use lsm_store::types::{InternalKey, SequenceNumber, ValueType};

pub type Entry = (Vec<u8>, Vec<u8>);

/// Encoded internal key.
pub fn ikey(user_key: &str, sequence: SequenceNumber, value_type: ValueType) -> Vec<u8> {
    InternalKey::new(user_key.as_bytes().to_vec(), sequence, value_type).encode()
}

pub fn put(user_key: &str, sequence: SequenceNumber, value: &str) -> Entry {
    (ikey(user_key, sequence, ValueType::Value), value.as_bytes().to_vec())
}

pub fn del(user_key: &str, sequence: SequenceNumber) -> Entry {
    (ikey(user_key, sequence, ValueType::Deletion), Vec::new())
}

// =============================================================================
// Table file fixture
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    pub block_size: usize,
    pub restart_interval: usize,
    pub data_compression: CompressionType,
    pub index_compression: CompressionType,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            block_size: 4096,
            restart_interval: 16,
            data_compression: CompressionType::None,
            index_compression: CompressionType::None,
        }
    }
}

impl TableOptions {
    pub fn compressed(compression: CompressionType) -> Self {
        Self {
            data_compression: compression,
            index_compression: compression,
            ..Self::default()
        }
    }
}

/// What the fixture wrote, for assertions about layout.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub file_size: u64,
    pub data_blocks: Vec<BlockHandle>,
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

fn compress(contents: &[u8], compression: CompressionType) -> Vec<u8> {
    match compression {
        CompressionType::None => contents.to_vec(),
        CompressionType::Snappy => snap::raw::Encoder::new().compress_vec(contents).unwrap(),
        CompressionType::Zstd => zstd::stream::encode_all(contents, 0).unwrap(),
    }
}

fn write_block(out: &mut Vec<u8>, contents: &[u8], compression: CompressionType) -> BlockHandle {
    let raw = compress(contents, compression);
    let handle = BlockHandle::new(out.len() as u64, raw.len() as u64);
    let tag = compression as u8;
    out.put_slice(&raw);
    out.put_u8(tag);
    out.put_u32_le(masked_crc32c(&raw, &[tag]));
    handle
}

/// Encodes sorted `entries` as a table image.
pub fn build_table(entries: &[Entry], options: TableOptions) -> (Vec<u8>, TableLayout) {
    let mut out = Vec::new();
    let mut data_blocks = Vec::new();
    let mut index = BlockBuilder::with_restart_interval(usize::MAX, 1);
    let mut block = BlockBuilder::with_restart_interval(options.block_size, options.restart_interval);

    let mut flush = |block: BlockBuilder, out: &mut Vec<u8>, index: &mut BlockBuilder| {
        let last_key = block.last_key().to_vec();
        let handle = write_block(out, &block.build(), options.data_compression);
        index.add(&last_key, &handle.encode());
        data_blocks.push(handle);
    };

    for (key, value) in entries {
        if !block.add(key, value) {
            let full = std::mem::replace(
                &mut block,
                BlockBuilder::with_restart_interval(options.block_size, options.restart_interval),
            );
            flush(full, &mut out, &mut index);
            assert!(block.add(key, value));
        }
    }
    if !block.is_empty() {
        flush(block, &mut out, &mut index);
    }

    let metaindex = BlockBuilder::new(4096).build();
    let metaindex_handle = write_block(&mut out, &metaindex, options.index_compression);
    let index_handle = write_block(&mut out, &index.build(), options.index_compression);
    out.put_slice(&Footer::new(metaindex_handle, index_handle).encode());

    let layout = TableLayout {
        file_size: out.len() as u64,
        data_blocks,
        metaindex_handle,
        index_handle,
    };
    (out, layout)
}

/// Writes sorted `entries` as a table file at `path`.
pub fn write_table(path: &Path, entries: &[Entry], options: TableOptions) -> TableLayout {
    let (image, layout) = build_table(entries, options);
    fs::write(path, image).unwrap();
    layout
}

/// Descriptor for a file holding the sorted internal-key `entries`.
pub fn file_meta(file_number: u64, file_size: u64, entries: &[Entry]) -> Arc<FileMetaData> {
    let smallest = InternalKey::decode(&entries[0].0).unwrap();
    let largest = InternalKey::decode(&entries[entries.len() - 1].0).unwrap();
    Arc::new(FileMetaData::new(file_number, file_size, smallest, largest))
}

// =============================================================================
// In-memory TableCache
// =============================================================================

/// Serves iterators over sorted in-memory entry lists and records which
/// files were opened.
pub struct MemTableCache {
    comparator: InternalKeyComparator,
    tables: HashMap<u64, Arc<Vec<Entry>>>,
    opened: Mutex<Vec<u64>>,
}

impl MemTableCache {
    pub fn new() -> Self {
        Self {
            comparator: InternalKeyComparator::default(),
            tables: HashMap::new(),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Registers `entries` (sorted internal keys) as file `file_number`.
    pub fn insert(&mut self, file_number: u64, entries: Vec<Entry>) -> Arc<FileMetaData> {
        let meta = file_meta(file_number, 0, &entries);
        self.tables.insert(file_number, Arc::new(entries));
        meta
    }

    /// File numbers opened so far, in order.
    pub fn opened(&self) -> Vec<u64> {
        self.opened.lock().clone()
    }

    pub fn reset_opened(&self) {
        self.opened.lock().clear();
    }
}

impl TableCache for MemTableCache {
    fn new_iterator(&self, file: &FileMetaData) -> Result<Box<dyn StorageIterator + Send>> {
        let entries = self.tables.get(&file.file_number()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no table {}", file.file_number()))
        })?;
        self.opened.lock().push(file.file_number());
        Ok(Box::new(VecIterator {
            entries: Arc::clone(entries),
            comparator: self.comparator.clone(),
            pos: entries.len(),
        }))
    }
}

pub struct VecIterator {
    entries: Arc<Vec<Entry>>,
    comparator: InternalKeyComparator,
    pos: usize,
}

impl StorageIterator for VecIterator {
    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos].1
    }

    fn is_valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn next(&mut self) -> Result<()> {
        if self.is_valid() {
            self.pos += 1;
        }
        Ok(())
    }

    fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.pos = self
            .entries
            .partition_point(|(key, _)| self.comparator.compare(key, target) == Ordering::Less);
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }
}
