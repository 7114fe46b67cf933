pub mod builder;

use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;

use crate::coding::{decode_fixed32, BufExt};
use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;

/// A decoded (decompressed, trailer stripped) block.
///
/// Layout:
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │ entry: shared(v32) non_shared(v32) value_len(v32) key' value │
/// │ ...                                                          │
/// ├──────────────────────────────────────────────────────────────┤
/// │ restart offsets: [u32 LE] * num_restarts                     │
/// │ num_restarts: u32 LE                                         │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// Keys are prefix-compressed against the previous key, except at restart
/// points where `shared` is 0. Binary search runs over the restart points,
/// then a short linear scan finishes the job.
///
/// Cloning is cheap: the contents are a shared [`Bytes`].
#[derive(Clone)]
pub struct Block {
    data: Bytes,
    restart_offset: usize,
    num_restarts: usize,
}

impl Block {
    pub fn new(data: Bytes) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::corruption("block too short"));
        }
        let num_restarts = decode_fixed32(&data, data.len() - 4) as usize;
        let max_restarts = (data.len() - 4) / 4;
        if num_restarts > max_restarts {
            return Err(Error::corruption(format!(
                "block restart count {num_restarts} does not fit in {} bytes",
                data.len()
            )));
        }
        let restart_offset = data.len() - (1 + num_restarts) * 4;
        Ok(Self {
            data,
            restart_offset,
            num_restarts,
        })
    }

    /// Total encoded size, restart array included.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIterator {
        BlockIterator::new(self.clone(), comparator)
    }

    fn restart_point(&self, index: usize) -> usize {
        decode_fixed32(&self.data, self.restart_offset + index * 4) as usize
    }
}

/// Cursor over the entries of one [`Block`].
pub struct BlockIterator {
    block: Block,
    comparator: Arc<dyn Comparator>,
    /// Offset of the current entry; `restart_offset` when invalid.
    current: usize,
    /// Offset where the entry after `current` starts.
    next_offset: usize,
    restart_index: usize,
    key: Vec<u8>,
    value: Range<usize>,
}

impl BlockIterator {
    pub fn new(block: Block, comparator: Arc<dyn Comparator>) -> Self {
        let end = block.restart_offset;
        Self {
            block,
            comparator,
            current: end,
            next_offset: end,
            restart_index: 0,
            key: Vec::new(),
            value: end..end,
        }
    }

    /// Current value as a zero-copy slice of the block.
    pub fn value_bytes(&self) -> Bytes {
        self.block.data.slice(self.value.clone())
    }

    fn invalidate(&mut self) {
        self.current = self.block.restart_offset;
        self.next_offset = self.block.restart_offset;
        self.restart_index = self.block.num_restarts;
        self.key.clear();
        self.value = self.current..self.current;
    }

    /// Runs `op`; a failure leaves the iterator invalid.
    fn or_invalidate<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = op(self);
        if result.is_err() {
            self.invalidate();
        }
        result
    }

    fn seek_to_restart_point(&mut self, index: usize) -> Result<()> {
        let offset = self.block.restart_point(index);
        if offset > self.block.restart_offset {
            return Err(Error::corruption("restart point past end of block"));
        }
        self.key.clear();
        self.restart_index = index;
        self.next_offset = offset;
        Ok(())
    }

    /// Decodes the entry at `next_offset`. Returns false at the end of the block.
    fn parse_next_entry(&mut self) -> Result<bool> {
        self.current = self.next_offset;
        let limit = self.block.restart_offset;
        if self.current >= limit {
            self.invalidate();
            return Ok(false);
        }

        let mut input = &self.block.data[self.current..limit];
        let before = input.len();
        let shared = input.get_varint32()? as usize;
        let non_shared = input.get_varint32()? as usize;
        let value_len = input.get_varint32()? as usize;
        let header_len = before - input.len();
        if self.key.len() < shared || input.len() < non_shared + value_len {
            return Err(Error::corruption("bad entry in block"));
        }

        self.key.truncate(shared);
        self.key.extend_from_slice(&input[..non_shared]);
        let value_start = self.current + header_len + non_shared;
        self.value = value_start..value_start + value_len;
        self.next_offset = value_start + value_len;

        while self.restart_index + 1 < self.block.num_restarts
            && self.block.restart_point(self.restart_index + 1) <= self.current
        {
            self.restart_index += 1;
        }
        Ok(true)
    }

    /// Full key stored at a restart point (restart entries share nothing).
    fn restart_key(&self, index: usize) -> Result<&[u8]> {
        let offset = self.block.restart_point(index);
        let limit = self.block.restart_offset;
        if offset >= limit {
            return Err(Error::corruption("restart point past end of block"));
        }
        let mut input = &self.block.data[offset..limit];
        let shared = input.get_varint32()?;
        let non_shared = input.get_varint32()? as usize;
        let _value_len = input.get_varint32()?;
        if shared != 0 || input.len() < non_shared {
            return Err(Error::corruption("bad restart entry in block"));
        }
        Ok(&input[..non_shared])
    }

    fn seek_entry(&mut self, target: &[u8]) -> Result<()> {
        if self.block.num_restarts == 0 {
            self.invalidate();
            return Ok(());
        }

        // Last restart point whose key is < target.
        let mut left = 0;
        let mut right = self.block.num_restarts - 1;
        while left < right {
            let mid = (left + right + 1) / 2;
            if self.comparator.compare(self.restart_key(mid)?, target) == Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart_point(left)?;
        while self.parse_next_entry()? {
            if self.comparator.compare(&self.key, target) != Ordering::Less {
                return Ok(());
            }
        }
        Ok(())
    }

    fn seek_first_entry(&mut self) -> Result<()> {
        if self.block.num_restarts == 0 {
            self.invalidate();
            return Ok(());
        }
        self.seek_to_restart_point(0)?;
        self.parse_next_entry()?;
        Ok(())
    }
}

impl StorageIterator for BlockIterator {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.block.data[self.value.clone()]
    }

    fn is_valid(&self) -> bool {
        self.current < self.block.restart_offset
    }

    fn next(&mut self) -> Result<()> {
        if self.is_valid() {
            self.or_invalidate(|iter| iter.parse_next_entry())?;
        }
        Ok(())
    }

    fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.or_invalidate(|iter| iter.seek_entry(target))
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.or_invalidate(|iter| iter.seek_first_entry())
    }
}
