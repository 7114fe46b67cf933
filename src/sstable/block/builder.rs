use bytes::BufMut;

use crate::coding::BufMutExt;

/// Number of entries between restart points.
pub const DEFAULT_RESTART_INTERVAL: usize = 16;

/// Accumulates sorted key-value pairs and serializes them into a block
/// readable by [`Block`](super::Block).
///
/// Each key is stored as the suffix it does not share with the previous key.
/// Every `restart_interval` entries the full key is written instead and the
/// entry's offset is recorded as a restart point.
///
/// Entries MUST be added in sorted key order.
pub struct BlockBuilder {
    data: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    last_key: Vec<u8>,
    block_size: usize,
    restart_interval: usize,
}

impl BlockBuilder {
    /// Create a new block builder with target block size.
    pub fn new(block_size: usize) -> Self {
        Self::with_restart_interval(block_size, DEFAULT_RESTART_INTERVAL)
    }

    pub fn with_restart_interval(block_size: usize, restart_interval: usize) -> Self {
        assert!(restart_interval >= 1, "restart interval must be at least 1");
        BlockBuilder {
            data: Vec::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
            block_size,
            restart_interval,
        }
    }

    /// Add a key-value pair to the block.
    /// Returns false if the block is full (entry doesn't fit).
    /// First entry is always accepted even if it exceeds block_size.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> bool {
        let restart = self.counter % self.restart_interval == 0;
        let shared = if restart {
            0
        } else {
            self.last_key
                .iter()
                .zip(key)
                .take_while(|(a, b)| a == b)
                .count()
        };
        let non_shared = key.len() - shared;
        let entry_size = 15 + non_shared + value.len() + if restart { 4 } else { 0 };
        if !self.is_empty() && self.estimated_size() + entry_size > self.block_size {
            return false;
        }

        if restart && self.counter > 0 {
            self.restarts.push(self.data.len() as u32);
        }
        self.data.put_varint32(shared as u32);
        self.data.put_varint32(non_shared as u32);
        self.data.put_varint32(value.len() as u32);
        self.data.put_slice(&key[shared..]);
        self.data.put_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        self.counter += 1;
        true
    }

    /// Finalize the block: append restart array and restart count.
    pub fn build(self) -> Vec<u8> {
        let mut block = self.data;
        for restart in &self.restarts {
            block.put_u32_le(*restart);
        }
        block.put_u32_le(self.restarts.len() as u32);
        block
    }

    /// Current estimated size of the block (entries + restart array + count).
    pub fn estimated_size(&self) -> usize {
        self.data.len() + self.restarts.len() * 4 + 4
    }

    /// Whether the block is empty (no entries added).
    pub fn is_empty(&self) -> bool {
        self.counter == 0
    }

    /// Last key added, in full.
    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }
}
