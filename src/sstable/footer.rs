use bytes::BufMut;

use crate::coding::{BufExt, BufMutExt, MAX_VARINT64_LEN};
use crate::error::{Error, Result};

/// Magic number that terminates every table file.
pub const TABLE_MAGIC: u64 = 0xdb47_7524_8b80_fb57;

/// Points at a block inside a table file.
///
/// Encoded as two varints: `offset ++ size`. The size excludes the 5-byte
/// block trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    /// Longest possible encoding.
    pub const MAX_ENCODED_LENGTH: usize = 2 * MAX_VARINT64_LEN;

    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_varint64(self.offset);
        buf.put_varint64(self.size);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::MAX_ENCODED_LENGTH);
        self.encode_to(&mut buf);
        buf
    }

    /// Decodes a handle from the front of `buf`, advancing it.
    pub fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        let offset = buf
            .get_varint64()
            .map_err(|e| Error::corruption(format!("bad block handle: {e}")))?;
        let size = buf
            .get_varint64()
            .map_err(|e| Error::corruption(format!("bad block handle: {e}")))?;
        Ok(Self { offset, size })
    }

    /// Decodes a handle stored as an index entry value.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        Self::decode_from(&mut buf)
    }
}

/// The footer sits at the end of every table file.
/// It tells the reader where to find the index block and the meta-index block.
///
/// ```text
/// ┌──────────────────────────────────────────────┐
/// │ Meta-index handle (varint offset, size)      │
/// │ Index handle      (varint offset, size)      │
/// │ Zero padding up to 40 bytes                  │
/// │ Magic number (8B LE)                         │
/// └──────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    /// Size of the footer in bytes (fixed).
    pub const ENCODED_LENGTH: usize = BlockHandle::MAX_ENCODED_LENGTH * 2 + 8; // 48 bytes

    pub fn new(metaindex_handle: BlockHandle, index_handle: BlockHandle) -> Self {
        Self {
            metaindex_handle,
            index_handle,
        }
    }

    /// Encode footer to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::ENCODED_LENGTH);
        self.metaindex_handle.encode_to(&mut buf);
        self.index_handle.encode_to(&mut buf);
        buf.resize(Self::ENCODED_LENGTH - 8, 0);
        buf.put_u64_le(TABLE_MAGIC);
        buf
    }

    /// Decode footer from the last `ENCODED_LENGTH` bytes of a file.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::ENCODED_LENGTH {
            return Err(Error::corruption("footer too short"));
        }
        let data = &data[data.len() - Self::ENCODED_LENGTH..];

        let mut magic_buf = &data[Self::ENCODED_LENGTH - 8..];
        let magic = magic_buf.get_fixed64_checked()?;
        if magic != TABLE_MAGIC {
            return Err(Error::corruption(format!(
                "not an sstable (bad magic number {magic:#x})"
            )));
        }

        let mut handles = &data[..Self::ENCODED_LENGTH - 8];
        let metaindex_handle = BlockHandle::decode_from(&mut handles)?;
        let index_handle = BlockHandle::decode_from(&mut handles)?;
        Ok(Self {
            metaindex_handle,
            index_handle,
        })
    }
}
