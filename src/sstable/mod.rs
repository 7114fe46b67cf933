//! Immutable sorted tables.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ data block 0 + trailer       │
//! │ ...                          │
//! │ data block N-1 + trailer     │
//! │ meta-index block + trailer   │
//! │ index block + trailer        │  one entry per data block:
//! │                              │  separator key ≥ block's last key → handle
//! │ footer (48 bytes)            │
//! └──────────────────────────────┘
//!
//! trailer: compression type (1B) ++ masked crc32c of (contents ++ type) (4B)
//! ```
//!
//! Only the read side lives here. Data blocks are fetched on demand; the
//! footer and index block are parsed once when the table is opened.

pub mod block;
pub mod footer;
pub mod iterator;
pub mod reader;

pub use block::builder::BlockBuilder;
pub use block::{Block, BlockIterator};
pub use footer::{BlockHandle, Footer, TABLE_MAGIC};
pub use iterator::TableIterator;
pub use reader::{BlockDecoder, Table};

use crate::error::{Error, Result};

/// Size of the trailer that follows every block: type (1) + crc (4).
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Compression applied to a block's contents, recorded in its trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0x00,
    Snappy = 0x01,
    Zstd = 0x02,
}

impl CompressionType {
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(CompressionType::None),
            0x01 => Ok(CompressionType::Snappy),
            0x02 => Ok(CompressionType::Zstd),
            _ => Err(Error::corruption(format!(
                "unsupported block compression type: {byte}"
            ))),
        }
    }
}

/// Conventional table file name for a file number.
pub fn table_file_name(file_number: u64, extension: &str) -> String {
    format!("{file_number:06}.{extension}")
}
