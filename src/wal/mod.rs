//! Write-ahead log framing.
//!
//! The log is a sequence of fixed 32 KiB blocks. A record is cut into
//! fragments ("chunks") so that no chunk straddles a block boundary:
//!
//! ```text
//! ┌──────────────────────────── block (32 KiB) ────────────────────────────┐
//! │ chunk │ chunk │ ... │ chunk │ zero padding (< 7 bytes, only if needed) │
//! └────────────────────────────────────────────────────────────────────────┘
//!
//! chunk:
//! ┌──────────────────┬────────────────┬──────────┬─────────────┐
//! │ masked crc32c 4B │ length 2B (LE) │ type 1B  │ payload     │
//! └──────────────────┴────────────────┴──────────┴─────────────┘
//! ```
//!
//! The checksum covers the type byte followed by the payload. A record that
//! fits in the current block is written as a single FULL chunk; otherwise it
//! becomes FIRST, MIDDLE*, LAST.

pub mod reader;
pub mod writer;

pub use reader::RecordReader;
pub use writer::RecordWriter;

use crate::error::{Error, Result};

/// Size of one log block.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Chunk header: checksum (4) + length (2) + type (1).
pub const HEADER_SIZE: usize = 4 + 2 + 1;

/// Fragment type tag stored in each chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// The whole record.
    Full = 1,
    /// First fragment of a record.
    First = 2,
    /// Interior fragment.
    Middle = 3,
    /// Last fragment of a record.
    Last = 4,
}

impl RecordType {
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(RecordType::Full),
            2 => Ok(RecordType::First),
            3 => Ok(RecordType::Middle),
            4 => Ok(RecordType::Last),
            _ => Err(Error::corruption(format!("invalid record type: {byte}"))),
        }
    }

    /// Classifies a fragment by its position within the record.
    pub fn for_fragment(first: bool, last: bool) -> Self {
        match (first, last) {
            (true, true) => RecordType::Full,
            (true, false) => RecordType::First,
            (false, true) => RecordType::Last,
            (false, false) => RecordType::Middle,
        }
    }
}

/// Conventional log file name for a file number.
pub fn log_file_name(file_number: u64) -> String {
    format!("{file_number:06}.log")
}
