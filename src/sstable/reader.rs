use std::fs::File;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::block::Block;
use super::footer::{BlockHandle, Footer};
use super::iterator::TableIterator;
use super::{CompressionType, BLOCK_TRAILER_SIZE};
use crate::coding::{decode_fixed32, masked_crc32c};
use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;

/// How one block's contents are decompressed.
///
/// Picked per block from the compression tag in that block's trailer, so a
/// compressed table may freely mix compressed and raw blocks. Unknown tags
/// are reported as corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDecoder {
    Uncompressed,
    Snappy,
    Zstd,
}

impl BlockDecoder {
    /// Decoder for a block whose trailer carries `compression_tag`.
    pub fn for_tag(compression_tag: u8) -> Result<Self> {
        Ok(Self::for_compression(CompressionType::from_u8(compression_tag)?))
    }

    pub fn for_compression(compression: CompressionType) -> Self {
        match compression {
            CompressionType::None => BlockDecoder::Uncompressed,
            CompressionType::Snappy => BlockDecoder::Snappy,
            CompressionType::Zstd => BlockDecoder::Zstd,
        }
    }

    pub fn compression(&self) -> CompressionType {
        match self {
            BlockDecoder::Uncompressed => CompressionType::None,
            BlockDecoder::Snappy => CompressionType::Snappy,
            BlockDecoder::Zstd => CompressionType::Zstd,
        }
    }

    /// Turns raw block bytes into block contents.
    pub fn decode(&self, raw: Bytes) -> Result<Bytes> {
        match self {
            BlockDecoder::Uncompressed => Ok(raw),
            BlockDecoder::Snappy => snap::raw::Decoder::new()
                .decompress_vec(&raw)
                .map(Bytes::from)
                .map_err(|e| Error::corruption(format!("corrupted snappy block: {e}"))),
            BlockDecoder::Zstd => zstd::stream::decode_all(&raw[..])
                .map(Bytes::from)
                .map_err(|e| Error::corruption(format!("corrupted zstd block: {e}"))),
        }
    }
}

/// Read-only handle to one open table file.
///
/// Opening reads the footer and the index block; data blocks are read with
/// positional IO on demand, so a `Table` can be shared across threads behind
/// an `Arc` without locking.
pub struct Table {
    name: String,
    file: File,
    file_size: u64,
    comparator: Arc<dyn Comparator>,
    verify_checksums: bool,
    compression: CompressionType,
    index_block: Block,
    footer: Footer,
}

impl Table {
    /// Opens a table over `file`. Keys are ordered by `comparator`.
    ///
    /// The index block checksum is always verified. Data block checksums are
    /// verified only when `verify_checksums` is set.
    pub fn open(
        name: impl Into<String>,
        file: File,
        comparator: Arc<dyn Comparator>,
        verify_checksums: bool,
    ) -> Result<Self> {
        let name = name.into();
        let file_size = file.metadata()?.len();
        if file_size < Footer::ENCODED_LENGTH as u64 {
            return Err(Error::corruption(format!(
                "file is corrupt: {name} is {file_size} bytes, a table needs at least {}",
                Footer::ENCODED_LENGTH
            )));
        }

        let mut footer_buf = [0u8; Footer::ENCODED_LENGTH];
        read_exact_at(&file, &mut footer_buf, file_size - Footer::ENCODED_LENGTH as u64)?;
        let footer = Footer::decode(&footer_buf)?;

        let (raw, tag) = read_raw_block(&file, file_size, footer.index_handle, true)?;
        let index_block = Block::new(BlockDecoder::for_tag(tag)?.decode(raw)?)?;
        let data_tag = first_data_block_tag(&file, file_size, &index_block, &comparator)?;
        let compression = CompressionType::from_u8(data_tag.unwrap_or(tag))?;

        debug!(
            table = %name,
            file_size,
            ?compression,
            index_size = index_block.size(),
            "opened table"
        );

        Ok(Self {
            name,
            file,
            file_size,
            comparator,
            verify_checksums,
            compression,
            index_block,
            footer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn comparator(&self) -> &Arc<dyn Comparator> {
        &self.comparator
    }

    /// Codec of the first data block; the index block's codec for a table
    /// without data blocks.
    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn index_handle(&self) -> BlockHandle {
        self.footer.index_handle
    }

    pub fn metaindex_handle(&self) -> BlockHandle {
        self.footer.metaindex_handle
    }

    pub(crate) fn index_block(&self) -> &Block {
        &self.index_block
    }

    /// Reads, verifies and decompresses the block at `handle`.
    pub fn read_block(&self, handle: BlockHandle) -> Result<Block> {
        let (raw, tag) = read_raw_block(&self.file, self.file_size, handle, self.verify_checksums)?;
        Block::new(BlockDecoder::for_tag(tag)?.decode(raw)?)
    }

    /// Opens the data block an index entry value points at.
    pub fn open_data_block(&self, index_value: &[u8]) -> Result<Block> {
        self.read_block(BlockHandle::decode(index_value)?)
    }

    /// Two-level iterator over every entry of the table.
    pub fn iter(self: &Arc<Self>) -> TableIterator {
        TableIterator::new(Arc::clone(self))
    }

    /// First entry with key >= `key`, if any.
    pub fn get(self: &Arc<Self>, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let mut iter = self.iter();
        iter.seek(key)?;
        if iter.is_valid() {
            Ok(Some((iter.key().to_vec(), iter.value().to_vec())))
        } else {
            Ok(None)
        }
    }

    /// Approximate file offset where data for `key` begins.
    ///
    /// Keys past the last entry map to the meta-index offset, which sits near
    /// the end of the file. An index entry that cannot be decoded does too.
    pub fn approximate_offset_of(&self, key: &[u8]) -> u64 {
        let fallback = self.footer.metaindex_handle.offset;
        let mut index_iter = self.index_block.iter(Arc::clone(&self.comparator));
        if index_iter.seek(key).is_err() || !index_iter.is_valid() {
            return fallback;
        }
        match BlockHandle::decode(index_iter.value()) {
            Ok(handle) => handle.offset,
            Err(_) => fallback,
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("file_size", &self.file_size)
            .field("compression", &self.compression)
            .field("footer", &self.footer)
            .finish()
    }
}

/// Compression tag in the trailer of the first data block, if there is one.
fn first_data_block_tag(
    file: &File,
    file_size: u64,
    index_block: &Block,
    comparator: &Arc<dyn Comparator>,
) -> Result<Option<u8>> {
    let mut index_iter = index_block.iter(Arc::clone(comparator));
    index_iter.seek_to_first()?;
    if !index_iter.is_valid() {
        return Ok(None);
    }
    let handle = BlockHandle::decode(index_iter.value())?;
    let tag_offset = handle.offset.checked_add(handle.size).filter(|&at| at < file_size);
    let Some(tag_offset) = tag_offset else {
        return Err(Error::corruption(format!(
            "block handle {handle:?} points past end of file ({file_size} bytes)"
        )));
    };
    let mut tag = [0u8; 1];
    read_exact_at(file, &mut tag, tag_offset)?;
    Ok(Some(tag[0]))
}

/// Reads block contents plus trailer; returns the still-compressed contents
/// and their compression tag.
fn read_raw_block(
    file: &File,
    file_size: u64,
    handle: BlockHandle,
    verify_checksum: bool,
) -> Result<(Bytes, u8)> {
    let end = handle
        .offset
        .checked_add(handle.size)
        .and_then(|end| end.checked_add(BLOCK_TRAILER_SIZE as u64));
    match end {
        Some(end) if end <= file_size => {}
        _ => {
            return Err(Error::corruption(format!(
                "block handle {handle:?} points past end of file ({file_size} bytes)"
            )));
        }
    }

    let size = handle.size as usize;
    let mut buf = vec![0u8; size + BLOCK_TRAILER_SIZE];
    read_exact_at(file, &mut buf, handle.offset)?;

    let tag = buf[size];
    if verify_checksum {
        let expected = decode_fixed32(&buf, size + 1);
        let actual = masked_crc32c(&buf[..size], &[tag]);
        if expected != actual {
            return Err(Error::corruption(format!(
                "block checksum mismatch at offset {}",
                handle.offset
            )));
        }
    }

    buf.truncate(size);
    Ok((Bytes::from(buf), tag))
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ));
            }
            Ok(n) => {
                let rest = buf;
                buf = &mut rest[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
