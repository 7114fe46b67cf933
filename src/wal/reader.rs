use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use super::{RecordType, BLOCK_SIZE, HEADER_SIZE};
use crate::coding::{decode_fixed32, masked_crc32c};
use crate::error::{Error, Result};

/// Reassembles records from a log written by [`RecordWriter`](super::RecordWriter).
///
/// Reads one block at a time. Every chunk's checksum is verified; a mismatch,
/// an unknown chunk type or a broken FIRST/MIDDLE/LAST sequence is reported as
/// corruption. A chunk cut short by the end of the file is the tail of a write
/// that never completed and ends the log quietly, unless a one-bit repair of
/// its length field makes the checksum hold.
pub struct RecordReader<R> {
    source: R,
    block: Vec<u8>,
    pos: usize,
    eof: bool,
    failed: bool,
}

impl RecordReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            block: Vec::with_capacity(BLOCK_SIZE),
            pos: 0,
            eof: false,
            failed: false,
        }
    }

    /// Next complete record, or `None` at the end of the log.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut partial: Option<Vec<u8>> = None;
        loop {
            let Some((record_type, payload)) = self.read_chunk()? else {
                // A pending partial record here was torn by a crash.
                return Ok(None);
            };
            match record_type {
                RecordType::Full => {
                    if partial.is_some() {
                        return Err(Error::corruption("full record inside a fragmented record"));
                    }
                    return Ok(Some(payload));
                }
                RecordType::First => {
                    if partial.is_some() {
                        return Err(Error::corruption("first fragment inside a fragmented record"));
                    }
                    partial = Some(payload);
                }
                RecordType::Middle => match partial.as_mut() {
                    Some(buf) => buf.extend_from_slice(&payload),
                    None => return Err(Error::corruption("middle fragment without a first fragment")),
                },
                RecordType::Last => {
                    let mut buf = partial
                        .take()
                        .ok_or_else(|| Error::corruption("last fragment without a first fragment"))?;
                    buf.extend_from_slice(&payload);
                    return Ok(Some(buf));
                }
            }
        }
    }

    fn read_chunk(&mut self) -> Result<Option<(RecordType, Vec<u8>)>> {
        loop {
            if self.block.len() - self.pos < HEADER_SIZE {
                // Block tail padding, or a header torn by the end of the file.
                if self.eof {
                    return Ok(None);
                }
                self.fill_block()?;
                continue;
            }

            let header = &self.block[self.pos..self.pos + HEADER_SIZE];
            let expected_crc = decode_fixed32(header, 0);
            let length = u16::from_le_bytes([header[4], header[5]]) as usize;
            let type_byte = header[6];

            let end = self.pos + HEADER_SIZE + length;
            if end > self.block.len() {
                let torn = self.eof
                    && end <= BLOCK_SIZE
                    && !self.length_is_damaged(length, type_byte, expected_crc);
                if torn {
                    return Ok(None);
                }
                return Err(Error::corruption(format!(
                    "chunk of {length} bytes overruns its block"
                )));
            }

            let payload = &self.block[self.pos + HEADER_SIZE..end];
            if masked_crc32c(&[type_byte], payload) != expected_crc {
                return Err(Error::corruption("log chunk checksum mismatch"));
            }
            let record_type = RecordType::from_u8(type_byte)?;
            let payload = payload.to_vec();
            self.pos = end;
            return Ok(Some((record_type, payload)));
        }
    }

    /// Whether flipping one bit of `length` gives a chunk inside the bytes
    /// read whose checksum holds. Such a chunk was written whole and its
    /// length field was damaged afterwards; it is not a torn write.
    fn length_is_damaged(&self, length: usize, type_byte: u8, expected_crc: u32) -> bool {
        let available = &self.block[self.pos + HEADER_SIZE..];
        (0..16)
            .map(|bit| length ^ (1 << bit))
            .filter(|&candidate| candidate <= available.len())
            .any(|candidate| masked_crc32c(&[type_byte], &available[..candidate]) == expected_crc)
    }

    fn fill_block(&mut self) -> Result<()> {
        self.block.clear();
        self.block.resize(BLOCK_SIZE, 0);
        self.pos = 0;
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.source.read(&mut self.block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.block.truncate(filled);
        if filled < BLOCK_SIZE {
            self.eof = true;
        }
        Ok(())
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>>;

    /// Stops after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
