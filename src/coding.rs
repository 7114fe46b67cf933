//! Varint and fixed-width codecs plus the masked CRC32C used by both the log
//! and the table format.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

const MASK: u8 = 0x80;
const CRC_MASK_DELTA: u32 = 0xa282_ead8;

/// Longest encoding of a varint64.
pub const MAX_VARINT64_LEN: usize = 10;

pub fn varint_len(mut n: u64) -> usize {
    let mut len = 1;
    while n >= MASK as u64 {
        n >>= 7;
        len += 1;
    }
    len
}

pub trait BufMutExt: BufMut {
    fn put_varint32(&mut self, n: u32) {
        self.put_varint64(n as u64);
    }

    fn put_varint64(&mut self, mut n: u64) {
        while n >= MASK as u64 {
            self.put_u8((n as u8) | MASK);
            n >>= 7;
        }
        self.put_u8(n as u8);
    }
}

impl<T: BufMut + ?Sized> BufMutExt for T {}

/// Fallible varint decoding. Unlike `Buf::get_*`, running off the end of the
/// buffer reports corruption instead of panicking.
pub trait BufExt: Buf {
    fn get_varint64(&mut self) -> Result<u64> {
        let mut n = 0u64;
        let mut shift = 0u32;
        while shift <= 63 {
            if !self.has_remaining() {
                return Err(Error::corruption("truncated varint"));
            }
            let byte = self.get_u8();
            n |= ((byte & !MASK) as u64) << shift;
            if byte & MASK == 0 {
                return Ok(n);
            }
            shift += 7;
        }
        Err(Error::corruption("malformed varint"))
    }

    fn get_varint32(&mut self) -> Result<u32> {
        let n = self.get_varint64()?;
        u32::try_from(n).map_err(|_| Error::corruption("varint32 overflow"))
    }

    fn get_fixed32_checked(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(Error::corruption("truncated fixed32"));
        }
        Ok(self.get_u32_le())
    }

    fn get_fixed64_checked(&mut self) -> Result<u64> {
        if self.remaining() < 8 {
            return Err(Error::corruption("truncated fixed64"));
        }
        Ok(self.get_u64_le())
    }
}

impl<T: Buf + ?Sized> BufExt for T {}

/// Reads a little-endian u32 at `offset`. Caller guarantees the bounds.
pub fn decode_fixed32(buf: &[u8], offset: usize) -> u32 {
    (&buf[offset..offset + 4]).get_u32_le()
}

/// Rotates the checksum so that a CRC computed over data that itself
/// embeds CRCs does not degenerate.
pub fn mask_crc(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(CRC_MASK_DELTA)
}

pub fn unmask_crc(masked: u32) -> u32 {
    masked.wrapping_sub(CRC_MASK_DELTA).rotate_left(15)
}

/// Masked CRC32C over `first` followed by `rest`.
pub fn masked_crc32c(first: &[u8], rest: &[u8]) -> u32 {
    mask_crc(crc32c::crc32c_append(crc32c::crc32c(first), rest))
}
