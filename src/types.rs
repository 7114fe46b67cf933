use std::fmt;

use bytes::{Buf, BufMut, Bytes};

use crate::error::{Error, Result};

/// Monotonically increasing write counter. Only the low 56 bits are usable:
/// the sequence shares a fixed64 with the value type on disk.
pub type SequenceNumber = u64;

/// Largest sequence number representable in an internal key.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Size of the packed `(sequence, type)` trailer of an encoded internal key.
pub const INTERNAL_KEY_TAG_SIZE: usize = 8;

/// Distinguishes values from deletion markers.
/// A Deletion is a tombstone: it masks older values of the same user key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    Deletion = 0x00,
    Value = 0x01,
}

impl ValueType {
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(ValueType::Deletion),
            0x01 => Ok(ValueType::Value),
            _ => Err(Error::corruption(format!("invalid value type: {byte}"))),
        }
    }
}

/// Packs a sequence number and value type the way they are stored on disk.
pub fn pack_sequence_and_type(sequence: SequenceNumber, value_type: ValueType) -> u64 {
    debug_assert!(sequence <= MAX_SEQUENCE_NUMBER);
    (sequence << 8) | value_type as u64
}

/// Internal key: user key + sequence number + value type.
///
/// Ordering is (user_key ASC, sequence DESC, type DESC), so the newest
/// version of a user key always sorts first. The user-key part is compared
/// with a pluggable comparator, see
/// [`InternalKeyComparator`](crate::comparator::InternalKeyComparator).
///
/// On disk:
/// ```text
/// ┌──────────────┬─────────────────────────────────────┐
/// │ user key     │ (sequence << 8 | type) fixed64 LE   │
/// └──────────────┴─────────────────────────────────────┘
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InternalKey {
    user_key: Bytes,
    sequence: SequenceNumber,
    value_type: ValueType,
}

impl InternalKey {
    pub fn new(user_key: impl Into<Bytes>, sequence: SequenceNumber, value_type: ValueType) -> Self {
        let sequence = sequence.min(MAX_SEQUENCE_NUMBER);
        Self {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }

    /// Parses an encoded internal key.
    pub fn decode(encoded: &[u8]) -> Result<Self> {
        let (user_key, sequence, value_type) = parse_internal_key(encoded)?;
        Ok(Self {
            user_key: Bytes::copy_from_slice(user_key),
            sequence,
            value_type,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf
    }

    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.user_key);
        buf.put_u64_le(pack_sequence_and_type(self.sequence, self.value_type));
    }

    pub fn encoded_len(&self) -> usize {
        self.user_key.len() + INTERNAL_KEY_TAG_SIZE
    }

    pub fn user_key(&self) -> &[u8] {
        &self.user_key
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

impl fmt::Debug for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' @ {} : {:?}",
            String::from_utf8_lossy(&self.user_key),
            self.sequence,
            self.value_type
        )
    }
}

/// Splits an encoded internal key into its parts without copying.
pub fn parse_internal_key(encoded: &[u8]) -> Result<(&[u8], SequenceNumber, ValueType)> {
    if encoded.len() < INTERNAL_KEY_TAG_SIZE {
        return Err(Error::corruption(format!(
            "internal key too short: {} bytes",
            encoded.len()
        )));
    }
    let split = encoded.len() - INTERNAL_KEY_TAG_SIZE;
    let tag = (&encoded[split..]).get_u64_le();
    let value_type = ValueType::from_u8((tag & 0xff) as u8)?;
    Ok((&encoded[..split], tag >> 8, value_type))
}

/// User-key part of an encoded internal key.
pub fn extract_user_key(encoded: &[u8]) -> &[u8] {
    debug_assert!(encoded.len() >= INTERNAL_KEY_TAG_SIZE);
    &encoded[..encoded.len().saturating_sub(INTERNAL_KEY_TAG_SIZE)]
}

/// A point-read query: find the newest entry for `user_key` whose sequence is
/// at most `sequence` (the snapshot).
#[derive(Clone, PartialEq, Eq)]
pub struct LookupKey {
    internal_key: InternalKey,
    encoded: Vec<u8>,
}

impl LookupKey {
    pub fn new(user_key: impl Into<Bytes>, sequence: SequenceNumber) -> Self {
        // Value sorts before Deletion at the same sequence, so seeking with it
        // lands on the first entry at or below the snapshot.
        let internal_key = InternalKey::new(user_key, sequence, ValueType::Value);
        let encoded = internal_key.encode();
        Self {
            internal_key,
            encoded,
        }
    }

    pub fn user_key(&self) -> &[u8] {
        self.internal_key.user_key()
    }

    pub fn internal_key(&self) -> &InternalKey {
        &self.internal_key
    }

    /// Encoded internal key used as the seek target.
    pub fn encoded_internal_key(&self) -> &[u8] {
        &self.encoded
    }
}

impl fmt::Debug for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LookupKey").field(&self.internal_key).finish()
    }
}
