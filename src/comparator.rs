use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Buf;

use crate::types::{extract_user_key, InternalKey, INTERNAL_KEY_TAG_SIZE};

/// Total order over byte strings.
///
/// Tables and blocks are searched with a comparator, so the same one that
/// sorted the keys at write time must be used to read them back.
pub trait Comparator: Send + Sync {
    /// Name persisted alongside the data to catch comparator mix-ups.
    fn name(&self) -> &str;

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Lexicographic byte order.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &str {
        "leveldb.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Orders internal keys: user key ascending by the user comparator, then the
/// packed `(sequence, type)` tag descending.
///
/// Works both on [`InternalKey`] values and on their encoded form, which is
/// what blocks hold.
#[derive(Clone)]
pub struct InternalKeyComparator {
    user_comparator: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    pub fn new(user_comparator: Arc<dyn Comparator>) -> Self {
        Self { user_comparator }
    }

    pub fn user_comparator(&self) -> &Arc<dyn Comparator> {
        &self.user_comparator
    }

    pub fn compare_user_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.user_comparator.compare(a, b)
    }

    pub fn compare_keys(&self, a: &InternalKey, b: &InternalKey) -> Ordering {
        self.user_comparator
            .compare(a.user_key(), b.user_key())
            .then_with(|| b.sequence().cmp(&a.sequence()))
            .then_with(|| b.value_type().cmp(&a.value_type()))
    }
}

impl Default for InternalKeyComparator {
    fn default() -> Self {
        Self::new(Arc::new(BytewiseComparator))
    }
}

fn tag_of(encoded: &[u8]) -> u64 {
    if encoded.len() < INTERNAL_KEY_TAG_SIZE {
        return 0;
    }
    (&encoded[encoded.len() - INTERNAL_KEY_TAG_SIZE..]).get_u64_le()
}

impl Comparator for InternalKeyComparator {
    fn name(&self) -> &str {
        "leveldb.InternalKeyComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.user_comparator
            .compare(extract_user_key(a), extract_user_key(b))
            .then_with(|| tag_of(b).cmp(&tag_of(a)))
    }
}
