pub mod level;

pub use level::LevelIterator;

use crate::error::Result;

/// The central iteration abstraction of the storage core.
///
/// Every sorted source (block, table, level) implements this trait, so a
/// lookup can position any of them with `seek` and read the entry it landed
/// on. Keys are encoded internal keys.
///
/// A fresh iterator is unpositioned: call `seek_to_first` or `seek` first.
pub trait StorageIterator {
    /// Returns the current key. Only valid when is_valid() is true.
    fn key(&self) -> &[u8];

    /// Returns the current value. Only valid when is_valid() is true.
    fn value(&self) -> &[u8];

    /// Returns true if the iterator is positioned at a valid entry.
    fn is_valid(&self) -> bool;

    /// Advances to the next entry. Returns error on IO failure or corruption.
    fn next(&mut self) -> Result<()>;

    /// Positions the iterator at the first entry with key >= target.
    fn seek(&mut self, target: &[u8]) -> Result<()>;

    /// Positions the iterator at the first entry of the source.
    fn seek_to_first(&mut self) -> Result<()>;
}

impl<I: StorageIterator + ?Sized> StorageIterator for Box<I> {
    fn key(&self) -> &[u8] {
        (**self).key()
    }

    fn value(&self) -> &[u8] {
        (**self).value()
    }

    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn next(&mut self) -> Result<()> {
        (**self).next()
    }

    fn seek(&mut self, target: &[u8]) -> Result<()> {
        (**self).seek(target)
    }

    fn seek_to_first(&mut self) -> Result<()> {
        (**self).seek_to_first()
    }
}

/// Drains an iterator from its current position into owned pairs.
pub fn collect_entries<I: StorageIterator + ?Sized>(iter: &mut I) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut entries = Vec::new();
    while iter.is_valid() {
        entries.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next()?;
    }
    Ok(entries)
}
