//! # LSM storage core
//!
//! The on-disk pieces of a log-structured merge-tree key-value store:
//!
//! - [`wal`]: write-ahead log framing into 32 KiB blocks with checksummed
//!   chunks, plus a reader that reassembles records.
//! - [`sstable`]: read-only access to immutable sorted table files (footer,
//!   block index, prefix-compressed data blocks).
//! - [`level`]: the per-level file index that answers point lookups across
//!   a run of tables.
//!
//! ## Read path
//! A caller builds a [`LookupKey`], hands it to a [`Level`], which picks the
//! candidate files, asks the [`TableCache`] for an iterator, seeks it to the
//! key and inspects the entry it lands on.
//!
//! The memtable, manifest, compaction and the table writer live outside this
//! crate.

pub mod coding;
pub mod comparator;
pub mod config;
pub mod error;
pub mod iterator;
pub mod level;
pub mod sstable;
pub mod table_cache;
pub mod types;
pub mod wal;

// Public re-exports for the top-level API
pub use comparator::{BytewiseComparator, Comparator, InternalKeyComparator};
pub use config::Options;
pub use error::{Error, Result};
pub use iterator::StorageIterator;
pub use level::{FileMetaData, Level, LevelBuilder, LookupResult, ReadStats};
pub use sstable::{Table, TableIterator};
pub use table_cache::{FileTableCache, TableCache};
pub use types::{InternalKey, LookupKey, SequenceNumber, ValueType};
pub use wal::{RecordReader, RecordWriter};
