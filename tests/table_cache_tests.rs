// FileTableCache tests
// Opening table files by number, caching, size checks, and levels backed by
// real table files.

mod common;

use std::fs;
use std::sync::Arc;

use bytes::Bytes;
use tempfile::tempdir;
use test_log::test;

use common::{del, file_meta, put, write_table, Entry, TableOptions};
use lsm_store::comparator::InternalKeyComparator;
use lsm_store::config::Options;
use lsm_store::error::Error;
use lsm_store::iterator::{collect_entries, StorageIterator};
use lsm_store::level::{FileMetaData, Level, LookupResult, ReadStats};
use lsm_store::sstable::table_file_name;
use lsm_store::table_cache::{FileTableCache, TableCache};
use lsm_store::types::{LookupKey, MAX_SEQUENCE_NUMBER};

fn write_file(cache: &FileTableCache, file_number: u64, entries: &[Entry]) -> Arc<FileMetaData> {
    let layout = write_table(&cache.table_path(file_number), entries, TableOptions {
        block_size: 128,
        ..TableOptions::default()
    });
    file_meta(file_number, layout.file_size, entries)
}

fn numbered(prefix: &str, range: std::ops::Range<usize>) -> Vec<Entry> {
    range
        .map(|i| put(&format!("{prefix}{i:04}"), i as u64 + 1, &format!("value{i}")))
        .collect()
}

// =============================================================================
// Test 1: Tables are opened once and shared
// =============================================================================
#[test]
fn caches_open_tables() {
    let dir = tempdir().unwrap();
    let cache = FileTableCache::new(dir.path(), Options::default());
    let meta = write_file(&cache, 7, &numbered("k", 0..50));
    assert!(cache.table_path(7).ends_with("000007.ldb"));
    assert!(cache.is_empty());

    let first = cache.find_table(&meta).unwrap();
    let second = cache.find_table(&meta).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);

    cache.evict(7);
    assert!(cache.is_empty());
    let third = cache.find_table(&meta).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

// =============================================================================
// Test 2: Iterators cover the whole file
// =============================================================================
#[test]
fn new_iterator_reads_file() {
    let dir = tempdir().unwrap();
    let cache = FileTableCache::new(dir.path(), Options::default());
    let entries = numbered("k", 0..200);
    let meta = write_file(&cache, 1, &entries);

    let mut iter = cache.new_iterator(&meta).unwrap();
    iter.seek_to_first().unwrap();
    assert_eq!(collect_entries(&mut iter).unwrap(), entries);

    let (key, value) = cache.get(&meta, &entries[120].0).unwrap().unwrap();
    assert_eq!(key, entries[120].0);
    assert_eq!(value, entries[120].1);
}

// =============================================================================
// Test 3: Size mismatch and missing files
// =============================================================================
#[test]
fn size_mismatch_is_corruption() {
    let dir = tempdir().unwrap();
    let cache = FileTableCache::new(dir.path(), Options::default());
    let entries = numbered("k", 0..10);
    let meta = write_file(&cache, 3, &entries);
    let wrong = file_meta(3, meta.file_size() + 1, &entries);

    let err = cache.find_table(&wrong).unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
    assert!(cache.is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let cache = FileTableCache::new(dir.path(), Options::default());
    let meta = file_meta(99, 1000, &numbered("k", 0..2));

    let err = cache.new_iterator(&meta).err().unwrap();
    assert!(matches!(err, Error::Io(_)), "got {err:?}");
}

// =============================================================================
// Test 4: Options pick the extension and checksum policy
// =============================================================================
#[test]
fn options_are_honored() {
    let dir = tempdir().unwrap();
    let options = Options::builder()
        .table_file_extension("sst")
        .verify_checksums(true)
        .build();
    let cache = FileTableCache::new(dir.path(), options);
    let entries = numbered("k", 0..100);
    let meta = write_file(&cache, 5, &entries);
    assert!(dir.path().join(table_file_name(5, "sst")).exists());

    // Corrupt the first data block; the index block stays intact.
    let path = cache.table_path(5);
    let mut image = fs::read(&path).unwrap();
    image[4] ^= 0x10;
    fs::write(&path, image).unwrap();

    let mut iter = cache.new_iterator(&meta).unwrap();
    assert!(iter.seek_to_first().unwrap_err().is_corruption());
}

// =============================================================================
// Test 5: Levels backed by real table files
// =============================================================================
#[test]
fn level_over_table_files() {
    let dir = tempdir().unwrap();
    let cache = Arc::new(FileTableCache::new(dir.path(), Options::default()));

    let mut first = numbered("a", 0..100);
    first.push(del("b0000", 500));
    let files = vec![
        write_file(&cache, 10, &first),
        write_file(&cache, 11, &numbered("c", 0..100)),
        write_file(&cache, 12, &numbered("e", 0..100)),
    ];
    let level = Level::new(1, files, cache.clone(), InternalKeyComparator::default()).unwrap();

    let mut stats = ReadStats::default();
    let lookup = |user_key: &str, stats: &mut ReadStats| {
        level
            .get(&LookupKey::new(user_key.as_bytes().to_vec(), MAX_SEQUENCE_NUMBER), stats)
            .unwrap()
    };

    match lookup("c0042", &mut stats) {
        Some(LookupResult::Found { value, .. }) => assert_eq!(value, Bytes::from_static(b"value42")),
        other => panic!("expected c0042, got {other:?}"),
    }
    assert!(lookup("b0000", &mut stats).unwrap().is_deleted());
    assert!(lookup("d0000", &mut stats).is_none());
    assert!(lookup("f0000", &mut stats).is_none());
    // The gap lookups never touched the third file.
    assert_eq!(cache.len(), 2);

    let mut iter = level.iter();
    iter.seek_to_first().unwrap();
    assert_eq!(collect_entries(&mut iter).unwrap().len(), 301);
    assert_eq!(cache.len(), 3);
}

// =============================================================================
// Test 6: The cache keeps at most max_open_files tables
// =============================================================================
#[test]
fn open_tables_are_bounded() {
    let dir = tempdir().unwrap();
    let options = Options::builder().max_open_files(8).build();
    let cache = FileTableCache::new(dir.path(), options);

    let mut files = Vec::new();
    for file_number in 1..=40 {
        let entries = numbered(&format!("f{file_number:02}_"), 0..5);
        files.push((write_file(&cache, file_number, &entries), entries));
    }

    for (meta, entries) in &files {
        let mut iter = cache.new_iterator(meta).unwrap();
        iter.seek_to_first().unwrap();
        assert_eq!(&collect_entries(&mut iter).unwrap(), entries);
        assert!(cache.len() <= 8, "{} tables cached", cache.len());
    }
    assert!(!cache.is_empty());

    // Tables dropped from the cache reopen on demand.
    let (meta, entries) = &files[0];
    let (key, value) = cache.get(meta, &entries[3].0).unwrap().unwrap();
    assert_eq!((key, value), entries[3].clone());
}
