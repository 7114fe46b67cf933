// WAL RecordReader tests
// Reassembly, torn tails and corruption detection.

use std::fs;
use std::io::Cursor;

use bytes::BufMut;
use tempfile::tempdir;

use lsm_store::coding::masked_crc32c;
use lsm_store::wal::{log_file_name, RecordReader, RecordType, RecordWriter, BLOCK_SIZE, HEADER_SIZE};

fn chunk(record_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u32_le(masked_crc32c(&[record_type], payload));
    buf.put_u16_le(payload.len() as u16);
    buf.put_u8(record_type);
    buf.put_slice(payload);
    buf
}

fn write_log(records: &[&[u8]]) -> (tempfile::TempDir, Vec<u8>) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(log_file_name(1));
    let writer = RecordWriter::open(&path, 1).unwrap();
    for record in records {
        writer.append(record, false).unwrap();
    }
    writer.close();
    let bytes = fs::read(&path).unwrap();
    (dir, bytes)
}

// =============================================================================
// Test 1: Empty log yields no records
// =============================================================================
#[test]
fn empty_log() {
    let mut reader = RecordReader::new(Cursor::new(Vec::new()));
    assert!(reader.read_record().unwrap().is_none());
}

// =============================================================================
// Test 2: Records come back in append order
// =============================================================================
#[test]
fn reads_records_in_order() {
    let big = vec![7u8; BLOCK_SIZE * 2];
    let (_dir, bytes) = write_log(&[b"alpha", &big, b"", b"omega"]);

    let mut reader = RecordReader::new(Cursor::new(bytes));
    assert_eq!(reader.read_record().unwrap().unwrap(), b"alpha");
    assert_eq!(reader.read_record().unwrap().unwrap(), big);
    assert_eq!(reader.read_record().unwrap().unwrap(), b"");
    assert_eq!(reader.read_record().unwrap().unwrap(), b"omega");
    assert!(reader.read_record().unwrap().is_none());
}

// =============================================================================
// Test 3: Flipped payload bit → Corruption
// =============================================================================
#[test]
fn flipped_bit_is_corruption() {
    let (_dir, mut bytes) = write_log(&[b"first", b"second"]);
    // Inside the payload of the second chunk.
    let offset = HEADER_SIZE + 5 + HEADER_SIZE + 2;
    bytes[offset] ^= 0x01;

    let mut reader = RecordReader::new(Cursor::new(bytes));
    assert_eq!(reader.read_record().unwrap().unwrap(), b"first");
    let err = reader.read_record().unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
}

#[test]
fn flipped_length_in_last_chunk_is_corruption() {
    let (_dir, mut bytes) = write_log(&[b"first", b"second"]);
    // High byte of the second chunk's length: the chunk now claims to run
    // past the end of the file.
    bytes[HEADER_SIZE + 5 + 5] ^= 0x01;

    let mut reader = RecordReader::new(Cursor::new(bytes));
    assert_eq!(reader.read_record().unwrap().unwrap(), b"first");
    let err = reader.read_record().unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
}

#[test]
fn every_single_bit_flip_is_corruption() {
    let records: [&[u8]; 2] = [b"first", b"second"];
    let (_dir, bytes) = write_log(&records);

    for offset in 0..bytes.len() {
        for bit in 0..8 {
            let mut damaged = bytes.clone();
            damaged[offset] ^= 1 << bit;

            let results: Vec<_> = RecordReader::new(Cursor::new(damaged)).collect();
            let (last, good) = results.split_last().unwrap();
            for (result, expected) in good.iter().zip(records) {
                assert_eq!(result.as_ref().unwrap().as_slice(), expected);
            }
            match last {
                Err(err) => assert!(err.is_corruption(), "offset {offset} bit {bit}: {err:?}"),
                Ok(record) => panic!("offset {offset} bit {bit}: read {record:?} past the damage"),
            }
        }
    }
}

// =============================================================================
// Test 4: Iterator stops after the first error
// =============================================================================
#[test]
fn iterator_stops_after_error() {
    let (_dir, mut bytes) = write_log(&[b"first", b"second", b"third"]);
    bytes[HEADER_SIZE + 1] ^= 0xff;

    let results: Vec<_> = RecordReader::new(Cursor::new(bytes)).collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].as_ref().unwrap_err().is_corruption());
}

// =============================================================================
// Test 5: Log cut in the middle of a chunk ends quietly
// =============================================================================
#[test]
fn torn_tail_ends_log() {
    let (_dir, bytes) = write_log(&[b"complete", b"this one gets cut"]);
    let cut = bytes.len() - 5;

    let mut reader = RecordReader::new(Cursor::new(bytes[..cut].to_vec()));
    assert_eq!(reader.read_record().unwrap().unwrap(), b"complete");
    assert!(reader.read_record().unwrap().is_none());
}

// =============================================================================
// Test 6: FIRST fragment without its LAST at end of file ends quietly
// =============================================================================
#[test]
fn unfinished_fragmented_record_ends_log() {
    let record = vec![1u8; BLOCK_SIZE + 10];
    let (_dir, bytes) = write_log(&[b"ok", &record]);

    // Keep only the first block: "ok" plus the FIRST fragment.
    let mut reader = RecordReader::new(Cursor::new(bytes[..BLOCK_SIZE].to_vec()));
    assert_eq!(reader.read_record().unwrap().unwrap(), b"ok");
    assert!(reader.read_record().unwrap().is_none());
}

// =============================================================================
// Test 7: Broken fragment sequences → Corruption
// =============================================================================
#[test]
fn middle_without_first_is_corruption() {
    let bytes = chunk(RecordType::Middle as u8, b"orphan");
    let err = RecordReader::new(Cursor::new(bytes)).read_record().unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn last_without_first_is_corruption() {
    let bytes = chunk(RecordType::Last as u8, b"orphan");
    let err = RecordReader::new(Cursor::new(bytes)).read_record().unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn full_inside_fragmented_record_is_corruption() {
    let mut bytes = chunk(RecordType::First as u8, b"start");
    bytes.extend(chunk(RecordType::Full as u8, b"intruder"));
    let err = RecordReader::new(Cursor::new(bytes)).read_record().unwrap_err();
    assert!(err.is_corruption());
}

// =============================================================================
// Test 8: Unknown chunk type with a valid checksum → Corruption
// =============================================================================
#[test]
fn unknown_chunk_type_is_corruption() {
    let bytes = chunk(9, b"mystery");
    let err = RecordReader::new(Cursor::new(bytes)).read_record().unwrap_err();
    assert!(err.is_corruption());
}

// =============================================================================
// Test 9: Hand-framed FIRST/MIDDLE/LAST reassemble
// =============================================================================
#[test]
fn hand_framed_fragments_reassemble() {
    let mut bytes = chunk(RecordType::First as u8, b"he");
    bytes.extend(chunk(RecordType::Middle as u8, b"ll"));
    bytes.extend(chunk(RecordType::Last as u8, b"o"));

    let mut reader = RecordReader::new(Cursor::new(bytes));
    assert_eq!(reader.read_record().unwrap().unwrap(), b"hello");
    assert!(reader.read_record().unwrap().is_none());
}
