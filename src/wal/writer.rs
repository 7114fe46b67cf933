use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BufMut;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{RecordType, BLOCK_SIZE, HEADER_SIZE};
use crate::coding::masked_crc32c;
use crate::error::{Error, Result};

/// Appends framed records to a single log file.
///
/// All mutating calls are serialized by one lock, so a writer can be shared
/// behind an `Arc`. The engine still assumes one writer thread per live log.
///
/// Two layers of buffering:
///   `append(.., false)` → OS page cache (no user-space buffer)
///   `append(.., true)`  → page cache + fdatasync → physical disk
pub struct RecordWriter {
    path: PathBuf,
    file_number: u64,
    /// Checked without the lock to fail fast on a closed writer.
    closed: AtomicBool,
    inner: Mutex<WriterState>,
}

struct WriterState {
    /// `None` once closed.
    file: Option<File>,
    /// Bytes already used in the current block.
    block_offset: usize,
}

impl RecordWriter {
    /// Creates (or truncates) the log file at `path`.
    pub fn open(path: impl AsRef<Path>, file_number: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!(path = %path.display(), file_number, "opened log writer");
        Ok(Self {
            path,
            file_number,
            closed: AtomicBool::new(false),
            inner: Mutex::new(WriterState {
                file: Some(file),
                block_offset: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_number(&self) -> u64 {
        self.file_number
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Appends one record, splitting it into block-sized fragments.
    ///
    /// With `force_sync` the file data is flushed to stable storage before
    /// returning; otherwise it may sit in the OS page cache.
    pub fn append(&self, record: &[u8], force_sync: bool) -> Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let mut state = self.inner.lock();
        let mut block_offset = state.block_offset;
        let file = state.file.as_mut().ok_or_else(closed_error)?;

        let fragments = record.len() / (BLOCK_SIZE - HEADER_SIZE) + 2;
        let mut buf = Vec::with_capacity(record.len() + fragments * HEADER_SIZE);
        let mut rest = record;
        let mut first = true;
        loop {
            let mut remaining = BLOCK_SIZE - block_offset;
            if remaining < HEADER_SIZE {
                // Too small for a header: pad the tail and switch blocks.
                buf.put_bytes(0, remaining);
                block_offset = 0;
                remaining = BLOCK_SIZE;
            }

            let available = remaining - HEADER_SIZE;
            let last = rest.len() <= available;
            let (fragment, tail) = rest.split_at(if last { rest.len() } else { available });

            encode_chunk(&mut buf, RecordType::for_fragment(first, last), fragment)?;
            block_offset += HEADER_SIZE + fragment.len();

            rest = tail;
            first = false;
            if last {
                break;
            }
        }

        file.write_all(&buf)?;
        state.block_offset = block_offset;
        if force_sync {
            if let Some(file) = state.file.as_ref() {
                file.sync_data()?;
            }
        }
        Ok(())
    }

    /// Marks the writer closed and syncs the file. Never fails: a sync error
    /// is logged and dropped. Calling it again is a no-op.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        self.close_locked(&mut state);
    }

    /// Closes the writer, then removes the log file. Never fails.
    pub fn delete(&self) {
        let mut state = self.inner.lock();
        self.close_locked(&mut state);
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "deleted log file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to delete log file"),
        }
    }

    fn close_locked(&self, state: &mut WriterState) {
        self.closed.store(true, Ordering::Release);
        if let Some(file) = state.file.take() {
            if let Err(e) = file.sync_all() {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to sync log file on close"
                );
            }
            debug!(path = %self.path.display(), "closed log writer");
        }
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(file) = self.inner.get_mut().file.take() {
            if let Err(e) = file.sync_all() {
                warn!(path = %self.path.display(), error = %e, "failed to sync log file on drop");
            }
        }
    }
}

fn closed_error() -> Error {
    Error::invalid_state("log writer is closed")
}

/// Writes header + payload of one chunk into `buf`.
fn encode_chunk(buf: &mut Vec<u8>, record_type: RecordType, payload: &[u8]) -> Result<()> {
    let len = u16::try_from(payload.len()).map_err(|_| {
        Error::InvalidArgument(format!(
            "fragment length {} does not fit in two bytes",
            payload.len()
        ))
    })?;
    let type_byte = record_type as u8;
    buf.put_u32_le(masked_crc32c(&[type_byte], payload));
    buf.put_u16_le(len);
    buf.put_u8(type_byte);
    buf.put_slice(payload);
    Ok(())
}
