//! KVST - AOL Writer (C2)
//! Durably records every applied mutation before the server acknowledges
//! the client. The writer owns the open file handle and is the sole
//! mutator of the log file; callers serialize access through a shared
//! mutex (see [`crate::server::Server`]).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};
use crate::types::{self, Key, Value};

use super::{RecordKind, RECORD_MAGIC};

/// Fixed header size of one AOL record, not counting key/value bytes.
const RECORD_HEADER_SIZE: usize = 20;

/// Append-only durability log writer.
///
/// ## Binary format (per record, big-endian)
/// ```text
/// [magic: 4][command: 1][flags: 1][timestamp: 8][key_len: 2][value_len: 4][key][value]
/// ```
pub struct AolWriter {
    path: PathBuf,
    file: File,
    /// Whether every append calls `sync_data` (durability beyond the OS
    /// page cache). When false, `write_all` alone is considered sufficient
    /// per record; `flush()` still forces a sync on demand.
    sync_writes: bool,
}

impl AolWriter {
    /// Open or create the AOL file at `path` for appending.
    pub fn open(path: impl Into<PathBuf>, sync_writes: bool) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            sync_writes,
        })
    }

    /// Path to the underlying AOL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(kind: RecordKind, key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + key.len() + value.len());
        buf.extend_from_slice(&RECORD_MAGIC.to_be_bytes());
        buf.push(kind as u8);
        buf.push(0); // reserved flags
        buf.extend_from_slice(&types::now_nanos().to_be_bytes());
        buf.extend_from_slice(&(key.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
        buf.extend_from_slice(key);
        buf.extend_from_slice(value);
        buf
    }

    fn append(&mut self, kind: RecordKind, key: &[u8], value: &[u8]) -> Result<()> {
        let record = Self::encode(kind, key, value);
        self.file.write_all(&record)?;
        // `File` has no userspace buffer, so this is the OS-page-cache-only
        // durability level by default; `flush()` is a no-op here but keeps
        // the write path honest about what "flush before ack" means (§4.2).
        self.file.flush()?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Durably record a SET(key, value) mutation.
    pub fn log_set(&mut self, key: &Key, value: &Value) -> Result<()> {
        self.append(RecordKind::Set, key, value)
    }

    /// Durably record a DELETE(key) mutation.
    pub fn log_delete(&mut self, key: &Key) -> Result<()> {
        self.append(RecordKind::Delete, key, &[])
    }

    /// Force buffered bytes to the file and sync them to disk, regardless
    /// of the configured durability level. Called once, last, during
    /// server shutdown.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(KvError::from)?;
        self.file.sync_data().map_err(KvError::from)
    }
}
