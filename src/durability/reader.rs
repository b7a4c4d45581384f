//! KVST - AOL Reader (C3)
//! Rebuilds the map from a log at startup by replaying records strictly
//! in file order. A missing file is a no-op success; a truncated or
//! corrupted log is surfaced, never silently healed.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{KvError, Result};
use crate::store::ShardedMap;

use super::{RecordKind, RECORD_MAGIC};

const RECORD_HEADER_SIZE: usize = 20;

/// Replay the AOL at `path` into `map`, applying each record in file order.
///
/// - If `path` does not exist, this is a successful no-op.
/// - EOF exactly at a record boundary is success.
/// - EOF in the middle of a record, or a bad magic, is `RecoveryFailed` —
///   the server must refuse to start rather than guess at partial state.
/// - DELETE of a key that was never SET (or was already deleted) is a
///   no-op during replay, not an error: it keeps replay total even though
///   this design never rewrites the log in a way that would produce such
///   a record on its own.
pub fn recover(path: &Path, map: &ShardedMap) -> Result<()> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(KvError::from(err)),
    };

    loop {
        let mut header_buf = [0u8; RECORD_HEADER_SIZE];
        match read_fully_or_eof(&mut file, &mut header_buf)? {
            ReadOutcome::Eof => break,
            ReadOutcome::Partial(n) => {
                return Err(KvError::RecoveryFailed(format!(
                    "truncated record header: got {n} of {RECORD_HEADER_SIZE} bytes"
                )));
            }
            ReadOutcome::Complete => {}
        }

        let magic = u32::from_be_bytes(header_buf[0..4].try_into().unwrap());
        if magic != RECORD_MAGIC {
            return Err(KvError::RecoveryFailed(format!("bad record magic: {magic:#x}")));
        }

        let kind_byte = header_buf[4];
        let kind = match kind_byte {
            0x01 => RecordKind::Set,
            0x02 => RecordKind::Delete,
            other => {
                return Err(KvError::RecoveryFailed(format!(
                    "unknown record command byte: {other:#x}"
                )));
            }
        };

        // header_buf[5] is the reserved flags byte.
        // header_buf[6..14] is the informational timestamp, unused in replay.
        let key_len = u16::from_be_bytes(header_buf[14..16].try_into().unwrap()) as usize;
        let value_len = u32::from_be_bytes(header_buf[16..20].try_into().unwrap()) as usize;

        let mut key = vec![0u8; key_len];
        read_exact_or_malformed(&mut file, &mut key, "key")?;

        let mut value = vec![0u8; value_len];
        read_exact_or_malformed(&mut file, &mut value, "value")?;

        match kind {
            RecordKind::Set => map.set(key, value),
            RecordKind::Delete => {
                map.remove(&key);
            }
        }
    }

    Ok(())
}

enum ReadOutcome {
    /// Nothing at all was read; the file ended cleanly at a record boundary.
    Eof,
    /// Some bytes were read but fewer than the buffer requires.
    Partial(usize),
    /// The buffer was filled completely.
    Complete,
}

fn read_fully_or_eof(file: &mut File, buf: &mut [u8]) -> Result<ReadOutcome> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            return Ok(if total == 0 {
                ReadOutcome::Eof
            } else {
                ReadOutcome::Partial(total)
            });
        }
        total += n;
    }
    Ok(ReadOutcome::Complete)
}

fn read_exact_or_malformed(file: &mut File, buf: &mut [u8], field: &str) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    match read_fully_or_eof(file, buf)? {
        ReadOutcome::Complete => Ok(()),
        ReadOutcome::Eof => Err(KvError::RecoveryFailed(format!(
            "truncated record: missing {field} bytes"
        ))),
        ReadOutcome::Partial(n) => Err(KvError::RecoveryFailed(format!(
            "truncated record: got {n} of {} {field} bytes",
            buf.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durability::AolWriter;

    #[test]
    fn test_missing_file_is_ok_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.aol");
        let map = ShardedMap::default();
        recover(&path, &map).unwrap();
        assert_eq!(map.total_size(), 0);
    }

    #[test]
    fn test_recover_applies_set_and_delete_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.aol");
        {
            let mut writer = AolWriter::open(&path, false).unwrap();
            writer.log_set(&b"a".to_vec(), &b"1".to_vec()).unwrap();
            writer.log_set(&b"b".to_vec(), &b"2".to_vec()).unwrap();
            writer.log_delete(&b"a".to_vec()).unwrap();
        }
        let map = ShardedMap::default();
        recover(&path, &map).unwrap();
        assert_eq!(map.get(b"a"), None);
        assert_eq!(map.get(b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn test_recover_delete_of_absent_key_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.aol");
        {
            let mut writer = AolWriter::open(&path, false).unwrap();
            writer.log_delete(&b"ghost".to_vec()).unwrap();
        }
        let map = ShardedMap::default();
        recover(&path, &map).unwrap();
        assert_eq!(map.total_size(), 0);
    }

    #[test]
    fn test_recover_rejects_truncated_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.aol");
        {
            let mut writer = AolWriter::open(&path, false).unwrap();
            writer.log_set(&b"a".to_vec(), &b"1".to_vec()).unwrap();
        }
        // Truncate the file mid-record.
        let full_len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full_len - 1).unwrap();

        let map = ShardedMap::default();
        assert!(recover(&path, &map).is_err());
    }

    #[test]
    fn test_recover_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.aol");
        std::fs::write(&path, [0u8; RECORD_HEADER_SIZE]).unwrap();
        let map = ShardedMap::default();
        assert!(recover(&path, &map).is_err());
    }

    #[test]
    fn test_recover_overwrite_keeps_last_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.aol");
        {
            let mut writer = AolWriter::open(&path, false).unwrap();
            writer.log_set(&b"k".to_vec(), &b"old".to_vec()).unwrap();
            writer.log_set(&b"k".to_vec(), &b"new".to_vec()).unwrap();
        }
        let map = ShardedMap::default();
        recover(&path, &map).unwrap();
        assert_eq!(map.get(b"k"), Some(b"new".to_vec()));
    }
}
