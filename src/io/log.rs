//! Single-file, append-only ACL record log.
//!
//! Layout: an 8-byte magic followed by records. Each record is a 48-byte
//! header `[seq: u64][len: u32][header check: 4 bytes][checksum: 32 bytes]`
//! and a bincode payload holding `(column_family, key, value)`. The header
//! check covers `seq` and `len`; the checksum covers the payload. The newest
//! record for a key wins; the live set is rebuilt in memory on open.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use atomic_write_file::AtomicWriteFile;
use bincode::config;
use bincode::serde::{decode_from_slice, encode_to_vec};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::constants::ACL_LOG_MAGIC;
use crate::error::{ArborError, Result};
use crate::io::storage::{AclStorage, UpdateFn};

const ENTRY_HEADER_SIZE: usize = 48;
const HEADER_CHECKED_LEN: usize = 12;
const DATA_START: u64 = ACL_LOG_MAGIC.len() as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    pub live_keys: usize,
    pub records: u64,
    pub file_bytes: u64,
    pub sequence: u64,
}

#[derive(Serialize, Deserialize)]
struct LogEntry {
    column_family: String,
    key: String,
    value: Vec<u8>,
}

#[derive(Debug)]
struct LogState {
    file: File,
    index: BTreeMap<(String, String), Vec<u8>>,
    write_head: u64,
    sequence: u64,
    records: u64,
    /// Set when the handle may no longer be the file on disk; writes are refused.
    broken: Option<String>,
}

/// File-backed [`AclStorage`] with checksummed records and an exclusive file lock.
#[derive(Debug)]
pub struct LogStorage {
    path: PathBuf,
    state: Mutex<LogState>,
    skip_sync: bool,
}

impl LogStorage {
    /// Open or create a log, replaying every record into memory.
    ///
    /// A partially written final record is truncated away. A damaged record
    /// followed by further data is reported as corruption.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = open_locked(&path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            file.write_all(&ACL_LOG_MAGIC)?;
            file.sync_all()?;
        } else {
            let mut magic = [0u8; ACL_LOG_MAGIC.len()];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut magic).map_err(|_| ArborError::LogCorruption {
                offset: 0,
                reason: "acl log shorter than its magic".into(),
            })?;
            if magic != ACL_LOG_MAGIC {
                return Err(ArborError::LogCorruption {
                    offset: 0,
                    reason: "acl log magic mismatch".into(),
                });
            }
        }

        let scan = scan_records(&mut file)?;
        if scan.torn_tail {
            tracing::warn!(
                log.path = %path.display(),
                log.truncate_at = scan.next_head,
                "acl log has a torn final record; truncating"
            );
            file.set_len(scan.next_head)?;
            file.sync_all()?;
        }

        tracing::debug!(
            log.path = %path.display(),
            log.records = scan.records,
            log.live_keys = scan.index.len(),
            log.sequence = scan.sequence,
            "acl log opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(LogState {
                file,
                index: scan.index,
                write_head: scan.next_head,
                sequence: scan.sequence,
                records: scan.records,
                broken: None,
            }),
            skip_sync: false,
        })
    }

    /// Skip the per-record `fsync`. Callers must [`flush`](Self::flush) themselves.
    #[must_use]
    pub fn with_skip_sync(mut self, skip: bool) -> Self {
        self.skip_sync = skip;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> Result<()> {
        let state = self.state()?;
        state.file.sync_all().map_err(Into::into)
    }

    pub fn stats(&self) -> Result<LogStats> {
        let state = self.state()?;
        Ok(LogStats {
            live_keys: state.index.len(),
            records: state.records,
            file_bytes: state.write_head,
            sequence: state.sequence,
        })
    }

    /// Rewrite the log so it holds exactly one record per live key.
    ///
    /// The rewritten file is locked before it replaces the old one. If the
    /// replacement fails part way the storage refuses further writes.
    pub fn compact(&self) -> Result<LogStats> {
        let mut state = self.state()?;
        writable(&state)?;

        let mut staging = AtomicWriteFile::options().open(&self.path)?;
        staging.write_all(&ACL_LOG_MAGIC)?;
        let mut head = DATA_START;
        let mut sequence = 0u64;
        for ((column_family, key), value) in &state.index {
            sequence += 1;
            let record = frame_record(sequence, &encode_entry(column_family, key, value)?)?;
            staging.write_all(&record)?;
            head += record.len() as u64;
        }
        staging.flush()?;
        staging.as_file().sync_all()?;
        let file = staging.as_file().try_clone()?;
        file.try_lock_exclusive().map_err(|err| {
            ArborError::Lock(format!("compacted acl log {} is in use: {err}", self.path.display()))
        })?;
        let swapped = staging.commit().map(|()| file);
        install_compacted(&mut state, swapped, head, sequence, &self.path)?;

        tracing::info!(
            log.path = %self.path.display(),
            log.live_keys = state.index.len(),
            log.file_bytes = head,
            "acl log compacted"
        );

        Ok(LogStats {
            live_keys: state.index.len(),
            records: sequence,
            file_bytes: head,
            sequence,
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, LogState>> {
        self.state
            .lock()
            .map_err(|_| ArborError::Lock("acl log state poisoned".into()))
    }

    fn append(&self, state: &mut LogState, column_family: &str, key: &str, value: &[u8]) -> Result<()> {
        writable(state)?;
        let sequence = state.sequence + 1;
        let record = frame_record(sequence, &encode_entry(column_family, key, value)?)?;
        tracing::debug!(
            log.write_head = state.write_head,
            log.sequence = sequence,
            log.payload_len = record.len() - ENTRY_HEADER_SIZE,
            "acl log append"
        );

        // Header and payload go out in one write so a crash leaves at most a torn tail.
        state.file.seek(SeekFrom::Start(state.write_head))?;
        state.file.write_all(&record)?;
        if !self.skip_sync {
            state.file.sync_all()?;
        }

        state.write_head += record.len() as u64;
        state.sequence = sequence;
        state.records += 1;
        state
            .index
            .insert((column_family.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }
}

impl AclStorage for LogStorage {
    fn name(&self) -> &'static str {
        "log"
    }

    fn get(&self, column_family: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let state = self.state()?;
        Ok(state
            .index
            .get(&(column_family.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, column_family: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut state = self.state()?;
        self.append(&mut state, column_family, key, value)
    }

    fn update(&self, column_family: &str, key: &str, f: &mut UpdateFn<'_>) -> Result<()> {
        let mut state = self.state()?;
        let current = state
            .index
            .get(&(column_family.to_string(), key.to_string()))
            .cloned();
        let next = f(current)?;
        self.append(&mut state, column_family, key, &next)
    }
}

fn writable(state: &LogState) -> Result<()> {
    match &state.broken {
        Some(reason) => Err(ArborError::Storage {
            reason: reason.clone(),
        }),
        None => Ok(()),
    }
}

/// Point the state at a freshly compacted file, or retire it when the swap failed.
fn install_compacted(
    state: &mut LogState,
    swapped: std::io::Result<File>,
    head: u64,
    sequence: u64,
    path: &Path,
) -> Result<()> {
    match swapped {
        Ok(file) => {
            state.file = file;
            state.write_head = head;
            state.sequence = sequence;
            state.records = sequence;
            Ok(())
        }
        Err(err) => {
            let reason = format!(
                "acl log {} compaction did not complete ({err}); reopen before writing",
                path.display()
            );
            tracing::error!(log.path = %path.display(), error = %err, "acl log compaction failed");
            state.broken = Some(reason);
            Err(err.into())
        }
    }
}

fn open_locked(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.try_lock_exclusive().map_err(|err| {
        ArborError::Lock(format!("acl log {} is in use: {err}", path.display()))
    })?;
    Ok(file)
}

fn encode_entry(column_family: &str, key: &str, value: &[u8]) -> Result<Vec<u8>> {
    let entry = LogEntry {
        column_family: column_family.to_string(),
        key: key.to_string(),
        value: value.to_vec(),
    };
    Ok(encode_to_vec(&entry, config::standard())?)
}

fn frame_record(sequence: u64, payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| ArborError::Storage {
        reason: "acl log record too large".into(),
    })?;
    let digest = blake3::hash(payload);
    let mut record = Vec::with_capacity(ENTRY_HEADER_SIZE + payload.len());
    record.extend_from_slice(&sequence.to_le_bytes());
    record.extend_from_slice(&len.to_le_bytes());
    let check = header_check(&record[..HEADER_CHECKED_LEN]);
    record.extend_from_slice(&check);
    record.extend_from_slice(digest.as_bytes());
    record.extend_from_slice(payload);
    Ok(record)
}

fn header_check(fields: &[u8]) -> [u8; 4] {
    let digest = blake3::hash(fields);
    let mut check = [0u8; 4];
    check.copy_from_slice(&digest.as_bytes()[..4]);
    check
}

struct ScanResult {
    index: BTreeMap<(String, String), Vec<u8>>,
    next_head: u64,
    sequence: u64,
    records: u64,
    torn_tail: bool,
}

fn scan_records(file: &mut File) -> Result<ScanResult> {
    let size = file.metadata()?.len();
    let mut result = ScanResult {
        index: BTreeMap::new(),
        next_head: DATA_START,
        sequence: 0,
        records: 0,
        torn_tail: false,
    };

    let mut cursor = DATA_START;
    while cursor < size {
        if cursor + ENTRY_HEADER_SIZE as u64 > size {
            result.torn_tail = true;
            break;
        }
        file.seek(SeekFrom::Start(cursor))?;
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        file.read_exact(&mut header)?;

        let sequence = header
            .get(..8)
            .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
            .map(u64::from_le_bytes)
            .ok_or_else(|| corruption(cursor, "invalid sequence header"))?;
        let length = header
            .get(8..12)
            .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
            .map(|bytes| u64::from(u32::from_le_bytes(bytes)))
            .ok_or_else(|| corruption(cursor, "invalid length header"))?;
        let checksum = &header[16..48];

        // A complete header is never a torn write, so a bad one is damage.
        if header[HEADER_CHECKED_LEN..16] != header_check(&header[..HEADER_CHECKED_LEN]) {
            return Err(corruption(cursor, "record header check mismatch"));
        }
        if length == 0 {
            return Err(corruption(cursor, "empty record"));
        }

        let end = cursor + ENTRY_HEADER_SIZE as u64 + length;
        if end > size {
            tracing::warn!(
                log.scan_offset = cursor,
                log.sequence = sequence,
                log.length = length,
                log.size = size,
                "acl log record runs past end of file"
            );
            result.torn_tail = true;
            break;
        }

        let length = usize::try_from(length)
            .map_err(|_| corruption(cursor, "record length too large for platform"))?;
        let mut payload = vec![0u8; length];
        file.read_exact(&mut payload)?;
        if blake3::hash(&payload).as_bytes() != checksum {
            if end == size {
                result.torn_tail = true;
                break;
            }
            return Err(corruption(cursor, "record checksum mismatch"));
        }
        if sequence <= result.sequence {
            return Err(corruption(cursor, "record sequence went backwards"));
        }

        let (entry, _) = decode_from_slice::<LogEntry, _>(&payload, config::standard())
            .map_err(|err| corruption(cursor, &format!("undecodable record: {err}")))?;
        result
            .index
            .insert((entry.column_family, entry.key), entry.value);
        result.sequence = sequence;
        result.records += 1;
        cursor = end;
        result.next_head = cursor;
    }

    Ok(result)
}

fn corruption(offset: u64, reason: &str) -> ArborError {
    ArborError::LogCorruption {
        offset,
        reason: reason.to_string(),
    }
}
